//! Command-level tests for the console.
//!
//! Drives full command lines through `Console` over a `SnapshotHost`,
//! checking the rendered output and the debugger state left behind.

use ucdb_commands::Console;
use ucdb_core::snapshot::{ImageBuilder, SnapshotHost};
use ucdb_core::{Inspector, RuntimeLayout, TaskState};

fn console() -> Console<SnapshotHost> {
    let layout = RuntimeLayout::default();
    let image = ImageBuilder::new()
        .cluster("userCluster", |c| {
            c.processor(4101, 10, 1000)
                .task("mainTask", TaskState::Running)
                .task("uProcessorTask", TaskState::Blocked)
                .task("workerA", TaskState::Blocked)
                .task("doneTask", TaskState::Terminate);
        })
        .cluster("systemCluster", |c| {
            c.processor(4100, 0, 1000).task("uSystemTask", TaskState::Blocked);
        })
        .cluster("ioCluster", |_| {})
        .current_task("userCluster", "mainTask")
        .variable("worker", "userCluster", "workerA")
        .build();
    Console::new(Inspector::new(SnapshotHost::new(image, &layout), layout))
}

fn host(console: &Console<SnapshotHost>) -> &SnapshotHost {
    console.inspector().host()
}

#[test]
fn test_install_passes_runtime_signals() {
    let mut console = console();
    console.install().unwrap();

    assert_eq!(
        host(&console).commands(),
        &[
            "handle SIGALRM nostop noprint pass".to_string(),
            "handle SIGUSR1 nostop noprint pass".to_string(),
        ]
    );
}

#[test]
fn test_info_clusters_table() {
    let mut console = console();
    let lines = console.execute("info clusters");

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), vec!["Name", "Address"]);
    assert!(lines[1].trim_start().starts_with("userCluster"));
    assert!(lines[3].trim_start().starts_with("ioCluster"));
}

#[test]
fn test_info_vprocessors() {
    let mut console = console();

    let lines = console.execute("info vprocessors");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("4101"));

    let lines = console.execute("info vprocessors ioCluster");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("There are no processors for cluster at address: 0x"));

    let lines = console.execute("info vprocessors nowhere");
    assert_eq!(lines, vec!["Cannot find a cluster with the name: nowhere.".to_string()]);
}

#[test]
fn test_task_listing_hides_system_tasks_and_marks_current() {
    let mut console = console();
    let lines = console.execute("task");

    // header, mainTask, workerA, doneTask
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with(" * 0"));
    assert!(lines[1].contains("mainTask"));
    assert!(lines[2].contains("workerA"));
    assert!(!lines.iter().any(|l| l.contains("uProcessorTask")));

    let lines = console.execute("task userCluster");
    assert!(lines.iter().any(|l| l.starts_with("  -1") && l.contains("uProcessorTask")));
}

#[test]
fn test_task_all_lists_every_cluster() {
    let mut console = console();
    let lines = console.execute("task all");

    assert!(lines[0].contains("Cluster Name"));
    assert!(lines.iter().any(|l| l.contains("uSystemTask")));
    assert!(lines.last().unwrap().starts_with("There are no tasks for cluster at address:"));
}

#[test]
fn test_switch_prevtask_and_reset() {
    let mut console = console();
    let baseline = host(&console).registers();

    console.execute("task 1");
    assert_ne!(host(&console).registers(), baseline);
    assert_eq!(console.inspector().history().depth(), 1);

    console.execute(r#"task "worker""#);
    console.execute("task -1 userCluster");
    assert_eq!(console.inspector().history().depth(), 3);

    console.execute("prevtask");
    assert_eq!(console.inspector().history().depth(), 2);

    console.execute("reset");
    assert_eq!(host(&console).registers(), baseline);
    assert!(console.inspector().history().is_empty());
}

#[test]
fn test_history_commands_on_empty_history() {
    let mut console = console();

    assert_eq!(console.execute("prevtask"), vec!["empty stack".to_string()]);
    assert!(console.execute("reset").is_empty());
    assert!(host(&console).register_writes().is_empty());
}

#[test]
fn test_switch_errors_are_single_lines() {
    let mut console = console();

    assert_eq!(console.execute("task 2"), vec!["Cannot switch to a terminated thread".to_string()]);
    assert_eq!(
        console.execute("task 7"),
        vec!["Cannot find task ID: 7. Only have 3 tasks".to_string()]
    );
    let lines = console.execute("task 0 systemCluster");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("systemCluster does not have ID >= 0"));
    assert!(console.inspector().history().is_empty());
}

#[test]
fn test_malformed_arguments_print_usage() {
    let mut console = console();
    let lines = console.execute("task 1 2 3");

    assert!(lines.iter().any(|l| l.starts_with("Usage:")));
    assert!(lines.iter().any(|l| l.contains("task all")));
    assert_eq!(console.execute("info clusters now")[1], "Usage:");
}

#[test]
fn test_unsupported_program() {
    let layout = RuntimeLayout::default();
    let image = ImageBuilder::new().without_type("uCluster").build();
    let mut console = Console::new(Inspector::new(SnapshotHost::new(image, &layout), layout));

    for line in ["info clusters", "info vprocessors", "task", "task 0"] {
        assert_eq!(
            console.execute(line),
            vec!["Not a supported command for this language".to_string()],
            "{line}"
        );
    }
}

#[test]
fn test_terminated_program() {
    let layout = RuntimeLayout::default();
    let image = ImageBuilder::new().uninitialized().build();
    let mut console = Console::new(Inspector::new(SnapshotHost::new(image, &layout), layout));

    assert_eq!(
        console.execute("info clusters"),
        vec!["No clusters, program terminated".to_string()]
    );
}
