//! End-to-end scenarios over the canonical two-cluster program.
//!
//! Each test drives the inspector or the command set through a
//! `TestHarness` and checks both the reported result and the debugger
//! state left behind.

use std::collections::HashSet;
use std::io::Write;

use ucdb_core::snapshot::{ImageBuilder, RuntimeImage};
use ucdb_core::{
    Address, DebuggerHost, Error, ErrorKind, Location, RuntimeLayout, TaskId, TaskSelector,
    TaskState, TypeHandle,
};
use ucdb_tests::{SCENARIO_YAML, TestHarness};

fn by_id(id: i64, cluster: &str) -> TaskSelector {
    TaskSelector::ById {
        id: TaskId(id),
        cluster: cluster.to_string(),
    }
}

#[test]
fn test_clusters_listed_once_in_order() {
    let mut harness = TestHarness::scenario();
    let clusters = harness.inspector().list_clusters().unwrap();

    let names: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["userCluster", "systemCluster"]);
    let addresses: HashSet<Address> = clusters.iter().map(|c| c.address).collect();
    assert_eq!(addresses.len(), 2);
}

#[test]
fn test_user_listing_numbers_application_tasks() {
    let mut harness = TestHarness::scenario();
    let rows = harness.tasks("userCluster", false);

    let ids: Vec<(i64, &str)> = rows.iter().map(|r| (r.id.0, r.name.as_str())).collect();
    assert_eq!(ids, vec![(0, "mainTask"), (1, "workerA")]);
    assert!(rows[0].current);
}

#[test]
fn test_ids_partition_every_task() {
    let mut harness = TestHarness::scenario();
    for cluster in ["userCluster", "systemCluster"] {
        let all = harness.tasks(cluster, true);
        let ids: HashSet<TaskId> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), all.len(), "{cluster}");

        let user = all.iter().filter(|r| !r.id.is_system()).count();
        let system = all.iter().filter(|r| r.id.is_system()).count();
        assert_eq!(user + system, all.len());
    }
}

#[test]
fn test_traversal_visits_every_task_once() {
    for count in [1, 2, 5, 16] {
        let mut harness = TestHarness::with_user_tasks(count);
        let rows = harness.tasks("userCluster", true);

        assert_eq!(rows.len(), count);
        let ids: Vec<i64> = rows.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, (0..count as i64).collect::<Vec<_>>());
    }
}

#[test]
fn test_negative_id_selects_system_task() {
    let mut harness = TestHarness::scenario();
    let outcome = harness.inspector().switch_to(&by_id(-1, "userCluster")).unwrap();

    assert_eq!(outcome.name, "uProcessorTask");
    // uSwitch + 28, saved SP + 48, saved FP
    assert_eq!(outcome.current.pc, Address(0x5555_5559_0000 + 28));
    assert_eq!(outcome.current.sp, Address(0x7fff_f7a0_0000 + 48));
    assert_eq!(outcome.current.fp, Address(0x7fff_f7a0_0100));
    assert_eq!(harness.registers(), outcome.current);
}

#[test]
fn test_switch_then_revert_restores_registers() {
    let mut harness = TestHarness::scenario();
    let before = harness.registers();

    harness.inspector().switch_to(&by_id(1, "userCluster")).unwrap();
    assert_ne!(harness.registers(), before);
    harness.inspector().revert_last_switch().unwrap();

    assert_eq!(harness.registers(), before);
    assert!(harness.history().is_empty());
}

#[test]
fn test_reset_after_nested_switches() {
    for depth in 1..=6 {
        let mut harness = TestHarness::scenario();
        let baseline = harness.registers();

        for step in 0..depth {
            let id = if step % 2 == 0 { 1 } else { -1 };
            harness.inspector().switch_to(&by_id(id, "userCluster")).unwrap();
        }
        assert_eq!(harness.history().depth(), depth);
        assert_eq!(harness.history().baseline(), Some(&baseline));

        harness.inspector().reset_to_baseline().unwrap();
        assert_eq!(harness.registers(), baseline);
        assert!(harness.history().is_empty());
    }
}

#[test]
fn test_terminated_task_is_rejected() {
    let image = ImageBuilder::new()
        .cluster("userCluster", |c| {
            c.task("mainTask", TaskState::Blocked).task("gone", TaskState::Terminate);
        })
        .build();
    let mut harness = TestHarness::from_image(image);
    harness.inspector().switch_to(&by_id(0, "userCluster")).unwrap();
    let history = harness.history().clone();
    let registers = harness.registers();

    let err = harness.inspector().switch_to(&by_id(1, "userCluster")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(harness.history(), &history);
    assert_eq!(harness.registers(), registers);
}

#[test]
fn test_revert_on_empty_history_writes_nothing() {
    let mut harness = TestHarness::scenario();

    let err = harness.inspector().revert_last_switch().unwrap_err();
    assert!(matches!(err, Error::EmptyHistory));
    assert!(harness.host().register_writes().is_empty());
}

#[test]
fn test_missing_switch_symbol_mutates_nothing() {
    let image = ImageBuilder::new()
        .without_symbol("uSwitch")
        .cluster("userCluster", |c| {
            c.task("mainTask", TaskState::Blocked);
        })
        .build();
    let mut harness = TestHarness::from_image(image);

    let err = harness.inspector().switch_to(&by_id(0, "userCluster")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedContext);
    assert!(harness.history().is_empty());
    assert!(harness.host().register_writes().is_empty());
    assert_eq!(harness.run("task 0"), vec!["uSwitch symbol is unavailable".to_string()]);
}

#[test]
fn test_register_write_failure_rolls_back() {
    let mut harness = TestHarness::scenario();
    let before = harness.registers();

    for writes in 0..3 {
        harness.host_mut().fail_register_write_after(writes);
        let err = harness.inspector().switch_to(&by_id(1, "userCluster")).unwrap_err();

        assert!(matches!(err, Error::PartialSwitch { restored: true, .. }), "{writes}");
        assert_eq!(harness.registers(), before);
        assert!(harness.history().is_empty());
    }
}

#[test]
fn test_revert_failure_keeps_history() {
    let mut harness = TestHarness::scenario();
    harness.inspector().switch_to(&by_id(1, "userCluster")).unwrap();
    let switched = harness.registers();

    harness.host_mut().fail_register_write_after(1);
    let err = harness.inspector().revert_last_switch().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Host);
    assert_eq!(harness.registers(), switched);
    assert_eq!(harness.history().depth(), 1);
}

#[test]
fn test_corrupt_task_list_is_reported() {
    let mut harness = TestHarness::scenario();
    let task = harness.host().task_address("userCluster", "mainTask").unwrap();
    let layout = RuntimeLayout::default();

    // Break the ring: find mainTask's node and null its next link.
    let cluster = harness.host().cluster_location("userCluster").unwrap();
    let host = harness.host_mut();
    let seq = host.member(&cluster, &layout.fields.cluster_tasks).unwrap();
    let root = host.member(&seq, &layout.fields.seq_root).unwrap();
    let first = Location::new(host.read_address(&root).unwrap(), TypeHandle::new("uBaseTaskDL"));
    let payload = host.member(&first, &layout.fields.node_task).unwrap();
    assert_eq!(host.read_address(&payload).unwrap(), task);
    let next = host.member(&first, &layout.fields.next).unwrap();
    host.poke_pointer(next.address, Address::NULL).unwrap();

    let err = harness.inspector().list_tasks("userCluster", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptList);
    assert_eq!(harness.run("task").len(), 1);
}

#[test]
fn test_non_negative_id_on_system_cluster() {
    let mut harness = TestHarness::scenario();

    let err = harness.inspector().switch_to(&by_id(0, "systemCluster")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSelector);
    let outcome = harness.inspector().switch_to(&by_id(-2, "systemCluster")).unwrap();
    assert_eq!(outcome.name, "uProcessorTask");
}

#[test]
fn test_ids_follow_list_order_not_identity() {
    let mut harness = TestHarness::scenario();
    let before = harness.tasks("userCluster", false);
    assert_eq!((before[1].id, before[1].name.as_str()), (TaskId(1), "workerA"));

    // Rotate the ring so it starts at uProcessorTask's node.
    let layout = RuntimeLayout::default();
    let cluster = harness.host().cluster_location("userCluster").unwrap();
    let host = harness.host_mut();
    let seq = host.member(&cluster, &layout.fields.cluster_tasks).unwrap();
    let root = host.member(&seq, &layout.fields.seq_root).unwrap();
    let first = Location::new(host.read_address(&root).unwrap(), TypeHandle::new("uBaseTaskDL"));
    let next = host.member(&first, &layout.fields.next).unwrap();
    let second = host.read_address(&next).unwrap();
    host.poke_pointer(root.address, second).unwrap();

    let after = harness.tasks("userCluster", false);
    let ids: Vec<(i64, &str)> = after.iter().map(|r| (r.id.0, r.name.as_str())).collect();
    assert_eq!(ids, vec![(0, "workerA"), (1, "mainTask")]);
}

#[test]
fn test_full_command_session() {
    let mut harness = TestHarness::scenario();
    let baseline = harness.registers();

    assert_eq!(harness.run("info clusters").len(), 3);
    assert_eq!(harness.run("info vprocessors").len(), 2);
    assert_eq!(harness.run("task").len(), 3);
    assert!(harness.run("task all").iter().any(|l| l.contains("uSystemTask")));

    harness.run("task 1");
    harness.run("task -1 userCluster");
    let address = harness.host().task_address("userCluster", "workerA").unwrap();
    harness.run(&format!("task {address}"));
    assert_eq!(harness.history().depth(), 3);

    harness.run("prevtask");
    assert_eq!(harness.history().depth(), 2);
    assert!(harness.run("reset").iter().all(|l| l.starts_with('#')));
    assert_eq!(harness.registers(), baseline);
    assert_eq!(harness.run("prevtask"), vec!["empty stack".to_string()]);
    assert!(harness.run("reset").is_empty());
}

#[test]
fn test_image_file_roundtrip() {
    let image = RuntimeImage::from_yaml(SCENARIO_YAML).unwrap();
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(serde_json::to_string(&image).unwrap().as_bytes()).unwrap();

    let loaded = RuntimeImage::load(file.path()).unwrap();
    assert_eq!(loaded, image);
    let mut harness = TestHarness::from_image(loaded);
    assert_eq!(harness.tasks("userCluster", true).len(), 3);
}
