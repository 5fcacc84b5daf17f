//! Integration test harness for ucdb.
//!
//! This crate provides utilities for end-to-end testing of the full
//! inspection pipeline: runtime image → simulated host → inspector →
//! commands.

use ucdb_commands::Console;
use ucdb_core::snapshot::{ImageBuilder, RuntimeImage, SnapshotHost};
use ucdb_core::{Inspector, RuntimeLayout, SavedDebugContext, SwitchHistory, TaskRow, TaskState};

/// Canonical two-cluster program used across the integration tests.
///
/// `userCluster` holds `mainTask`, `uProcessorTask` and `workerA`;
/// `systemCluster` holds only runtime tasks.
pub const SCENARIO_YAML: &str = r#"
clusters:
  - name: userCluster
    processors:
      - { pid: 4101, preemption: 10, spin: 1000 }
    tasks:
      - { name: mainTask, state: Running }
      - { name: uProcessorTask, state: Blocked, context: { sp: "0x7ffff7a00000", fp: "0x7ffff7a00100" } }
      - { name: workerA, state: Blocked, context: { sp: "0x7ffff7b00000", fp: "0x7ffff7b00100" } }
  - name: systemCluster
    processors:
      - { pid: 4100 }
    tasks:
      - { name: uSystemTask, state: Blocked }
      - { name: uProcessorTask, state: Blocked }
symbols:
  uSwitch: "0x555555590000"
currentTask: { cluster: userCluster, task: mainTask }
"#;

/// Test harness driving a console over a simulated runtime.
pub struct TestHarness {
    console: Console<SnapshotHost>,
}

impl TestHarness {
    /// Create a harness from a runtime image in YAML.
    ///
    /// # Panics
    ///
    /// Panics if the image does not parse.
    pub fn from_yaml(yaml: &str) -> Self {
        let image = RuntimeImage::from_yaml(yaml).expect("runtime image should parse");
        Self::from_image(image)
    }

    /// Create a harness from a built image using the default layout.
    pub fn from_image(image: RuntimeImage) -> Self {
        Self::with_layout(image, RuntimeLayout::default())
    }

    pub fn with_layout(image: RuntimeImage, layout: RuntimeLayout) -> Self {
        let host = SnapshotHost::new(image, &layout);
        Self {
            console: Console::new(Inspector::new(host, layout)),
        }
    }

    /// The canonical scenario.
    pub fn scenario() -> Self {
        Self::from_yaml(SCENARIO_YAML)
    }

    /// A single cluster holding `count` blocked user tasks.
    pub fn with_user_tasks(count: usize) -> Self {
        let image = ImageBuilder::new()
            .cluster("userCluster", |c| {
                for i in 0..count {
                    c.task(&format!("worker{i}"), TaskState::Blocked);
                }
            })
            .build();
        Self::from_image(image)
    }

    /// Run a command line, returning what it prints.
    pub fn run(&mut self, line: &str) -> Vec<String> {
        self.console.execute(line)
    }

    pub fn inspector(&mut self) -> &mut Inspector<SnapshotHost> {
        self.console.inspector_mut()
    }

    pub fn host(&self) -> &SnapshotHost {
        self.console.inspector().host()
    }

    pub fn host_mut(&mut self) -> &mut SnapshotHost {
        self.console.inspector_mut().host_mut()
    }

    /// Live register triple.
    pub fn registers(&self) -> SavedDebugContext {
        self.host().registers()
    }

    pub fn history(&self) -> &SwitchHistory {
        self.console.inspector().history()
    }

    /// Tasks of `cluster`, panicking on failure.
    pub fn tasks(&mut self, cluster: &str, include_system: bool) -> Vec<TaskRow> {
        self.inspector()
            .list_tasks(cluster, include_system)
            .expect("task listing should succeed")
    }
}
