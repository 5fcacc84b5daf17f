//! Serializable description of a runtime's scheduler state.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, SavedDebugContext, TaskState};

/// Errors that can occur when loading a runtime image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read runtime image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse runtime image JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("failed to parse runtime image YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Address the switch routine is placed at unless an image says otherwise
pub const DEFAULT_SWITCH_ADDRESS: u64 = 0x4000_1000;

/// A stopped program's scheduler state: clusters with their processors and
/// tasks, plus the debugger-side state around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeImage {
    /// False for a program stopped before the runtime built its cluster list
    pub initialized: bool,
    pub clusters: Vec<ClusterImage>,
    /// Live registers of the selected thread
    pub registers: SavedDebugContext,
    pub symbols: IndexMap<String, Address>,
    /// Program variables holding task pointers
    pub variables: IndexMap<String, TaskPath>,
    /// Type names the debug information lacks
    pub missing_types: Vec<String>,
    /// Task the debugger is stopped in
    pub current_task: Option<TaskPath>,
    /// Frames the selected thread's stack has
    pub frame_depth: u32,
}

impl Default for RuntimeImage {
    fn default() -> Self {
        let mut symbols = IndexMap::new();
        symbols.insert("uSwitch".to_string(), Address(DEFAULT_SWITCH_ADDRESS));
        Self {
            initialized: true,
            clusters: Vec::new(),
            registers: SavedDebugContext {
                sp: Address(0x7fff_ffff_e000),
                fp: Address(0x7fff_ffff_e0f0),
                pc: Address(0x5555_5555_9000),
            },
            symbols,
            variables: IndexMap::new(),
            missing_types: Vec::new(),
            current_task: None,
            frame_depth: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterImage {
    pub name: String,
    pub processors: Vec<ProcessorImage>,
    pub tasks: Vec<TaskImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorImage {
    pub pid: i64,
    #[serde(default)]
    pub preemption: u64,
    #[serde(default)]
    pub spin: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskImage {
    pub name: String,
    pub state: TaskState,
    /// Saved machine context; synthesized when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextImage {
    pub sp: Address,
    pub fp: Address,
}

/// A task named by its cluster and its own name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPath {
    pub cluster: String,
    pub task: String,
}

impl RuntimeImage {
    /// Load an image, as JSON when the file has a `.json` extension and as
    /// YAML otherwise.
    pub fn load(path: impl AsRef<Path>) -> ImageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_json(json: &str) -> ImageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> ImageResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> ImageResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Fluent construction of [`RuntimeImage`]s.
#[derive(Debug, Clone, Default)]
pub struct ImageBuilder {
    image: RuntimeImage,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cluster, populated by `build`.
    pub fn cluster(mut self, name: &str, build: impl FnOnce(&mut ClusterBuilder)) -> Self {
        let mut cluster = ClusterBuilder {
            cluster: ClusterImage {
                name: name.to_string(),
                ..ClusterImage::default()
            },
        };
        build(&mut cluster);
        self.image.clusters.push(cluster.cluster);
        self
    }

    pub fn registers(mut self, sp: u64, fp: u64, pc: u64) -> Self {
        self.image.registers = SavedDebugContext {
            sp: Address(sp),
            fp: Address(fp),
            pc: Address(pc),
        };
        self
    }

    pub fn symbol(mut self, name: &str, address: u64) -> Self {
        self.image.symbols.insert(name.to_string(), Address(address));
        self
    }

    pub fn without_symbol(mut self, name: &str) -> Self {
        self.image.symbols.shift_remove(name);
        self
    }

    pub fn without_type(mut self, name: &str) -> Self {
        self.image.missing_types.push(name.to_string());
        self
    }

    /// Declare a variable pointing at `task` of `cluster`.
    pub fn variable(mut self, name: &str, cluster: &str, task: &str) -> Self {
        self.image.variables.insert(name.to_string(), task_path(cluster, task));
        self
    }

    pub fn current_task(mut self, cluster: &str, task: &str) -> Self {
        self.image.current_task = Some(task_path(cluster, task));
        self
    }

    pub fn frame_depth(mut self, depth: u32) -> Self {
        self.image.frame_depth = depth;
        self
    }

    /// Leave the global cluster list empty.
    pub fn uninitialized(mut self) -> Self {
        self.image.initialized = false;
        self
    }

    pub fn build(self) -> RuntimeImage {
        self.image
    }
}

/// Populates one cluster of an [`ImageBuilder`].
#[derive(Debug)]
pub struct ClusterBuilder {
    cluster: ClusterImage,
}

impl ClusterBuilder {
    pub fn processor(&mut self, pid: i64, preemption: u64, spin: u64) -> &mut Self {
        self.cluster.processors.push(ProcessorImage {
            pid,
            preemption,
            spin,
        });
        self
    }

    pub fn task(&mut self, name: &str, state: TaskState) -> &mut Self {
        self.cluster.tasks.push(TaskImage {
            name: name.to_string(),
            state,
            context: None,
        });
        self
    }

    pub fn task_with_context(&mut self, name: &str, state: TaskState, sp: u64, fp: u64) -> &mut Self {
        self.cluster.tasks.push(TaskImage {
            name: name.to_string(),
            state,
            context: Some(ContextImage {
                sp: Address(sp),
                fp: Address(fp),
            }),
        });
        self
    }
}

fn task_path(cluster: &str, task: &str) -> TaskPath {
    TaskPath {
        cluster: cluster.to_string(),
        task: task.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_collects_clusters() {
        let image = ImageBuilder::new()
            .cluster("userCluster", |c| {
                c.processor(7, 10, 0).task("mainTask", TaskState::Running);
            })
            .without_symbol("uSwitch")
            .build();

        assert_eq!(image.clusters.len(), 1);
        assert_eq!(image.clusters[0].processors[0].pid, 7);
        assert_eq!(image.clusters[0].tasks[0].name, "mainTask");
        assert!(image.symbols.is_empty());
    }

    #[test]
    fn test_yaml_image_uses_defaults() {
        let yaml = r#"
clusters:
  - name: userCluster
    processors:
      - pid: 4101
    tasks:
      - name: mainTask
        state: Blocked
        context: { sp: "0x7000", fp: "0x7100" }
currentTask: { cluster: userCluster, task: mainTask }
"#;
        let image = RuntimeImage::from_yaml(yaml).unwrap();
        assert!(image.initialized);
        assert_eq!(image.symbols["uSwitch"], Address(DEFAULT_SWITCH_ADDRESS));
        assert_eq!(image.clusters[0].processors[0].spin, 0);
        assert_eq!(
            image.clusters[0].tasks[0].context,
            Some(ContextImage {
                sp: Address(0x7000),
                fp: Address(0x7100)
            })
        );
        assert_eq!(image.current_task.unwrap().task, "mainTask");
    }

    #[test]
    fn test_load_dispatches_on_extension() {
        let image = ImageBuilder::new()
            .cluster("userCluster", |c| {
                c.task("mainTask", TaskState::Ready);
            })
            .build();

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json.write_all(serde_json::to_string(&image).unwrap().as_bytes()).unwrap();
        assert_eq!(RuntimeImage::load(json.path()).unwrap(), image);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        yaml.write_all(image.to_yaml().unwrap().as_bytes()).unwrap();
        assert_eq!(RuntimeImage::load(yaml.path()).unwrap(), image);
    }
}
