//! Runtime layout profiles.
//!
//! A layout profile names everything runtime-specific the inspector relies
//! on: the expression reaching the global cluster list, the record types and
//! their members, the context-switch primitive and its offsets, the well-known
//! cluster names and the signals the runtime uses internally.
//!
//! The defaults describe uC++ on x86-64. Profiles are YAML documents; every
//! section is optional and falls back to the defaults:
//!
//! ```yaml
//! apiVersion: ucdb/v1
//! kind: RuntimeLayout
//! metadata:
//!   name: ucpp-x86_64
//! switch:
//!   symbol: uSwitch
//!   resumeOffset: 28
//!   stackAdjust: 48
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading a layout profile.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Failed to read the profile file.
    #[error("failed to read layout profile: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the profile YAML.
    #[error("failed to parse layout YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid API version.
    #[error("invalid apiVersion: expected 'ucdb/v1', got '{0}'")]
    InvalidApiVersion(String),

    /// Invalid kind.
    #[error("invalid kind: expected 'RuntimeLayout', got '{0}'")]
    InvalidKind(String),

    /// A name the inspector needs is empty.
    #[error("layout field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// The user and system cluster names collide.
    #[error("user and system cluster are both named '{0}'")]
    ClusterNameClash(String),
}

/// Result type for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

pub const API_VERSION: &str = "ucdb/v1";
pub const KIND: &str = "RuntimeLayout";

/// Everything runtime-specific the inspector needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeLayout {
    pub api_version: String,
    pub kind: String,
    pub metadata: LayoutMetadata,
    /// Expression evaluating to the `root` pointer of the global cluster list
    pub cluster_root: String,
    pub types: TypeNames,
    pub fields: FieldNames,
    pub switch: SwitchLayout,
    pub clusters: WellKnownClusters,
    /// Signals the runtime uses internally; the debugger should pass them
    /// through silently.
    pub pass_signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetadata {
    pub name: String,
    pub description: Option<String>,
}

impl Default for LayoutMetadata {
    fn default() -> Self {
        Self {
            name: "ucpp-x86_64".to_string(),
            description: None,
        }
    }
}

/// Record types of the runtime's scheduler structures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeNames {
    pub cluster: String,
    pub cluster_node: String,
    pub processor: String,
    pub processor_node: String,
    pub task: String,
    pub task_node: String,
    /// Saved machine context of a suspended task
    pub context: String,
}

impl Default for TypeNames {
    fn default() -> Self {
        Self {
            cluster: "uCluster".to_string(),
            cluster_node: "uClusterDL".to_string(),
            processor: "uProcessor".to_string(),
            processor_node: "uProcessorDL".to_string(),
            task: "uBaseTask".to_string(),
            task_node: "uBaseTaskDL".to_string(),
            context: "UPP::uMachContext::uContext_t".to_string(),
        }
    }
}

/// Member names inside the runtime's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldNames {
    /// Link to the next node of every circular list
    pub next: String,
    /// Root pointer of an embedded sequence
    pub seq_root: String,
    pub node_cluster: String,
    pub node_processor: String,
    pub node_task: String,
    pub cluster_name: String,
    pub cluster_processors: String,
    pub cluster_tasks: String,
    pub processor_pid: String,
    pub processor_preemption: String,
    pub processor_spin: String,
    pub task_name: String,
    pub task_state: String,
    pub task_context: String,
    pub context_sp: String,
    pub context_fp: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            next: "next".to_string(),
            seq_root: "root".to_string(),
            node_cluster: "cluster_".to_string(),
            node_processor: "processor_".to_string(),
            node_task: "task_".to_string(),
            cluster_name: "name".to_string(),
            cluster_processors: "processorsOnCluster".to_string(),
            cluster_tasks: "tasksOnCluster".to_string(),
            processor_pid: "pid".to_string(),
            processor_preemption: "preemption".to_string(),
            processor_spin: "spin".to_string(),
            task_name: "name_".to_string(),
            task_state: "state_".to_string(),
            task_context: "context_".to_string(),
            context_sp: "SP".to_string(),
            context_fp: "FP".to_string(),
        }
    }
}

/// The low-level stack-switch routine a suspended task is parked in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchLayout {
    pub symbol: String,
    /// Bytes from the routine's entry to the instruction after the stack swap
    pub resume_offset: i64,
    /// Bytes the routine pushes below the saved stack pointer
    pub stack_adjust: i64,
}

impl Default for SwitchLayout {
    fn default() -> Self {
        Self {
            symbol: "uSwitch".to_string(),
            resume_offset: 28,
            stack_adjust: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WellKnownClusters {
    /// Cluster commands default to
    pub user: String,
    /// Cluster holding only runtime-internal tasks
    pub system: String,
}

impl Default for WellKnownClusters {
    fn default() -> Self {
        Self {
            user: "userCluster".to_string(),
            system: "systemCluster".to_string(),
        }
    }
}

impl Default for RuntimeLayout {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: LayoutMetadata::default(),
            // globalClusters is uNoCtor<uClusterSeq, false>: cast the raw storage
            cluster_root:
                "((uClusterSeq &)*((uClusterSeq *)&uKernelModule::globalClusters)).root"
                    .to_string(),
            types: TypeNames::default(),
            fields: FieldNames::default(),
            switch: SwitchLayout::default(),
            clusters: WellKnownClusters::default(),
            pass_signals: vec!["SIGALRM".to_string(), "SIGUSR1".to_string()],
        }
    }
}

impl RuntimeLayout {
    /// Load a layout profile from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> LayoutResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a layout profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> LayoutResult<Self> {
        let layout: RuntimeLayout = serde_yaml::from_str(yaml)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Render the profile as YAML.
    pub fn to_yaml(&self) -> LayoutResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the header and the names the inspector cannot work without.
    pub fn validate(&self) -> LayoutResult<()> {
        if self.api_version != API_VERSION {
            return Err(LayoutError::InvalidApiVersion(self.api_version.clone()));
        }
        if self.kind != KIND {
            return Err(LayoutError::InvalidKind(self.kind.clone()));
        }

        let required = [
            ("clusterRoot", &self.cluster_root),
            ("types.cluster", &self.types.cluster),
            ("types.clusterNode", &self.types.cluster_node),
            ("types.processor", &self.types.processor),
            ("types.processorNode", &self.types.processor_node),
            ("types.task", &self.types.task),
            ("types.taskNode", &self.types.task_node),
            ("types.context", &self.types.context),
            ("fields.next", &self.fields.next),
            ("fields.seqRoot", &self.fields.seq_root),
            ("switch.symbol", &self.switch.symbol),
            ("clusters.user", &self.clusters.user),
            ("clusters.system", &self.clusters.system),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(LayoutError::EmptyField(*name));
        }

        if self.clusters.user == self.clusters.system {
            return Err(LayoutError::ClusterNameClash(self.clusters.user.clone()));
        }
        Ok(())
    }
}
