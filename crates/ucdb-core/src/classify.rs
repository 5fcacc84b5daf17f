//! Task classification and numbering.
//!
//! Runtime-internal tasks are recognised by name alone. Numbering runs over
//! a single traversal: user tasks count up from 0, system tasks count down
//! from -1, each sequence independent of the other.

use std::fmt;

use crate::types::TaskId;

/// Names of tasks the runtime creates for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedTaskName {
    LocalDebuggerReader,
    LocalDebugger,
    ProcessorTask,
    BootTask,
    SystemTask,
    Pthread,
    Profiler,
}

impl ReservedTaskName {
    pub const ALL: [ReservedTaskName; 7] = [
        ReservedTaskName::LocalDebuggerReader,
        ReservedTaskName::LocalDebugger,
        ReservedTaskName::ProcessorTask,
        ReservedTaskName::BootTask,
        ReservedTaskName::SystemTask,
        ReservedTaskName::Pthread,
        ReservedTaskName::Profiler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReservedTaskName::LocalDebuggerReader => "uLocalDebuggerReader",
            ReservedTaskName::LocalDebugger => "uLocalDebugger",
            ReservedTaskName::ProcessorTask => "uProcessorTask",
            ReservedTaskName::BootTask => "uBootTask",
            ReservedTaskName::SystemTask => "uSystemTask",
            ReservedTaskName::Pthread => "uPthread",
            ReservedTaskName::Profiler => "uProfiler",
        }
    }

    /// Exact, case-sensitive match against the reserved table.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reserved| reserved.as_str() == name)
    }
}

impl fmt::Display for ReservedTaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category a task is numbered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
    User,
    System,
}

impl TaskClass {
    pub fn of(name: &str) -> Self {
        match ReservedTaskName::from_name(name) {
            Some(_) => TaskClass::System,
            None => TaskClass::User,
        }
    }

    /// The category ids of this sign belong to
    pub fn of_id(id: TaskId) -> Self {
        if id.is_system() {
            TaskClass::System
        } else {
            TaskClass::User
        }
    }
}

/// Hands out ids in traversal order.
///
/// Feed it every task of one list, in list order, exactly once.
#[derive(Debug, Clone)]
pub struct IdAssigner {
    next_user: i64,
    next_system: i64,
}

impl Default for IdAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAssigner {
    pub fn new() -> Self {
        Self {
            next_user: 0,
            next_system: -1,
        }
    }

    /// Id for the next task of `class`.
    pub fn assign(&mut self, class: TaskClass) -> TaskId {
        match class {
            TaskClass::User => {
                let id = self.next_user;
                self.next_user += 1;
                TaskId(id)
            }
            TaskClass::System => {
                let id = self.next_system;
                self.next_system -= 1;
                TaskId(id)
            }
        }
    }

    /// Number of user tasks seen so far
    pub fn user_count(&self) -> usize {
        self.next_user as usize
    }

    /// Number of system tasks seen so far
    pub fn system_count(&self) -> usize {
        (-1 - self.next_system) as usize
    }
}

/// Number a sequence of task names in one pass.
pub fn number<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<(TaskId, TaskClass)> {
    let mut ids = IdAssigner::new();
    names
        .into_iter()
        .map(|name| {
            let class = TaskClass::of(name);
            (ids.assign(class), class)
        })
        .collect()
}
