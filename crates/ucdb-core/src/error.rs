//! Inspection errors

use std::fmt;

use thiserror::Error;

use crate::host::HostError;
use crate::types::{Address, TaskState};

/// Inspection result type
pub type Result<T> = std::result::Result<T, Error>;

/// What kind of runtime entity a lookup was after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Cluster,
    Task,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Cluster => f.write_str("cluster"),
            Entity::Task => f.write_str("task"),
        }
    }
}

/// Which circular list a traversal was walking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Clusters,
    Processors,
    Tasks,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Clusters => f.write_str("cluster"),
            ListKind::Processors => f.write_str("processor"),
            ListKind::Tasks => f.write_str("task"),
        }
    }
}

/// Inspection errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("no clusters, program terminated")]
    RuntimeNotInitialized,

    #[error("cannot find a {entity} with {key}")]
    EntityNotFound { entity: Entity, key: String },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("not a supported command for this language: {0}")]
    UnsupportedContext(#[source] HostError),

    #[error("switch primitive `{symbol}` is unavailable")]
    SwitchPrimitiveUnavailable { symbol: String },

    #[error("cannot switch to a terminated task ({task} is {state})")]
    InvalidState { task: Address, state: TaskState },

    #[error("empty stack")]
    EmptyHistory,

    #[error("corrupt {list} list at {node}: {reason}")]
    CorruptList {
        list: ListKind,
        node: Address,
        reason: String,
    },

    #[error("register update failed ({source}); previous registers restored: {restored}")]
    PartialSwitch {
        #[source]
        source: HostError,
        restored: bool,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Coarse error categories the presentation layer keys its messages on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RuntimeNotInitialized,
    EntityNotFound,
    InvalidSelector,
    UnsupportedContext,
    InvalidState,
    EmptyHistory,
    CorruptList,
    Host,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RuntimeNotInitialized => ErrorKind::RuntimeNotInitialized,
            Error::EntityNotFound { .. } => ErrorKind::EntityNotFound,
            Error::InvalidSelector(_) => ErrorKind::InvalidSelector,
            Error::UnsupportedContext(_) | Error::SwitchPrimitiveUnavailable { .. } => {
                ErrorKind::UnsupportedContext
            }
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::EmptyHistory => ErrorKind::EmptyHistory,
            Error::CorruptList { .. } => ErrorKind::CorruptList,
            Error::PartialSwitch { .. } | Error::Host(_) => ErrorKind::Host,
        }
    }

    pub fn cluster_not_found(name: &str) -> Self {
        Error::EntityNotFound {
            entity: Entity::Cluster,
            key: format!("the name: {name}"),
        }
    }
}
