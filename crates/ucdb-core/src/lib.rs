//! uC++ runtime introspection for debuggers.
//!
//! Walks the runtime's scheduler structures through a host debugger
//! ([`host::DebuggerHost`]) to list clusters, virtual processors and tasks,
//! and switches the debugger's registers onto a suspended task's stack so
//! it can be unwound like the running thread.
//!
//! ```text
//! Inspector ── Topology ── walker::Ring ── DebuggerHost
//!     │            └──── classify (task ids)
//!     └── switch (history, register writes)
//! ```

pub mod classify;
pub mod error;
pub mod host;
pub mod inspector;
pub mod layout;
pub mod resolver;
pub mod snapshot;
pub mod switch;
pub mod topology;
pub mod types;
pub mod walker;

pub use error::{Error, ErrorKind, Result};
pub use host::{DebuggerHost, HostError, HostResult, Location, SymbolHandle, TypeHandle};
pub use inspector::Inspector;
pub use layout::RuntimeLayout;
pub use switch::{RevertOutcome, SwitchHistory, SwitchOutcome, TaskSelector};
pub use types::*;
