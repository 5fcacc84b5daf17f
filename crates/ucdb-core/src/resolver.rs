//! Type and symbol resolution.
//!
//! Every public inspection starts by resolving the runtime's record types.
//! A program that is not a uC++ program (or has been stripped) fails here,
//! softly, with [`Error::UnsupportedContext`].

use tracing::debug;

use crate::error::{Error, Result};
use crate::host::{DebuggerHost, SymbolHandle, TypeHandle};
use crate::layout::RuntimeLayout;

/// Handles for the runtime's scheduler records
#[derive(Debug, Clone)]
pub struct RuntimeTypes {
    pub cluster: TypeHandle,
    pub cluster_node: TypeHandle,
    pub processor: TypeHandle,
    pub processor_node: TypeHandle,
    pub task: TypeHandle,
    pub task_node: TypeHandle,
    pub context: TypeHandle,
}

impl RuntimeTypes {
    /// Resolve every record type named in `layout`.
    pub fn resolve<H: DebuggerHost>(host: &mut H, layout: &RuntimeLayout) -> Result<Self> {
        let names = &layout.types;
        let mut lookup = |name: &str| {
            host.resolve_type(name).map_err(|err| {
                debug!(ty = name, error = %err, "runtime type unavailable");
                Error::UnsupportedContext(err)
            })
        };

        let types = Self {
            cluster: lookup(&names.cluster)?,
            cluster_node: lookup(&names.cluster_node)?,
            processor: lookup(&names.processor)?,
            processor_node: lookup(&names.processor_node)?,
            task: lookup(&names.task)?,
            task_node: lookup(&names.task_node)?,
            context: lookup(&names.context)?,
        };
        debug!(layout = %layout.metadata.name, "runtime types resolved");
        Ok(types)
    }
}

/// Resolve the context-switch routine suspended tasks are parked in.
pub fn switch_symbol<H: DebuggerHost>(host: &mut H, layout: &RuntimeLayout) -> Result<SymbolHandle> {
    let symbol = &layout.switch.symbol;
    match host.lookup_symbol(symbol)? {
        Some(handle) => {
            debug!(symbol = %handle.name, address = %handle.address, "switch primitive resolved");
            Ok(handle)
        }
        None => Err(Error::SwitchPrimitiveUnavailable {
            symbol: symbol.clone(),
        }),
    }
}
