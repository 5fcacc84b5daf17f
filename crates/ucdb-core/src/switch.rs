//! Debugger stack switching.
//!
//! A suspended task is parked inside the runtime's context-switch routine
//! with its stack and frame pointers saved in its machine context. Pointing
//! the debugger's `$sp`, `$fp` and `$pc` at those values lets the debugger
//! unwind the task's stack as if it were the running thread.
//!
//! Each switch pushes the register triple it replaced onto a
//! [`SwitchHistory`]; reverting pops it back, resetting restores the
//! oldest entry and drops the rest.
//!
//! Register writes for one step are applied as a unit: if any write fails
//! the already-written registers are put back, and the history is only
//! touched after every write succeeded.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::host::{DebuggerHost, HostError, Location};
use crate::layout::RuntimeLayout;
use crate::resolver;
use crate::topology::Topology;
use crate::types::{Address, Register, SavedDebugContext, TaskId, TaskState};

/// How the user named the task to switch to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelector {
    /// Task number within a cluster
    ById { id: TaskId, cluster: String },
    /// Literal task address, on any cluster
    ByAddress(Address),
    /// Program variable holding a task pointer
    ByVariableName(String),
}

impl fmt::Display for TaskSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskSelector::ById { id, cluster } => write!(f, "task {id} on {cluster}"),
            TaskSelector::ByAddress(address) => write!(f, "task at {address}"),
            TaskSelector::ByVariableName(name) => write!(f, "task `{name}`"),
        }
    }
}

/// Register contexts replaced by unreverted switches, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchHistory {
    entries: Vec<SavedDebugContext>,
}

impl SwitchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nested, unreverted switches
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Saved contexts, bottom (oldest) first
    pub fn entries(&self) -> &[SavedDebugContext] {
        &self.entries
    }

    /// Context the next revert restores
    pub fn top(&self) -> Option<&SavedDebugContext> {
        self.entries.last()
    }

    /// Context a reset restores
    pub fn baseline(&self) -> Option<&SavedDebugContext> {
        self.entries.first()
    }

    fn push(&mut self, context: SavedDebugContext) {
        self.entries.push(context);
    }

    fn pop(&mut self) -> Option<SavedDebugContext> {
        self.entries.pop()
    }

    fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

/// A validated switch: the target task and the registers it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchPlan {
    pub task: Address,
    pub name: String,
    pub state: TaskState,
    pub target: SavedDebugContext,
}

/// Result of a completed switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub task: Address,
    pub name: String,
    pub state: TaskState,
    /// Registers before the switch, now on top of the history
    pub previous: SavedDebugContext,
    /// Registers after the switch
    pub current: SavedDebugContext,
    /// History depth after the switch
    pub depth: usize,
}

/// Result of a completed revert or reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertOutcome {
    pub restored: SavedDebugContext,
    /// Entries dropped besides the restored one
    pub discarded: usize,
    /// History depth afterwards
    pub depth: usize,
    /// Whether the caller's frame could be selected afterwards
    pub caller_frame: bool,
}

/// Resolve `selector` and compute the registers that expose the task's
/// stack. Reads only; nothing is mutated.
pub fn plan<H: DebuggerHost>(
    host: &mut H,
    layout: &RuntimeLayout,
    selector: &TaskSelector,
) -> Result<SwitchPlan> {
    let mut topo = Topology::new(host, layout)?;

    let task = match selector {
        TaskSelector::ById { id, cluster } => {
            let cluster = topo.find_cluster(cluster)?;
            topo.task_by_id(&cluster, *id)?.location.address
        }
        TaskSelector::ByAddress(address) => {
            if address.is_null() {
                return Err(Error::InvalidSelector("null task address".to_string()));
            }
            *address
        }
        TaskSelector::ByVariableName(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidSelector("empty variable name".to_string()));
            }
            let host = topo.host();
            let variable = host.evaluate_expression(name).map_err(|err| match err {
                HostError::Evaluation { .. } => {
                    Error::InvalidSelector(format!("cannot evaluate `{name}`: {err}"))
                }
                other => Error::Host(other),
            })?;
            let address = host.read_address(&variable)?;
            if address.is_null() {
                return Err(Error::InvalidSelector(format!("`{name}` is a null task pointer")));
            }
            address
        }
    };

    let (name, state) = topo.task_at(task)?;
    if state.is_terminal() {
        return Err(Error::InvalidState { task, state });
    }

    let symbol = resolver::switch_symbol(topo.host(), layout)?;
    let location = Location::new(task, topo.types().task.clone());
    let (saved_sp, saved_fp) = topo.saved_context(&location)?;

    let target = SavedDebugContext {
        sp: saved_sp.offset(layout.switch.stack_adjust),
        fp: saved_fp,
        pc: symbol.address.offset(layout.switch.resume_offset),
    };
    debug!(%selector, task = %task, %name, %target, "switch validated");

    Ok(SwitchPlan {
        task,
        name,
        state,
        target,
    })
}

/// Point the debugger at the planned task's stack.
pub fn apply<H: DebuggerHost>(
    host: &mut H,
    history: &mut SwitchHistory,
    plan: SwitchPlan,
) -> Result<SwitchOutcome> {
    // registers can only be set in the innermost frame
    host.select_frame(0)?;
    let previous = read_registers(host)?;

    write_registers(host, &plan.target, &previous)?;
    history.push(previous);

    info!(
        task = %plan.task,
        name = %plan.name,
        depth = history.depth(),
        "switched to task stack"
    );
    Ok(SwitchOutcome {
        task: plan.task,
        name: plan.name,
        state: plan.state,
        previous,
        current: plan.target,
        depth: history.depth(),
    })
}

/// Validate then apply: the whole switch.
pub fn switch_to<H: DebuggerHost>(
    host: &mut H,
    layout: &RuntimeLayout,
    history: &mut SwitchHistory,
    selector: &TaskSelector,
) -> Result<SwitchOutcome> {
    let plan = plan(host, layout, selector)?;
    apply(host, history, plan)
}

/// Undo the most recent switch.
pub fn revert<H: DebuggerHost>(host: &mut H, history: &mut SwitchHistory) -> Result<RevertOutcome> {
    let Some(&saved) = history.top() else {
        return Err(Error::EmptyHistory);
    };

    restore(host, &saved)?;
    history.pop();
    let caller_frame = select_caller(host);

    info!(restored = %saved, depth = history.depth(), "reverted task switch");
    Ok(RevertOutcome {
        restored: saved,
        discarded: 0,
        depth: history.depth(),
        caller_frame,
    })
}

/// Undo every switch, restoring the context from before the first one.
pub fn reset<H: DebuggerHost>(host: &mut H, history: &mut SwitchHistory) -> Result<RevertOutcome> {
    let Some(&baseline) = history.baseline() else {
        return Err(Error::EmptyHistory);
    };

    restore(host, &baseline)?;
    let discarded = history.clear() - 1;
    let caller_frame = select_caller(host);

    info!(restored = %baseline, discarded, "reset to original frame");
    Ok(RevertOutcome {
        restored: baseline,
        discarded,
        depth: history.depth(),
        caller_frame,
    })
}

fn restore<H: DebuggerHost>(host: &mut H, saved: &SavedDebugContext) -> Result<()> {
    host.select_frame(0)?;
    let live = read_registers(host)?;
    write_registers(host, saved, &live)
}

/// Step out of the switch routine's frame into code with source.
fn select_caller<H: DebuggerHost>(host: &mut H) -> bool {
    match host.select_frame(1) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "cannot select caller frame");
            false
        }
    }
}

fn read_registers<H: DebuggerHost>(host: &mut H) -> Result<SavedDebugContext> {
    Ok(SavedDebugContext {
        sp: host.read_register(Register::StackPointer)?,
        fp: host.read_register(Register::FramePointer)?,
        pc: host.read_register(Register::InstructionPointer)?,
    })
}

/// Write `target`; on failure put back `fallback` for whatever was written.
fn write_registers<H: DebuggerHost>(
    host: &mut H,
    target: &SavedDebugContext,
    fallback: &SavedDebugContext,
) -> Result<()> {
    let mut written = Vec::with_capacity(Register::SWITCH_ORDER.len());
    for register in Register::SWITCH_ORDER {
        if let Err(source) = host.write_register(register, target.get(register)) {
            let restored = written.iter().rev().fold(true, |ok, &done: &Register| {
                host.write_register(done, fallback.get(done)).is_ok() && ok
            });
            warn!(%register, error = %source, restored, "register write failed");
            return Err(Error::PartialSwitch { source, restored });
        }
        written.push(register);
    }
    Ok(())
}
