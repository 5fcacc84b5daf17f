//! Core inspection types
//!
//! Addresses, registers, task states and the rows handed to the
//! presentation layer.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Address in the inferior's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub u64);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address displaced by `delta` bytes, wrapping on overflow
    pub fn offset(self, delta: i64) -> Address {
        Address(self.0.wrapping_add_signed(delta))
    }

    /// Parse a `0x`-prefixed hexadecimal literal.
    pub fn parse_hex(text: &str) -> Option<Address> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))?;
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl Visitor<'_> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer or a 0x-prefixed hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Address, E> {
                Ok(Address(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Address, E> {
                u64::try_from(v)
                    .map(Address)
                    .map_err(|_| E::custom(format!("negative address: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
                Address::parse_hex(v).ok_or_else(|| E::custom(format!("invalid address: {v}")))
            }
        }

        deserializer.deserialize_any(AddressVisitor)
    }
}

/// Registers the context switch reprograms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    StackPointer,
    FramePointer,
    InstructionPointer,
}

impl Register {
    /// Registers in the order a switch writes them
    pub const SWITCH_ORDER: [Register; 3] = [
        Register::StackPointer,
        Register::FramePointer,
        Register::InstructionPointer,
    ];

    /// Name of the register as gdb spells it in expressions
    pub fn gdb_name(self) -> &'static str {
        match self {
            Register::StackPointer => "$sp",
            Register::FramePointer => "$fp",
            Register::InstructionPointer => "$pc",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gdb_name())
    }
}

/// Snapshot of the debugger's live register view.
///
/// Taken before every context switch so the switch can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SavedDebugContext {
    pub sp: Address,
    pub fp: Address,
    pub pc: Address,
}

impl SavedDebugContext {
    pub fn get(&self, register: Register) -> Address {
        match register {
            Register::StackPointer => self.sp,
            Register::FramePointer => self.fp,
            Register::InstructionPointer => self.pc,
        }
    }
}

impl fmt::Display for SavedDebugContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sp={} fp={} pc={}", self.sp, self.fp, self.pc)
    }
}

/// Execution state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Start,
    Ready,
    Running,
    Blocked,
    Terminate,
}

impl TaskState {
    pub const ALL: [TaskState; 5] = [
        TaskState::Start,
        TaskState::Ready,
        TaskState::Running,
        TaskState::Blocked,
        TaskState::Terminate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Start => "Start",
            TaskState::Ready => "Ready",
            TaskState::Running => "Running",
            TaskState::Blocked => "Blocked",
            TaskState::Terminate => "Terminate",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == TaskState::Terminate
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    /// Accepts both bare enumerators and qualified ones (`uBaseTask::Blocked`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.rsplit("::").next().unwrap_or(s).trim();
        TaskState::ALL
            .into_iter()
            .find(|state| state.as_str() == bare)
            .ok_or_else(|| format!("unknown task state `{s}`"))
    }
}

/// Human-facing task number.
///
/// Non-negative for user tasks, negative for runtime-internal ones. Not
/// stable across runtime mutation: recomputed on every traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn is_system(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// One cluster in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRow {
    pub name: String,
    pub address: Address,
}

/// One virtual processor in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorRow {
    pub address: Address,
    /// OS-assigned thread id
    pub os_id: i64,
    /// Preemption time slice, zero when preemption is off
    pub preemption: u64,
    /// Spin count before the processor sleeps, zero when it never spins
    pub spin: u64,
}

impl ProcessorRow {
    pub fn preemption_enabled(&self) -> bool {
        self.preemption != 0
    }

    pub fn spins(&self) -> bool {
        self.spin != 0
    }
}

/// One task in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: TaskId,
    pub name: String,
    pub address: Address,
    pub state: TaskState,
    /// Whether the debugger is currently showing this task's stack
    pub current: bool,
}

/// Tasks of one cluster, as produced by the all-clusters listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterTasks {
    pub cluster: ClusterRow,
    pub tasks: Vec<TaskRow>,
}
