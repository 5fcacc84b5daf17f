//! Host debugger abstraction.
//!
//! The inspector never touches the inferior directly. Everything it knows
//! about the runtime comes through [`DebuggerHost`]: type and symbol lookup,
//! expression evaluation, typed reads of inferior memory and the register
//! primitives the context switch needs. Production hosts wrap a real
//! debugger; tests use [`crate::snapshot::SnapshotHost`].

use std::fmt;

use thiserror::Error;

use crate::types::{Address, Register};

/// Result type for host calls
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Failures reported by the host debugger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("no type named `{0}`")]
    UnknownType(String),

    #[error("cannot evaluate `{expr}`: {reason}")]
    Evaluation { expr: String, reason: String },

    #[error("no member named `{member}` in `{ty}`")]
    UnknownMember { ty: String, member: String },

    #[error("cannot access memory at address {0}")]
    MemoryAccess(Address),

    #[error("unexpected value at {address}: {reason}")]
    UnexpectedValue { address: Address, reason: String },

    #[error("cannot write register {register}: {reason}")]
    RegisterWrite { register: Register, reason: String },

    #[error("cannot read register {0}")]
    RegisterRead(Register),

    #[error("no frame at level {0}")]
    NoFrame(u32),

    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

/// A record type resolved by the host.
///
/// Opaque to the inspector: only its name is known. Holding one proves the
/// host has debug information for the type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    name: String,
}

impl TypeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A typed object in inferior memory.
///
/// Building a `Location` from an arbitrary address and type is the
/// equivalent of a C cast: nothing is read until a host accessor is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub address: Address,
    pub ty: TypeHandle,
}

impl Location {
    pub fn new(address: Address, ty: TypeHandle) -> Self {
        Self { address, ty }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} *) {}", self.ty, self.address)
    }
}

/// A resolved code symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolHandle {
    pub name: String,
    pub address: Address,
}

/// Services the inspector consumes from the host debugger.
///
/// Every call is synchronous and treated as atomic. Methods take `&mut self`
/// because hosts typically drive a command channel even for reads.
pub trait DebuggerHost {
    /// Looks up a record type by name.
    fn resolve_type(&mut self, name: &str) -> HostResult<TypeHandle>;

    /// Evaluates an expression denoting an lvalue (a global, a member of a
    /// global, a local variable).
    fn evaluate_expression(&mut self, expr: &str) -> HostResult<Location>;

    /// Locates member `field` inside the object at `value`.
    fn member(&mut self, value: &Location, field: &str) -> HostResult<Location>;

    /// Reads a pointer or reference stored at `value`, yielding its target.
    fn read_address(&mut self, value: &Location) -> HostResult<Address>;

    /// Reads an integral value.
    fn read_integer(&mut self, value: &Location) -> HostResult<i64>;

    /// Reads a NUL-terminated string through the `char *` stored at `value`.
    fn read_string(&mut self, value: &Location) -> HostResult<String>;

    /// Reads an enum value and returns the enumerator's name.
    fn read_enumerator(&mut self, value: &Location) -> HostResult<String>;

    fn read_register(&mut self, register: Register) -> HostResult<Address>;

    fn write_register(&mut self, register: Register, value: Address) -> HostResult<()>;

    /// Makes frame `level` (0 = innermost) the debugger's selected frame.
    fn select_frame(&mut self, level: u32) -> HostResult<()>;

    /// Runs a debugger command and captures its output.
    fn execute_subcommand(&mut self, text: &str) -> HostResult<String>;

    /// Looks up a code symbol; `Ok(None)` when the symbol does not exist.
    fn lookup_symbol(&mut self, name: &str) -> HostResult<Option<SymbolHandle>>;
}

impl<H: DebuggerHost + ?Sized> DebuggerHost for &mut H {
    fn resolve_type(&mut self, name: &str) -> HostResult<TypeHandle> {
        (**self).resolve_type(name)
    }

    fn evaluate_expression(&mut self, expr: &str) -> HostResult<Location> {
        (**self).evaluate_expression(expr)
    }

    fn member(&mut self, value: &Location, field: &str) -> HostResult<Location> {
        (**self).member(value, field)
    }

    fn read_address(&mut self, value: &Location) -> HostResult<Address> {
        (**self).read_address(value)
    }

    fn read_integer(&mut self, value: &Location) -> HostResult<i64> {
        (**self).read_integer(value)
    }

    fn read_string(&mut self, value: &Location) -> HostResult<String> {
        (**self).read_string(value)
    }

    fn read_enumerator(&mut self, value: &Location) -> HostResult<String> {
        (**self).read_enumerator(value)
    }

    fn read_register(&mut self, register: Register) -> HostResult<Address> {
        (**self).read_register(register)
    }

    fn write_register(&mut self, register: Register, value: Address) -> HostResult<()> {
        (**self).write_register(register, value)
    }

    fn select_frame(&mut self, level: u32) -> HostResult<()> {
        (**self).select_frame(level)
    }

    fn execute_subcommand(&mut self, text: &str) -> HostResult<String> {
        (**self).execute_subcommand(text)
    }

    fn lookup_symbol(&mut self, name: &str) -> HostResult<Option<SymbolHandle>> {
        (**self).lookup_symbol(name)
    }
}
