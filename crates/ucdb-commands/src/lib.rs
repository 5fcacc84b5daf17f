//! uC++ debugger commands.
//!
//! `info clusters`, `info vprocessors`, `task`, `prevtask` and `reset`,
//! parsed from command lines and rendered as the debugger prints them.

pub mod argv;
pub mod command;
pub mod console;
pub mod error;
pub mod render;

pub use command::{Command, CommandName, TaskCommand, TaskTarget};
pub use console::Console;
pub use error::UsageError;
