//! actc-vm - The bytecode virtual machine.
//!
//! Executes a program image produced by `actc-emit` against a 64 KiB
//! linear address space with partitioned regions for code and two stacks.
//! Execution is strictly synchronous and deterministic: `run` proceeds to
//! a normal halt (RETURN from the entry frame or BREAK) or to the first
//! fatal [`ExecError`].

mod error;
mod vm;

pub use error::{ExecError, ExecResult};
pub use vm::Vm;
