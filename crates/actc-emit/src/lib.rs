//! actc-emit - Bytecode emission for the Action! compiler.
//!
//! Walks a parsed AST in source order and appends bytes to a growing
//! program image. Global declarations become raw data, routines become
//! stack-machine code, and every address the VM will ever see - globals,
//! jump targets, call targets - is planted as an absolute location in the
//! 64 KiB map so execution needs no relocation.

pub mod codegen;
pub mod layout;
pub mod opcode;
mod walk;

pub use codegen::CodeGen;
pub use opcode::{AddrMode, ByteCodeOp, VarScope};
pub use walk::{emit, Emitter, ProgramImage};
