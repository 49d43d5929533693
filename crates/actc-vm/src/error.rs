//! Fatal runtime errors, reported with the offending program counter.

use thiserror::Error;

/// Anything that stops execution abnormally.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("runtime error: unknown opcode {opcode:#04X} at pc {pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16 },

    #[error("runtime error: division by zero at pc {pc:#06X}")]
    DivisionByZero { pc: u16 },

    #[error("runtime error: program counter {pc:#06X} outside the program partition")]
    PcOutOfRange { pc: u16 },

    #[error("runtime error: work stack overflow at pc {pc:#06X}")]
    StackOverflow { pc: u16 },

    #[error("runtime error: work stack underflow at pc {pc:#06X}")]
    StackUnderflow { pc: u16 },

    #[error("runtime error: invalid instruction operand at pc {pc:#06X}")]
    BadOperand { pc: u16 },

    #[error("program image does not fit the program partition")]
    ImageTooLarge,

    #[error("program has no entry routine")]
    NoEntryPoint,

    #[error("i/o error writing output: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExecResult<T> = std::result::Result<T, ExecError>;
