//! Compile-error taxonomy.
//!
//! The compiler aborts on the first error: each phase returns
//! [`CompileResult`] and the driver prints the error with its source
//! location. Warnings are not errors; they go through the
//! [`Handler`](crate::Handler) instead.

use thiserror::Error;

use crate::SourceLoc;

/// Any error produced while turning source text into a program image.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Invalid character, unterminated string, bad hex digit.
    #[error("lex error: {message} at {loc}")]
    Lex { message: String, loc: SourceLoc },

    /// Unexpected token, missing keyword, malformed construct.
    #[error("syntax error: {message} at {loc}")]
    Syntax { message: String, loc: SourceLoc },

    /// Undeclared name, wrong-kind use, duplicate declaration.
    #[error("identifier error: {message} at {loc}")]
    Identifier { message: String, loc: SourceLoc },

    /// Assignment to a non-variable, dereference of a non-pointer,
    /// relational expression where arithmetic is required, record used
    /// as a parameter.
    #[error("type error: {message} at {loc}")]
    Type { message: String, loc: SourceLoc },

    /// An invariant violation in the emitter or symbol table.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn lex(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::Lex {
            message: message.into(),
            loc,
        }
    }

    pub fn syntax(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::Syntax {
            message: message.into(),
            loc,
        }
    }

    pub fn identifier(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::Identifier {
            message: message.into(),
            loc,
        }
    }

    pub fn type_error(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::Type {
            message: message.into(),
            loc,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result type used by every compiler phase.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
