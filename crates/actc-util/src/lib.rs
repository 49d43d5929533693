//! actc-util - Shared infrastructure for the actc compiler.
//!
//! This crate holds the pieces every phase needs: source locations,
//! the compile-error taxonomy, and the diagnostic handler that collects
//! warnings without aborting the build.

mod diagnostic;
mod error;
mod loc;

pub use diagnostic::{Diagnostic, Handler, Level};
pub use error::{CompileError, CompileResult};
pub use loc::SourceLoc;
