//! Source locations.
//!
//! Action! diagnostics are line-oriented: every token records the file it
//! came from and the line it started on, and errors report both.

use std::fmt;
use std::sync::Arc;

/// A position in some source file.
///
/// The filename is shared rather than cloned per token; a compilation unit
/// produces thousands of tokens that all point at the same file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLoc {
    /// Name of the source file (as given to the lexer).
    pub file: Arc<str>,
    /// Line number, 0-based to match the original tool's reporting.
    pub line: u32,
}

impl SourceLoc {
    /// Creates a location at the start of a file.
    pub fn start_of(file: impl Into<Arc<str>>) -> Self {
        Self {
            file: file.into(),
            line: 0,
        }
    }

    /// Creates a location at an explicit line.
    pub fn new(file: Arc<str>, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_file_colon_line() {
        let loc = SourceLoc::new("prog.act".into(), 12);
        assert_eq!(loc.to_string(), "prog.act:12");
    }

    #[test]
    fn test_start_of_is_line_zero() {
        let loc = SourceLoc::start_of("x.act");
        assert_eq!(loc.line, 0);
    }
}
