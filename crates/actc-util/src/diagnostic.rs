//! Diagnostic collection.
//!
//! Errors abort compilation, but the language also specifies a handful of
//! warnings (zero-padded call arguments, array dimension mismatches) that
//! must be reported without failing the build. Phases push them into a
//! [`Handler`]; the driver decides where they end up.

use std::fmt;

use crate::SourceLoc;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// A warning that does not prevent compilation.
    Warning,
    /// Additional information attached to another diagnostic.
    Note,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
        }
    }
}

/// A single collected message.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub loc: Option<SourceLoc>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, loc: Option<SourceLoc>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
            loc,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.loc {
            Some(loc) => write!(f, "{}: {} at {}", self.level, self.message, loc),
            None => write!(f, "{}: {}", self.level, self.message),
        }
    }
}

/// Accumulates diagnostics for one compilation.
///
/// Each compilation owns its handler; nothing here is process-global, so
/// independent compilations can run in parallel.
#[derive(Debug, Default)]
pub struct Handler {
    diagnostics: Vec<Diagnostic>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning at a source location.
    pub fn warn(&mut self, message: impl Into<String>, loc: SourceLoc) {
        self.diagnostics.push(Diagnostic::warning(message, Some(loc)));
    }

    /// Records a warning with no particular location.
    pub fn warn_global(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(message, None));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == Level::Warning)
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_starts_empty() {
        let handler = Handler::new();
        assert!(!handler.has_warnings());
        assert_eq!(handler.warning_count(), 0);
    }

    #[test]
    fn test_warn_is_collected_in_order() {
        let mut handler = Handler::new();
        handler.warn("first", SourceLoc::new("a.act".into(), 1));
        handler.warn("second", SourceLoc::new("a.act".into(), 2));
        assert_eq!(handler.warning_count(), 2);
        assert_eq!(handler.diagnostics()[0].message, "first");
        assert_eq!(handler.diagnostics()[1].message, "second");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::warning("too few parameters", Some(SourceLoc::new("p.act".into(), 7)));
        assert_eq!(d.to_string(), "warning: too few parameters at p.act:7");
    }
}
