//! Scoped macro definitions.
//!
//! The preprocessor proper is out of scope here; the lexer only consumes a
//! [`DefineStack`] as its expansion hook. Definitions shadow outward, and a
//! routine's definitions disappear when its scope is popped.

use std::collections::HashMap;

/// A stack of name → replacement-text maps.
#[derive(Debug)]
pub struct DefineStack {
    scopes: Vec<HashMap<String, String>>,
}

impl DefineStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    /// Opens a nested definition scope.
    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Closes the innermost definition scope.
    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Drops every scope except the global one.
    pub fn reset_to_global(&mut self) {
        self.scopes.truncate(1);
    }

    /// Defines `name` in the innermost scope.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value.into());
        }
    }

    /// Finds the innermost definition of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).map(String::as_str))
    }
}

impl Default for DefineStack {
    fn default() -> Self {
        Self::new()
    }
}
