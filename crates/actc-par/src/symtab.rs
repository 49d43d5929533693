//! The symbol table: a tree of scopes over the AST arenas.
//!
//! Each scope maps identifiers to entries in insertion order; lookup walks
//! the parent chain and reports how many scopes it ascended. The program
//! scope is the root, and routine scopes hang off it for the duration of
//! routine parsing. Entries are typed indices into the AST arenas, so the
//! table never owns nodes.

use actc_util::{CompileError, CompileResult, SourceLoc};
use indexmap::IndexMap;

use crate::ast::{RoutineId, VarId};
use crate::types::RecordId;

/// Index of a scope in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a name resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Var(VarId),
    Record(RecordId),
    Routine(RoutineId),
}

/// One symbol-table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
}

#[derive(Debug)]
struct Scope {
    /// Insertion order is semantic: declaration-order address assignment
    /// and `last_routine` both rely on it.
    entries: IndexMap<String, Entry>,
    parent: Option<ScopeId>,
}

/// The scope tree. `current` tracks the scope being parsed.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl SymbolTable {
    /// Creates a table containing only the program-global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                entries: IndexMap::new(),
                parent: None,
            }],
            current: ScopeId(0),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    /// Opens a child of the current scope and makes it current.
    pub fn open_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            entries: IndexMap::new(),
            parent: Some(self.current),
        });
        self.current = id;
        id
    }

    /// Returns to the parent scope.
    pub fn close_scope(&mut self) -> CompileResult<()> {
        match self.scopes[self.current.index()].parent {
            Some(parent) => {
                self.current = parent;
                Ok(())
            },
            None => Err(CompileError::internal("cannot close the program scope")),
        }
    }

    /// Introduces a name in the current scope. A name may be introduced
    /// exactly once per scope.
    pub fn add(&mut self, name: &str, kind: EntryKind, loc: &SourceLoc) -> CompileResult<()> {
        let scope = &mut self.scopes[self.current.index()];
        if scope.entries.contains_key(name) {
            return Err(CompileError::identifier(
                format!("duplicate declaration of {name}"),
                loc.clone(),
            ));
        }
        scope.entries.insert(name.to_string(), Entry { kind });
        Ok(())
    }

    /// Resolves a name by walking up the parent chain. Depth 0 means the
    /// current scope defined it; depth ≥ 1 an enclosing scope.
    pub fn find(&self, name: &str) -> Option<(Entry, usize)> {
        let mut scope_id = self.current;
        let mut depth = 0;
        loop {
            let scope = &self.scopes[scope_id.index()];
            if let Some(entry) = scope.entries.get(name) {
                return Some((*entry, depth));
            }
            scope_id = scope.parent?;
            depth += 1;
        }
    }

    /// The most recently declared routine in the program scope; the VM
    /// host uses it as the program entry point.
    pub fn last_routine(&self) -> Option<RoutineId> {
        self.scopes[0]
            .entries
            .values()
            .rev()
            .find_map(|entry| match entry.kind {
                EntryKind::Routine(id) => Some(id),
                _ => None,
            })
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLoc {
        SourceLoc::start_of("<test>")
    }

    #[test]
    fn test_add_and_find_in_current_scope() {
        let mut table = SymbolTable::new();
        table.add("x", EntryKind::Var(VarId(0)), &loc()).unwrap();
        let (entry, depth) = table.find("x").unwrap();
        assert_eq!(entry.kind, EntryKind::Var(VarId(0)));
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut table = SymbolTable::new();
        table.add("x", EntryKind::Var(VarId(0)), &loc()).unwrap();
        assert!(table.add("x", EntryKind::Var(VarId(1)), &loc()).is_err());
    }

    #[test]
    fn test_shadowing_across_scopes_and_depth() {
        let mut table = SymbolTable::new();
        table.add("x", EntryKind::Var(VarId(0)), &loc()).unwrap();
        table.add("g", EntryKind::Var(VarId(1)), &loc()).unwrap();
        table.open_scope();
        table.add("x", EntryKind::Var(VarId(2)), &loc()).unwrap();

        let (entry, depth) = table.find("x").unwrap();
        assert_eq!(entry.kind, EntryKind::Var(VarId(2)));
        assert_eq!(depth, 0);

        let (entry, depth) = table.find("g").unwrap();
        assert_eq!(entry.kind, EntryKind::Var(VarId(1)));
        assert_eq!(depth, 1);

        table.close_scope().unwrap();
        let (entry, depth) = table.find("x").unwrap();
        assert_eq!(entry.kind, EntryKind::Var(VarId(0)));
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_not_found() {
        let table = SymbolTable::new();
        assert!(table.find("missing").is_none());
    }

    #[test]
    fn test_close_program_scope_is_internal_error() {
        let mut table = SymbolTable::new();
        assert!(table.close_scope().is_err());
    }

    #[test]
    fn test_last_routine_is_most_recent_in_root() {
        let mut table = SymbolTable::new();
        assert_eq!(table.last_routine(), None);
        table.add("a", EntryKind::Routine(RoutineId(0)), &loc()).unwrap();
        table.add("x", EntryKind::Var(VarId(0)), &loc()).unwrap();
        table.add("b", EntryKind::Routine(RoutineId(1)), &loc()).unwrap();
        assert_eq!(table.last_routine(), Some(RoutineId(1)));
    }
}
