//! Module-level symbol and export tables
//!
//! Every name visible at module scope maps to a [`Binding`]. Locally
//! declared names (classes, fabrics, imports, aliases) shadow names brought
//! in by wildcards; two wildcards that bring the same name with different
//! targets leave it ambiguous, and an ambiguous name resolves to nothing.

use super::error::ResolveError;
use crate::compiler::classes::ClassId;
use crate::compiler::module::{FabricId, ModuleId};
use crate::parser::Span;
use rustc_hash::FxHashMap;

/// What a module-level name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Another module
    Module(ModuleId),
    /// A class
    Class(ClassId),
    /// A fabric value
    Fabric(FabricId),
}

/// How a name entered the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Declared in this module
    Local,
    /// Brought in by a wildcard
    Nonlocal,
}

/// A resolved module-level name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Referent
    pub target: Target,
    /// Local or nonlocal
    pub origin: Origin,
    /// Where the binding was introduced
    pub span: Span,
}

#[derive(Debug, Clone)]
enum SymbolEntry {
    Bound(Binding),
    Ambiguous,
}

/// Module-scope symbol table
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: FxHashMap<String, SymbolEntry>,
}

impl SymbolTable {
    /// Create an empty symbol table
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a locally declared name.
    ///
    /// Replaces a nonlocal or ambiguous entry; a second local with the same
    /// name is an error.
    pub fn define_local(&mut self, name: &str, target: Target, span: Span) -> Result<(), ResolveError> {
        if let Some(SymbolEntry::Bound(existing)) = self.entries.get(name) {
            if existing.origin == Origin::Local {
                return Err(ResolveError::DuplicateSymbol {
                    name: name.to_string(),
                    span,
                });
            }
        }
        self.entries.insert(
            name.to_string(),
            SymbolEntry::Bound(Binding {
                target,
                origin: Origin::Local,
                span,
            }),
        );
        Ok(())
    }

    /// Define a name brought in by a wildcard
    pub fn define_nonlocal(&mut self, name: &str, target: Target, span: Span) {
        match self.entries.get(name) {
            None => {
                self.entries.insert(
                    name.to_string(),
                    SymbolEntry::Bound(Binding {
                        target,
                        origin: Origin::Nonlocal,
                        span,
                    }),
                );
            }
            Some(SymbolEntry::Bound(existing)) if existing.origin == Origin::Local => {}
            Some(SymbolEntry::Bound(existing)) if existing.target == target => {}
            Some(_) => {
                self.entries.insert(name.to_string(), SymbolEntry::Ambiguous);
            }
        }
    }

    /// Look up a name; ambiguous names resolve to nothing
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        match self.entries.get(name)? {
            SymbolEntry::Bound(binding) => Some(binding),
            SymbolEntry::Ambiguous => None,
        }
    }

    /// Whether the name is ambiguous between two nonlocal bindings
    pub fn is_ambiguous(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(SymbolEntry::Ambiguous))
    }

    /// Number of entries, ambiguous ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Names a module makes visible to its importers
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    entries: FxHashMap<String, Target>,
}

impl ExportTable {
    /// Create an empty export table
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `name`
    pub fn insert(&mut self, name: &str, target: Target) {
        self.entries.insert(name.to_string(), target);
    }

    /// Look up an exported name
    pub fn get(&self, name: &str) -> Option<Target> {
        self.entries.get(name).copied()
    }

    /// Exported names and their targets
    pub fn iter(&self) -> impl Iterator<Item = (&str, Target)> {
        self.entries.iter().map(|(name, target)| (name.as_str(), *target))
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is exported
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: u32) -> Target {
        Target::Class(ClassId::new(id))
    }

    #[test]
    fn test_duplicate_local() {
        let mut table = SymbolTable::new();
        table.define_local("Point", class(0), Span::default()).unwrap();
        let err = table.define_local("Point", class(1), Span::default()).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateSymbol { ref name, .. } if name == "Point"));
    }

    #[test]
    fn test_local_wins_over_nonlocal() {
        let mut table = SymbolTable::new();
        table.define_nonlocal("Point", class(0), Span::default());
        table.define_local("Point", class(1), Span::default()).unwrap();
        table.define_nonlocal("Point", class(2), Span::default());

        let binding = table.lookup("Point").unwrap();
        assert_eq!(binding.target, class(1));
        assert_eq!(binding.origin, Origin::Local);
    }

    #[test]
    fn test_two_nonlocals_are_ambiguous() {
        let mut table = SymbolTable::new();
        table.define_nonlocal("Shape", class(0), Span::default());
        table.define_nonlocal("Shape", class(1), Span::default());
        assert!(table.lookup("Shape").is_none());
        assert!(table.is_ambiguous("Shape"));

        // A local declaration still resolves the ambiguity
        table.define_local("Shape", class(2), Span::default()).unwrap();
        assert_eq!(table.lookup("Shape").unwrap().target, class(2));
    }

    #[test]
    fn test_same_nonlocal_twice_is_not_ambiguous() {
        let mut table = SymbolTable::new();
        table.define_nonlocal("Shape", class(0), Span::default());
        table.define_nonlocal("Shape", class(0), Span::default());
        assert_eq!(table.lookup("Shape").unwrap().target, class(0));
    }

    #[test]
    fn test_export_table() {
        let mut exports = ExportTable::new();
        exports.insert("Point", class(3));
        assert_eq!(exports.get("Point"), Some(class(3)));
        assert_eq!(exports.get("Missing"), None);
        assert_eq!(exports.iter().count(), 1);
    }
}
