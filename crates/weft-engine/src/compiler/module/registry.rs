//! Module registry
//!
//! Imported modules are kept for the lifetime of an engine and never
//! re-imported; lookups go by id or by URL.

use crate::compiler::classes::ClassId;
use crate::parser::checker::{ExportTable, SymbolTable};
use crate::vm::Value;
use rustc_hash::FxHashMap;

/// Unique identifier for an imported module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Create a ModuleId from a raw value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value of this ModuleId
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// A fabric declared by a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FabricId {
    /// Declaring module
    pub module: ModuleId,
    /// Declaration index within the module
    pub index: u32,
}

/// An imported module
#[derive(Debug)]
pub struct Module {
    /// Registry id (assigned on registration)
    pub id: ModuleId,
    /// URL the module was fetched from
    pub url: String,
    /// Whether the module may declare parentless classes
    pub privileged: bool,
    /// SHA-256 of the fetched text
    pub checksum: [u8; 32],
    /// Module-scope names
    pub symbols: SymbolTable,
    /// Names visible to importers
    pub exports: ExportTable,
    /// Main class, if declared
    pub main: Option<ClassId>,
    /// Classes declared by the module, in declaration order
    pub classes: Vec<ClassId>,
    /// Fabric values, by declaration index
    pub fabrics: Vec<Value>,
    /// Copyright lines
    pub copyright: Vec<String>,
    /// License text
    pub license: String,
}

impl Module {
    /// Create an empty module record
    pub fn new(url: &str, privileged: bool, checksum: [u8; 32]) -> Self {
        Self {
            id: ModuleId(0),
            url: url.to_string(),
            privileged,
            checksum,
            symbols: SymbolTable::new(),
            exports: ExportTable::new(),
            main: None,
            classes: Vec::new(),
            fabrics: Vec::new(),
            copyright: Vec::new(),
            license: String::new(),
        }
    }

    /// Checksum as lowercase hex
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }
}

/// Registry of imported modules
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    by_url: FxHashMap<String, ModuleId>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next registered module will get
    pub fn next_id(&self) -> ModuleId {
        ModuleId(self.modules.len() as u32)
    }

    /// Register a module, assigning its id
    pub fn register(&mut self, mut module: Module) -> ModuleId {
        let id = self.next_id();
        module.id = id;
        self.by_url.insert(module.url.clone(), id);
        self.modules.push(module);
        id
    }

    /// Module by id
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.0 as usize)
    }

    /// Id of the module imported from `url`
    pub fn id_of(&self, url: &str) -> Option<ModuleId> {
        self.by_url.get(url).copied()
    }

    /// Module imported from `url`
    pub fn get_by_url(&self, url: &str) -> Option<&Module> {
        self.id_of(url).and_then(|id| self.get(id))
    }

    /// Whether `url` has been imported
    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// Value of a fabric
    pub fn fabric(&self, id: FabricId) -> Option<&Value> {
        self.get(id.module)?.fabrics.get(id.index as usize)
    }

    /// Number of imported modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing has been imported
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterate over imported modules in import-completion order
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_ids() {
        let mut registry = ModuleRegistry::new();
        let a = registry.register(Module::new("a", false, [0; 32]));
        let b = registry.register(Module::new("b", true, [1; 32]));
        assert_eq!(a, ModuleId::new(0));
        assert_eq!(b, ModuleId::new(1));
        assert_eq!(registry.id_of("b"), Some(b));
        assert!(registry.get_by_url("b").unwrap().privileged);
        assert!(!registry.contains("c"));
    }

    #[test]
    fn test_checksum_hex() {
        let module = Module::new("a", false, [0xab; 32]);
        assert_eq!(module.checksum_hex(), "ab".repeat(32));
    }
}
