//! Manifestation and the method-table cache
//!
//! An object's manifest is the ancestor closure of its worn classes,
//! parents before children, each class once. Method tables are built one
//! manifest prefix at a time: the table for `[A, B, C]` is the table for
//! `[A, B]` with `C`'s own bodies laid over it. Every layer is cached, so
//! objects with the same manifest share one table instance.

use crate::compiler::classes::{ClassId, ClassRegistry};
use crate::compiler::ir::Unit;
use crate::parser::types::MethodSlot;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::rc::Rc;

/// Ordered ancestor closure of a worn class list
pub type Manifest = SmallVec<[ClassId; 8]>;

/// Compute the manifest of `worn`
pub fn compute_manifest(classes: &ClassRegistry, worn: &[ClassId]) -> Manifest {
    fn visit(classes: &ClassRegistry, class: ClassId, seen: &mut FxHashSet<ClassId>, out: &mut Manifest) {
        if !seen.insert(class) {
            return;
        }
        if let Some(def) = classes.get(class) {
            for &parent in &def.parents {
                visit(classes, parent, seen, out);
            }
        }
        out.push(class);
    }

    let mut seen = FxHashSet::default();
    let mut out = Manifest::new();
    for &class in worn {
        visit(classes, class, &mut seen, &mut out);
    }
    out
}

/// Method table of one manifest
#[derive(Debug, Default)]
pub struct VTable {
    methods: FxHashMap<MethodSlot, Rc<Unit>>,
}

impl VTable {
    /// Implementation bound to `slot`
    pub fn get(&self, slot: &MethodSlot) -> Option<&Rc<Unit>> {
        self.methods.get(slot)
    }

    /// Number of bound slots
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no slot is bound
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Layers found in the cache
    pub hits: u64,
    /// Layers built
    pub misses: u64,
    /// Cached layers
    pub entries: usize,
}

/// Method tables keyed by manifest prefix
#[derive(Debug, Default)]
pub struct ManifestCache {
    tables: FxHashMap<Manifest, Rc<VTable>>,
    hits: u64,
    misses: u64,
}

impl ManifestCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Method table for `manifest`, building and caching missing layers
    pub fn vtable(&mut self, classes: &ClassRegistry, manifest: &[ClassId]) -> Rc<VTable> {
        let mut table = self.layer(&[], || Rc::new(VTable::default()));
        for len in 1..=manifest.len() {
            let prefix = &manifest[..len];
            let below = table.clone();
            table = self.layer(prefix, || {
                let mut methods = below.methods.clone();
                if let Some(def) = classes.get(prefix[len - 1]) {
                    for (slot, unit) in &def.bodies {
                        methods.insert(slot.clone(), unit.clone());
                    }
                }
                Rc::new(VTable { methods })
            });
        }
        table
    }

    fn layer(&mut self, prefix: &[ClassId], build: impl FnOnce() -> Rc<VTable>) -> Rc<VTable> {
        if let Some(table) = self.tables.get(prefix) {
            self.hits += 1;
            tracing::trace!(layers = prefix.len(), "method table cache hit");
            return table.clone();
        }
        self.misses += 1;
        tracing::trace!(layers = prefix.len(), "method table cache miss");
        let table = build();
        self.tables.insert(prefix.iter().copied().collect(), table.clone());
        table
    }

    /// Forget every layer mentioning a class at or after `first`
    pub fn evict_from(&mut self, first: ClassId) {
        self.tables.retain(|manifest, _| manifest.iter().all(|c| *c < first));
    }

    /// Hit, miss and size counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.tables.len(),
        }
    }
}
