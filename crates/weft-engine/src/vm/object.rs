//! Heap objects
//!
//! An object keeps its identity for life while the classes it wears come
//! and go. Its field storage is sparse: a field exists exactly while its
//! declaring class is part of the object's manifest.

use super::ids::FreshId;
use super::manifest::{Manifest, VTable};
use super::random::ObjectRng;
use super::value::Value;
use crate::compiler::classes::{ClassId, FieldId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable object handle
pub type ObjectRef = Rc<RefCell<Object>>;

/// Object instance
pub struct Object {
    id: FreshId,
    pub(crate) worn: Vec<ClassId>,
    pub(crate) manifest: Manifest,
    pub(crate) types: FxHashSet<ClassId>,
    pub(crate) vtable: Rc<VTable>,
    pub(crate) fields: FxHashMap<FieldId, Value>,
    pub(crate) rng: ObjectRng,
}

impl Object {
    /// Unmanifested object wearing `worn`
    pub(crate) fn new(id: FreshId, worn: Vec<ClassId>) -> Self {
        Self {
            id,
            worn,
            manifest: Manifest::new(),
            types: FxHashSet::default(),
            vtable: Rc::new(VTable::default()),
            fields: FxHashMap::default(),
            rng: ObjectRng::new(),
        }
    }

    /// Stable identifier
    pub fn id(&self) -> &FreshId {
        &self.id
    }

    /// Worn classes, in the order they were put on
    pub fn worn(&self) -> &[ClassId] {
        &self.worn
    }

    /// Current manifest
    pub fn manifest(&self) -> &[ClassId] {
        &self.manifest
    }

    /// Whether the object currently embodies `class`
    pub fn has_type(&self, class: ClassId) -> bool {
        self.types.contains(&class)
    }

    /// Current method table
    pub fn vtable(&self) -> &Rc<VTable> {
        &self.vtable
    }

    /// Stored field value
    pub fn field(&self, id: FieldId) -> Option<&Value> {
        self.fields.get(&id)
    }

    /// Stored fields in storage-key order
    pub fn fields(&self) -> Vec<(FieldId, Value)> {
        let mut fields: Vec<(FieldId, Value)> = self.fields.iter().map(|(id, v)| (*id, v.clone())).collect();
        fields.sort_by_key(|(id, _)| *id);
        fields
    }

    /// Number of stored fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("worn", &self.worn)
            .field("fields", &self.fields.len())
            .finish()
    }
}
