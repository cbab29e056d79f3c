//! Runtime state and the object model
//!
//! The runtime owns the class registry, the method-table cache and the
//! identifier odometer of one engine. Objects change shape through
//! [`Runtime::extend`] and [`Runtime::retract`]; both recompute the
//! manifest, swap in the cached method table, drop fields of classes that
//! left and initialize fields of classes that arrived.

use super::ids::{FreshId, FreshIds};
use super::manifest::{compute_manifest, ManifestCache};
use super::object::{Object, ObjectRef};
use super::random::ObjectRng;
use super::suggestion::Suggestion;
use super::value::{Collection, Value};
use super::{VmError, VmResult};
use crate::compiler::classes::{ClassId, ClassRegistry, FieldId};
use crate::config::RuntimeOptions;
use crate::parser::types::{MethodSlot, Type};
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A field an object currently has, as seen by hosts and serializers
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    /// Storage key
    pub id: FieldId,
    /// Identifier prefix of the declaring class
    pub class: String,
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: Type,
}

/// Object runtime of one engine
#[derive(Debug)]
pub struct Runtime {
    pub(crate) classes: ClassRegistry,
    pub(crate) manifests: ManifestCache,
    pub(crate) ids: FreshIds,
    pub(crate) depth: usize,
    tick: u64,
    options: RuntimeOptions,
}

impl Runtime {
    /// Create a runtime with an empty class registry
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            classes: ClassRegistry::new(),
            manifests: ManifestCache::new(),
            ids: FreshIds::new(),
            depth: 0,
            tick: 0,
            options,
        }
    }

    /// Class registry
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Mutable class registry, for the import pipeline
    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    /// Method-table cache
    pub fn manifests(&self) -> &ManifestCache {
        &self.manifests
    }

    /// Forget classes declared from `len` on, with their cached tables
    pub fn truncate_classes(&mut self, len: usize) {
        if len < self.classes.len() {
            self.manifests.evict_from(ClassId::new(len as u32));
            self.classes.truncate(len);
        }
    }

    /// Identifier odometer
    pub fn ids(&self) -> &FreshIds {
        &self.ids
    }

    /// Limits
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Current logical tick
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Start the next logical tick; random streams reseed on their next draw
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Mint an identifier
    pub fn fresh_id(&mut self) -> FreshId {
        self.ids.next()
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// New array holding `items`
    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::Array(Collection::new(self.ids.next(), items))
    }

    /// New empty map
    pub fn new_map(&mut self) -> Value {
        Value::Map(Collection::new(self.ids.next(), BTreeMap::new()))
    }

    /// New empty set
    pub fn new_set(&mut self) -> Value {
        Value::Set(Collection::new(self.ids.next(), BTreeMap::new()))
    }

    /// Default value of `ty`.
    ///
    /// A constructed default creates empty containers; a nil default leaves
    /// containers and objects null.
    pub fn default_value(&mut self, ty: &Type, constructed: bool) -> Value {
        match ty {
            Type::Num => Value::Num(0.0),
            Type::Str => Value::str(""),
            Type::Bool => Value::Bool(false),
            Type::Suggestion => Value::Suggestion(Rc::new(Suggestion::new())),
            Type::Tuple(elements) => {
                let items: Vec<Value> = elements.iter().map(|t| self.default_value(t, constructed)).collect();
                Value::Tuple(items.into())
            }
            Type::Array(_) if constructed => self.new_array(Vec::new()),
            Type::Map(..) if constructed => self.new_map(),
            Type::Set(_) if constructed => self.new_set(),
            _ => Value::Null,
        }
    }

    /// Shallow copy with a fresh identity; primitives and tuples are
    /// returned as they are
    pub fn clone_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(source) => {
                let id = self.ids.next();
                let source = source.borrow();
                let mut copy = Object::new(id, source.worn.clone());
                copy.manifest = source.manifest.clone();
                copy.types = source.types.clone();
                copy.vtable = source.vtable.clone();
                copy.fields = source.fields.clone();
                copy.rng = ObjectRng::new();
                Value::Object(Rc::new(RefCell::new(copy)))
            }
            Value::Array(a) => {
                let items = a.items().clone();
                Value::Array(Collection::new(self.ids.next(), items))
            }
            Value::Map(m) => {
                let items = m.items().clone();
                Value::Map(Collection::new(self.ids.next(), items))
            }
            Value::Set(s) => {
                let items = s.items().clone();
                Value::Set(Collection::new(self.ids.next(), items))
            }
            other => other.clone(),
        }
    }

    /// Next number from `obj`'s deterministic stream
    pub fn draw_random(&mut self, obj: &ObjectRef) -> f64 {
        let mut obj = obj.borrow_mut();
        let id = obj.id().clone();
        obj.rng.next_f64(&id, self.tick)
    }

    // ------------------------------------------------------------------
    // Object lifecycle
    // ------------------------------------------------------------------

    /// Create an object wearing `class`, with every field initialized
    pub fn instantiate(&mut self, class: ClassId) -> VmResult<ObjectRef> {
        if self.classes.get(class).is_none() {
            return Err(VmError::UnknownClass { class });
        }
        let obj = Rc::new(RefCell::new(Object::new(self.ids.next(), vec![class])));
        self.remanifest(&obj)?;
        Ok(obj)
    }

    /// Put `class` on `obj`.
    ///
    /// Already worn: nothing happens. Already implied by another worn
    /// class: the worn list grows but the manifest is unchanged.
    pub fn extend(&mut self, obj: &ObjectRef, class: ClassId) -> VmResult<()> {
        if self.classes.get(class).is_none() {
            return Err(VmError::UnknownClass { class });
        }
        let implied = {
            let mut o = obj.borrow_mut();
            if o.worn.contains(&class) {
                return Ok(());
            }
            o.worn.push(class);
            o.types.contains(&class)
        };
        if implied {
            return Ok(());
        }
        self.remanifest(obj)
    }

    /// Take `class` off `obj` if worn, then remanifest
    pub fn retract(&mut self, obj: &ObjectRef, class: ClassId) -> VmResult<()> {
        obj.borrow_mut().worn.retain(|c| *c != class);
        self.remanifest(obj)
    }

    /// Recompute manifest, types and method table from the worn list
    pub(crate) fn install_manifest(&mut self, obj: &ObjectRef) {
        let worn = obj.borrow().worn.clone();
        let manifest = compute_manifest(&self.classes, &worn);
        let vtable = self.manifests.vtable(&self.classes, &manifest);
        let types: FxHashSet<ClassId> = manifest.iter().copied().collect();

        let mut o = obj.borrow_mut();
        o.fields.retain(|id, _| types.contains(&id.owner));
        o.types = types;
        o.manifest = manifest;
        o.vtable = vtable;
    }

    fn remanifest(&mut self, obj: &ObjectRef) -> VmResult<()> {
        self.install_manifest(obj);
        self.initialize_missing(obj)
    }

    /// Initialize every field of the manifest the object does not hold,
    /// in manifest order, then declaration order
    pub(crate) fn initialize_missing(&mut self, obj: &ObjectRef) -> VmResult<()> {
        let manifest = obj.borrow().manifest.clone();
        let mut pending = Vec::new();
        for class in manifest {
            let Some(def) = self.classes.get(class) else { continue };
            for (index, field) in def.own_fields().iter().enumerate() {
                let id = FieldId {
                    owner: class,
                    index: index as u32,
                };
                if obj.borrow().fields.contains_key(&id) {
                    continue;
                }
                pending.push((id, field.ty.clone(), def.initializers.get(&field.name).cloned()));
            }
        }

        let this = Value::Object(obj.clone());
        for (id, ty, initializer) in pending {
            let value = match initializer {
                Some(unit) => self.invoke(&unit, this.clone(), Value::Null, Vec::new())?,
                None => self.default_value(&ty, true),
            };
            let mut o = obj.borrow_mut();
            if o.types.contains(&id.owner) {
                o.fields.entry(id).or_insert(value);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Host access
    // ------------------------------------------------------------------

    /// Fields `obj` currently has, in manifest then declaration order
    pub fn field_types(&self, obj: &ObjectRef) -> Vec<FieldView> {
        let o = obj.borrow();
        let mut views = Vec::new();
        for &class in o.manifest() {
            let Some(def) = self.classes.get(class) else { continue };
            for (index, field) in def.own_fields().iter().enumerate() {
                views.push(FieldView {
                    id: FieldId {
                        owner: class,
                        index: index as u32,
                    },
                    class: def.prefix.clone(),
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                });
            }
        }
        views
    }

    /// Value of the field called `name`; the most derived declaration wins
    pub fn get_field(&self, obj: &ObjectRef, name: &str) -> Option<Value> {
        let view = self.field_types(obj).into_iter().rev().find(|v| v.name == name)?;
        obj.borrow().field(view.id).cloned()
    }

    /// Dispatch slot of the method called `name` on `obj`
    pub fn method_slot(&self, obj: &ObjectRef, name: &str) -> Option<(MethodSlot, Type, usize)> {
        let o = obj.borrow();
        o.manifest().iter().rev().find_map(|class| {
            let sig = self.classes.get(*class)?.method(name)?;
            Some((sig.slot(), sig.ret.clone(), sig.params.len()))
        })
    }

    /// Call the method called `name` on `obj` on behalf of a host
    pub fn call(&mut self, obj: &ObjectRef, name: &str, caller: Value, args: Vec<Value>) -> VmResult<Value> {
        let (slot, ret, arity) = self
            .method_slot(obj, name)
            .ok_or_else(|| VmError::UnknownMethod { name: name.to_string() })?;
        if arity != args.len() {
            return Err(VmError::ArgumentCount {
                method: name.to_string(),
                expected: arity,
                actual: args.len(),
            });
        }
        self.dispatch(&Value::Object(obj.clone()), &slot, caller, args, &ret)
    }

    /// Dynamic dispatch; a null receiver or an unbound slot yields the nil
    /// default of `ret`
    pub(crate) fn dispatch(
        &mut self,
        target: &Value,
        slot: &MethodSlot,
        caller: Value,
        args: Vec<Value>,
        ret: &Type,
    ) -> VmResult<Value> {
        let unit = match target {
            Value::Object(obj) => obj.borrow().vtable().get(slot).cloned(),
            _ => None,
        };
        match unit {
            Some(unit) => self.invoke(&unit, target.clone(), caller, args),
            None => {
                tracing::trace!(method = %slot, "call without implementation returns default");
                Ok(self.default_value(ret, false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::classes::MemberSpec;
    use crate::compiler::module::ModuleId;
    use crate::parser::Span;

    fn field(name: &str, ty: Type) -> MemberSpec {
        MemberSpec::Field {
            name: name.to_string(),
            ty,
            span: Span::default(),
        }
    }

    /// Base { hp: num }, Flying { wings: array<num> }
    fn runtime() -> (Runtime, ClassId, ClassId) {
        let mut rt = Runtime::new(RuntimeOptions::default());
        let module = ModuleId::new(0);
        let base = rt.classes_mut().declare("Base", "m", module, Span::default());
        rt.classes_mut().compose(base, vec![], vec![field("hp", Type::Num)]).unwrap();
        let flying = rt.classes_mut().declare("Flying", "m", module, Span::default());
        rt.classes_mut()
            .compose(flying, vec![base], vec![field("wings", Type::array(Type::Num))])
            .unwrap();
        (rt, base, flying)
    }

    #[test]
    fn test_instantiate_initializes_fields() {
        let (mut rt, base, _) = runtime();
        let obj = rt.instantiate(base).unwrap();
        assert_eq!(rt.get_field(&obj, "hp"), Some(Value::Num(0.0)));
        assert_eq!(obj.borrow().field_count(), 1);
        assert!(rt.instantiate(ClassId::new(99)).is_err());
    }

    #[test]
    fn test_extend_keeps_existing_fields() {
        let (mut rt, base, flying) = runtime();
        let obj = rt.instantiate(base).unwrap();
        let hp = rt.classes().get(base).unwrap().own_field_id("hp").unwrap();
        obj.borrow_mut().fields.insert(hp, Value::Num(7.0));

        rt.extend(&obj, flying).unwrap();
        assert_eq!(rt.get_field(&obj, "hp"), Some(Value::Num(7.0)));
        assert!(matches!(rt.get_field(&obj, "wings"), Some(Value::Array(_))));
        assert!(obj.borrow().has_type(flying));
    }

    #[test]
    fn test_extend_then_retract_restores_shape() {
        let (mut rt, base, flying) = runtime();
        let obj = rt.instantiate(base).unwrap();
        let before_table = obj.borrow().vtable().clone();
        let before_fields: Vec<FieldId> = obj.borrow().fields().into_iter().map(|(id, _)| id).collect();

        rt.extend(&obj, flying).unwrap();
        rt.retract(&obj, flying).unwrap();

        let after_fields: Vec<FieldId> = obj.borrow().fields().into_iter().map(|(id, _)| id).collect();
        assert_eq!(before_fields, after_fields);
        assert!(Rc::ptr_eq(&before_table, obj.borrow().vtable()));
        assert_eq!(obj.borrow().worn(), &[base]);
    }

    #[test]
    fn test_extend_with_implied_class_keeps_manifest() {
        let (mut rt, base, flying) = runtime();
        let obj = rt.instantiate(flying).unwrap();
        let manifest = obj.borrow().manifest().to_vec();
        rt.extend(&obj, base).unwrap();
        assert_eq!(obj.borrow().worn(), &[flying, base]);
        assert_eq!(obj.borrow().manifest(), manifest.as_slice());
    }

    #[test]
    fn test_default_values() {
        let mut rt = Runtime::new(RuntimeOptions::default());
        assert_eq!(rt.default_value(&Type::Str, false), Value::str(""));
        assert!(rt.default_value(&Type::array(Type::Num), false).is_null());
        assert!(matches!(rt.default_value(&Type::set(Type::Num), true), Value::Set(_)));
        let tuple = rt.default_value(&Type::Tuple(vec![Type::Num, Type::Bool]), false);
        assert_eq!(tuple, Value::Tuple(vec![Value::Num(0.0), Value::Bool(false)].into()));
    }

    #[test]
    fn test_clone_gets_fresh_identity() {
        let (mut rt, base, _) = runtime();
        let obj = Value::Object(rt.instantiate(base).unwrap());
        let copy = rt.clone_value(&obj);
        assert!(!copy.same(&obj));
        assert_ne!(copy.id(), obj.id());
        let copy = copy.as_object().unwrap().clone();
        assert_eq!(rt.get_field(&copy, "hp"), Some(Value::Num(0.0)));
    }
}
