//! Object-graph snapshots
//!
//! A snapshot is the serde form of everything reachable from one root
//! value. Heap entities are listed once under their identifier and refer
//! to each other by identifier, so shared structure and cycles survive a
//! round trip. Classes are named by identifier prefix (`url#Name`) and
//! fields by `prefix.name`, which keeps snapshots valid across engines that
//! import the same modules in a different order.

use super::ids::FreshId;
use super::object::{Object, ObjectRef};
use super::suggestion::{Step, Suggestion};
use super::value::{ArrayRef, Collection, MapRef, SetRef, Value};
use super::keys::MapKey;
use super::{Runtime, VmError, VmResult};
use crate::compiler::classes::ClassId;
use crate::parser::types::MethodSlot;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Serializable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SnapValue {
    /// `null`
    Null,
    /// Number; non-finite values are written as text
    Num(#[serde(with = "num_text")] f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
    /// Heap entity by identifier
    Ref(String),
    /// Tuple
    Tuple(Vec<SnapValue>),
    /// Suggestion
    Suggestion(Vec<SnapStep>),
}

/// Serializable suggestion step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum SnapStep {
    /// Extend step
    Extend {
        /// Target
        target: SnapValue,
        /// Class prefix
        class: String,
    },
    /// Retract step
    Retract {
        /// Target
        target: SnapValue,
        /// Class prefix
        class: String,
    },
    /// Call step
    Call {
        /// Receiver
        target: SnapValue,
        /// Recorded caller
        caller: SnapValue,
        /// Prefix of the class that introduced the method
        origin: String,
        /// Method name
        method: String,
        /// Recorded arguments
        args: Vec<SnapValue>,
    },
}

/// A heap object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnap {
    /// Worn classes, in order
    pub classes: Vec<String>,
    /// Field values keyed by `prefix.name`
    #[serde(default)]
    pub fields: BTreeMap<String, SnapValue>,
}

/// Everything reachable from `root`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Root value
    pub root: SnapValue,
    /// Objects by identifier
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectSnap>,
    /// Arrays by identifier
    #[serde(default)]
    pub arrays: BTreeMap<String, Vec<SnapValue>>,
    /// Maps by identifier, entries in key order
    #[serde(default)]
    pub maps: BTreeMap<String, Vec<(SnapValue, SnapValue)>>,
    /// Sets by identifier, elements in order
    #[serde(default)]
    pub sets: BTreeMap<String, Vec<SnapValue>>,
}

impl Snapshot {
    /// Number of heap entities
    pub fn entity_count(&self) -> usize {
        self.objects.len() + self.arrays.len() + self.maps.len() + self.sets.len()
    }

    /// Pretty JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

mod num_text {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if n.is_finite() {
            serializer.serialize_f64(*n)
        } else {
            serializer.serialize_str(&super::super::format_num(*n))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(n),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("invalid number '{}'", other))),
            },
        }
    }
}

// ============================================================================
// Capture
// ============================================================================

struct Capture<'a> {
    runtime: &'a Runtime,
    seen: FxHashSet<String>,
    snapshot: Snapshot,
}

impl Capture<'_> {
    fn class_prefix(&self, class: ClassId) -> String {
        self.runtime
            .classes
            .get(class)
            .map(|def| def.prefix.clone())
            .unwrap_or_default()
    }

    /// Mark `id` visited; false if it already was
    fn visit(&mut self, id: &FreshId) -> bool {
        self.seen.insert(id.as_str().to_string())
    }

    fn value(&mut self, value: &Value) -> SnapValue {
        match value {
            Value::Null => SnapValue::Null,
            Value::Num(n) => SnapValue::Num(*n),
            Value::Bool(b) => SnapValue::Bool(*b),
            Value::Str(s) => SnapValue::Str(s.to_string()),
            Value::Tuple(items) => SnapValue::Tuple(items.iter().map(|v| self.value(v)).collect()),
            Value::Object(obj) => self.object(obj),
            Value::Array(array) => self.array(array),
            Value::Map(map) => self.map(map),
            Value::Set(set) => self.set(set),
            Value::Suggestion(suggestion) => {
                SnapValue::Suggestion(suggestion.steps().iter().map(|s| self.step(s)).collect())
            }
        }
    }

    fn object(&mut self, obj: &ObjectRef) -> SnapValue {
        let id = obj.borrow().id().clone();
        if self.visit(&id) {
            let classes = obj.borrow().worn().iter().map(|c| self.class_prefix(*c)).collect();
            let stored: Vec<(String, Value)> = self
                .runtime
                .field_types(obj)
                .into_iter()
                .filter_map(|view| {
                    let value = obj.borrow().field(view.id).cloned()?;
                    Some((format!("{}.{}", view.class, view.name), value))
                })
                .collect();
            let mut fields = BTreeMap::new();
            for (key, value) in stored {
                let value = self.value(&value);
                fields.insert(key, value);
            }
            self.snapshot
                .objects
                .insert(id.as_str().to_string(), ObjectSnap { classes, fields });
        }
        SnapValue::Ref(id.as_str().to_string())
    }

    fn array(&mut self, array: &ArrayRef) -> SnapValue {
        let id = array.id().clone();
        if self.visit(&id) {
            let items = array.items().clone();
            let items = items.iter().map(|v| self.value(v)).collect();
            self.snapshot.arrays.insert(id.as_str().to_string(), items);
        }
        SnapValue::Ref(id.as_str().to_string())
    }

    fn map(&mut self, map: &MapRef) -> SnapValue {
        let id = map.id().clone();
        if self.visit(&id) {
            let entries: Vec<(Value, Value)> = map.items().values().cloned().collect();
            let entries = entries.iter().map(|(k, v)| (self.value(k), self.value(v))).collect();
            self.snapshot.maps.insert(id.as_str().to_string(), entries);
        }
        SnapValue::Ref(id.as_str().to_string())
    }

    fn set(&mut self, set: &SetRef) -> SnapValue {
        let id = set.id().clone();
        if self.visit(&id) {
            let items: Vec<Value> = set.items().values().cloned().collect();
            let items = items.iter().map(|v| self.value(v)).collect();
            self.snapshot.sets.insert(id.as_str().to_string(), items);
        }
        SnapValue::Ref(id.as_str().to_string())
    }

    fn step(&mut self, step: &Step) -> SnapStep {
        match step {
            Step::Extend { target, class } => SnapStep::Extend {
                target: self.value(target),
                class: self.class_prefix(*class),
            },
            Step::Retract { target, class } => SnapStep::Retract {
                target: self.value(target),
                class: self.class_prefix(*class),
            },
            Step::Call {
                target,
                caller,
                slot,
                args,
            } => SnapStep::Call {
                target: self.value(target),
                caller: self.value(caller),
                origin: self.class_prefix(slot.origin),
                method: slot.name.clone(),
                args: args.iter().map(|a| self.value(a)).collect(),
            },
        }
    }
}

/// Capture everything reachable from `root`
pub fn capture(runtime: &Runtime, root: &Value) -> Snapshot {
    let mut capture = Capture {
        runtime,
        seen: FxHashSet::default(),
        snapshot: Snapshot {
            root: SnapValue::Null,
            objects: BTreeMap::new(),
            arrays: BTreeMap::new(),
            maps: BTreeMap::new(),
            sets: BTreeMap::new(),
        },
    };
    let root = capture.value(root);
    capture.snapshot.root = root;
    debug!(entities = capture.snapshot.entity_count(), "captured snapshot");
    capture.snapshot
}

// ============================================================================
// Restore
// ============================================================================

fn snapshot_error(message: String) -> VmError {
    VmError::Snapshot(message)
}

struct Restore<'a> {
    runtime: &'a mut Runtime,
    heap: FxHashMap<String, Value>,
}

impl Restore<'_> {
    fn class(&self, prefix: &str) -> VmResult<ClassId> {
        self.runtime
            .classes
            .by_prefix(prefix)
            .ok_or_else(|| snapshot_error(format!("unknown class '{}'", prefix)))
    }

    fn value(&self, snap: &SnapValue) -> VmResult<Value> {
        Ok(match snap {
            SnapValue::Null => Value::Null,
            SnapValue::Num(n) => Value::Num(*n),
            SnapValue::Bool(b) => Value::Bool(*b),
            SnapValue::Str(s) => Value::str(s),
            SnapValue::Ref(id) => self
                .heap
                .get(id)
                .cloned()
                .ok_or_else(|| snapshot_error(format!("dangling reference '{}'", id)))?,
            SnapValue::Tuple(items) => Value::Tuple(
                items
                    .iter()
                    .map(|v| self.value(v))
                    .collect::<VmResult<Vec<_>>>()?
                    .into(),
            ),
            SnapValue::Suggestion(steps) => {
                let steps = steps.iter().map(|s| self.step(s)).collect::<VmResult<Vec<_>>>()?;
                Value::Suggestion(Rc::new(Suggestion::from_steps(steps)))
            }
        })
    }

    fn step(&self, snap: &SnapStep) -> VmResult<Step> {
        Ok(match snap {
            SnapStep::Extend { target, class } => Step::Extend {
                target: self.value(target)?,
                class: self.class(class)?,
            },
            SnapStep::Retract { target, class } => Step::Retract {
                target: self.value(target)?,
                class: self.class(class)?,
            },
            SnapStep::Call {
                target,
                caller,
                origin,
                method,
                args,
            } => Step::Call {
                target: self.value(target)?,
                caller: self.value(caller)?,
                slot: MethodSlot {
                    origin: self.class(origin)?,
                    name: method.clone(),
                },
                args: args.iter().map(|a| self.value(a)).collect::<VmResult<Vec<_>>>()?,
            },
        })
    }

    fn parse_id(id: &str) -> VmResult<FreshId> {
        FreshId::parse(id).ok_or_else(|| snapshot_error(format!("invalid identifier '{}'", id)))
    }

    fn shell(&mut self, id: &str, value: Value) -> VmResult<()> {
        if self.heap.insert(id.to_string(), value).is_some() {
            return Err(snapshot_error(format!("identifier '{}' used twice", id)));
        }
        Ok(())
    }

    fn fill_object(&self, obj: &ObjectRef, snap: &ObjectSnap) -> VmResult<()> {
        for (key, value) in &snap.fields {
            let (prefix, name) = key
                .rsplit_once('.')
                .ok_or_else(|| snapshot_error(format!("invalid field key '{}'", key)))?;
            let class = self.class(prefix)?;
            let field = self
                .runtime
                .classes
                .get(class)
                .and_then(|def| def.own_field_id(name))
                .ok_or_else(|| snapshot_error(format!("unknown field '{}'", key)))?;
            let value = self.value(value)?;
            let mut o = obj.borrow_mut();
            if o.has_type(class) {
                o.fields.insert(field, value);
            } else {
                debug!(field = %key, "dropping field of a class the object does not embody");
            }
        }
        Ok(())
    }
}

/// Rebuild the graph of `snapshot` in `runtime` and return its root.
///
/// Entities keep their identifiers; the odometer is advanced past every
/// restored identifier. Fields missing from the snapshot are initialized
/// as they would be on extension.
pub fn restore(runtime: &mut Runtime, snapshot: &Snapshot) -> VmResult<Value> {
    let mut restore = Restore {
        runtime,
        heap: FxHashMap::default(),
    };
    let mut ids = Vec::with_capacity(snapshot.entity_count());
    let mut objects = Vec::with_capacity(snapshot.objects.len());

    for (id, snap) in &snapshot.objects {
        let fresh = Restore::parse_id(id)?;
        let worn = snap
            .classes
            .iter()
            .map(|prefix| restore.class(prefix))
            .collect::<VmResult<Vec<_>>>()?;
        let obj: ObjectRef = Rc::new(RefCell::new(Object::new(fresh.clone(), worn)));
        restore.runtime.install_manifest(&obj);
        restore.shell(id, Value::Object(obj.clone()))?;
        objects.push((obj, snap));
        ids.push(fresh);
    }
    for id in snapshot.arrays.keys() {
        let fresh = Restore::parse_id(id)?;
        restore.shell(id, Value::Array(Collection::new(fresh.clone(), Vec::new())))?;
        ids.push(fresh);
    }
    for id in snapshot.maps.keys() {
        let fresh = Restore::parse_id(id)?;
        restore.shell(id, Value::Map(Collection::new(fresh.clone(), BTreeMap::new())))?;
        ids.push(fresh);
    }
    for id in snapshot.sets.keys() {
        let fresh = Restore::parse_id(id)?;
        restore.shell(id, Value::Set(Collection::new(fresh.clone(), BTreeMap::new())))?;
        ids.push(fresh);
    }

    for (obj, snap) in &objects {
        restore.fill_object(obj, snap)?;
    }
    for (id, items) in &snapshot.arrays {
        let values = items.iter().map(|v| restore.value(v)).collect::<VmResult<Vec<_>>>()?;
        if let Some(Value::Array(array)) = restore.heap.get(id) {
            *array.items_mut() = values;
        }
    }
    for (id, entries) in &snapshot.maps {
        let mut values = BTreeMap::new();
        for (k, v) in entries {
            let key = restore.value(k)?;
            let value = restore.value(v)?;
            values.insert(MapKey::of(&key), (key, value));
        }
        if let Some(Value::Map(map)) = restore.heap.get(id) {
            *map.items_mut() = values;
        }
    }
    for (id, items) in &snapshot.sets {
        let mut values = BTreeMap::new();
        for item in items {
            let value = restore.value(item)?;
            values.insert(MapKey::of(&value), value);
        }
        if let Some(Value::Set(set)) = restore.heap.get(id) {
            *set.items_mut() = values;
        }
    }

    let root = restore.value(&snapshot.root)?;
    let runtime = restore.runtime;
    for (obj, _) in &objects {
        runtime.initialize_missing(obj)?;
    }
    for id in &ids {
        runtime.ids.advance_past(id);
    }
    debug!(entities = ids.len(), "restored snapshot");
    Ok(root)
}
