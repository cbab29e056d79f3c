//! Core type definitions for the Weft type system

use super::relation::ClassHierarchy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a class in the engine's class registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    /// Create a ClassId from a raw value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value of this ClassId
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Index into the registry's class vector
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Dispatch identity of a method.
///
/// An overriding method inherits the slot of the method it overrides, so
/// overriding replaces the same entry of the method table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSlot {
    /// Class that introduced the method
    pub origin: ClassId,
    /// Method name
    pub name: String,
}

impl fmt::Display for MethodSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.origin.0)
    }
}

/// Method signature: the callable contract of a class member
#[derive(Debug, Clone, Eq)]
pub struct MethodSig {
    /// Class the dispatch identity belongs to
    pub owner: ClassId,
    /// Method name
    pub name: String,
    /// May mutate any reachable object
    pub mutating: bool,
    /// May mutate `this`
    pub mutating_this: bool,
    /// Return type
    pub ret: Type,
    /// Parameter types in order
    pub params: Vec<Type>,
}

impl MethodSig {
    /// Dispatch slot of this signature
    pub fn slot(&self) -> MethodSlot {
        MethodSlot {
            origin: self.owner,
            name: self.name.clone(),
        }
    }
}

// Owner and name are identity, not contract.
impl PartialEq for MethodSig {
    fn eq(&self, other: &Self) -> bool {
        self.mutating == other.mutating
            && self.mutating_this == other.mutating_this
            && self.ret == other.ret
            && self.params == other.params
    }
}

/// A value shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// IEEE 754 double
    Num,
    /// UTF-8 string
    Str,
    /// Boolean
    Bool,
    /// No value
    Void,
    /// Type of the `null` literal
    Null,
    /// Instance of a class (nullable)
    Object(ClassId),
    /// Growable array (nullable)
    Array(Box<Type>),
    /// Fixed-shape tuple, compared structurally (never nullable)
    Tuple(Vec<Type>),
    /// Map from keys to values (nullable)
    Map(Box<Type>, Box<Type>),
    /// Set of values (nullable)
    Set(Box<Type>),
    /// Deferred batch of mutation steps
    Suggestion,
    /// Method reference
    Method(Box<MethodSig>),
}

impl Type {
    /// `array<element>`
    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    /// `map<key, value>`
    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    /// `set<element>`
    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    /// Whether `null` is a valid value of this type
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Type::Object(_) | Type::Array(_) | Type::Map(..) | Type::Set(_) | Type::Null
        )
    }

    /// Array, map or set
    pub fn is_container(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Map(..) | Type::Set(_))
    }

    /// Heap values with identity: objects and containers
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Object(_)) || self.is_container()
    }

    /// Value-like types that may be reassigned in place under `mutating this`
    pub fn is_primitive(&self) -> bool {
        !self.is_reference()
    }

    /// Whether a value of this type can be stored or passed
    pub fn is_value(&self) -> bool {
        !matches!(self, Type::Void | Type::Method(_))
    }

    /// Class id for object types
    pub fn class(&self) -> Option<ClassId> {
        match self {
            Type::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Human-readable form using class names from `classes`
    pub fn describe(&self, classes: &dyn ClassHierarchy) -> String {
        match self {
            Type::Object(id) => classes.class_name(*id),
            Type::Array(el) => format!("array<{}>", el.describe(classes)),
            Type::Set(el) => format!("set<{}>", el.describe(classes)),
            Type::Map(k, v) => format!("map<{}, {}>", k.describe(classes), v.describe(classes)),
            Type::Tuple(elements) => {
                let parts: Vec<String> = elements.iter().map(|t| t.describe(classes)).collect();
                format!("({})", parts.join(", "))
            }
            Type::Method(sig) => {
                let params: Vec<String> = sig.params.iter().map(|t| t.describe(classes)).collect();
                format!("({}) => {}", params.join(", "), sig.ret.describe(classes))
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Num => write!(f, "num"),
            Type::Str => write!(f, "string"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Object(id) => write!(f, "object#{}", id.0),
            Type::Array(el) => write!(f, "array<{}>", el),
            Type::Set(el) => write!(f, "set<{}>", el),
            Type::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", el)?;
                }
                write!(f, ")")
            }
            Type::Suggestion => write!(f, "suggestion"),
            Type::Method(sig) => write!(f, "method {}", sig.name),
        }
    }
}
