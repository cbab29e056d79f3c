//! Runtime values
//!
//! Primitives are held inline; objects and containers are shared,
//! identity-carrying heap entities. Tuples are immutable and compared
//! structurally.

use super::ids::FreshId;
use super::keys::MapKey;
use super::object::ObjectRef;
use super::suggestion::Suggestion;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Array, map or set storage with its identifier
pub struct Collection<T> {
    id: FreshId,
    items: RefCell<T>,
}

impl<T> Collection<T> {
    pub(crate) fn new(id: FreshId, items: T) -> Rc<Self> {
        Rc::new(Self {
            id,
            items: RefCell::new(items),
        })
    }

    /// Identifier
    pub fn id(&self) -> &FreshId {
        &self.id
    }

    /// Borrow the contents
    pub fn items(&self) -> Ref<'_, T> {
        self.items.borrow()
    }

    /// Mutably borrow the contents
    pub fn items_mut(&self) -> RefMut<'_, T> {
        self.items.borrow_mut()
    }
}

/// Map storage: canonical key to the original key and its value
pub type MapEntries = BTreeMap<MapKey, (Value, Value)>;
/// Set storage: canonical key to the original element
pub type SetEntries = BTreeMap<MapKey, Value>;

/// Shared array
pub type ArrayRef = Rc<Collection<Vec<Value>>>;
/// Shared map, iterated in canonical key order
pub type MapRef = Rc<Collection<MapEntries>>;
/// Shared set, iterated in canonical element order
pub type SetRef = Rc<Collection<SetEntries>>;

/// A runtime value
#[derive(Clone)]
pub enum Value {
    /// Absent reference (and the value of void calls)
    Null,
    /// Number
    Num(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(Rc<str>),
    /// Object
    Object(ObjectRef),
    /// Array
    Array(ArrayRef),
    /// Map
    Map(MapRef),
    /// Set
    Set(SetRef),
    /// Tuple
    Tuple(Rc<[Value]>),
    /// Suggestion
    Suggestion(Rc<Suggestion>),
}

impl Value {
    /// String value
    pub fn str(text: &str) -> Self {
        Value::Str(text.into())
    }

    /// Whether this is `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric content; anything else reads as zero
    pub fn as_num(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            _ => 0.0,
        }
    }

    /// Boolean content; anything else reads as false
    pub fn as_bool(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// String content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Identifier of a heap value
    pub fn id(&self) -> Option<FreshId> {
        match self {
            Value::Object(o) => Some(o.borrow().id().clone()),
            Value::Array(a) => Some(a.id().clone()),
            Value::Map(m) => Some(m.id().clone()),
            Value::Set(s) => Some(s.id().clone()),
            _ => None,
        }
    }

    /// Language equality: primitives by value, heap values by identity,
    /// tuples element-wise
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same(y)),
            (Value::Suggestion(a), Value::Suggestion(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Text produced by string concatenation and casts to `string`
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Num(n) => format_num(*n),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_text).collect();
                format!("({})", parts.join(", "))
            }
            Value::Suggestion(s) => format!("suggestion({} steps)", s.len()),
            heap => heap.id().map(|id| format!("#{}", id)).unwrap_or_default(),
        }
    }
}

/// Format a number the way the language prints it: integral values without
/// a fractional part
pub fn format_num(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 && n.is_sign_negative() {
        "-0".to_string()
    } else {
        format!("{}", n)
    }
}

// Heap values print their identifier only; object graphs may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Num(n) => write!(f, "Num({})", format_num(*n)),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Object(o) => match o.try_borrow() {
                Ok(o) => write!(f, "Object({:?})", o.id()),
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
            Value::Array(a) => write!(f, "Array({:?})", a.id()),
            Value::Map(m) => write!(f, "Map({:?})", m.id()),
            Value::Set(s) => write!(f, "Set({:?})", s.id()),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(&items.as_ref()).finish(),
            Value::Suggestion(s) => write!(f, "Suggestion({} steps)", s.len()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(3.0), "3");
        assert_eq!(format_num(2.5), "2.5");
        assert_eq!(format_num(-0.0), "-0");
        assert_eq!(format_num(f64::NAN), "NaN");
        assert_eq!(format_num(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_tuples_compare_structurally() {
        let a = Value::Tuple(vec![Value::Num(1.0), Value::str("x")].into());
        let b = Value::Tuple(vec![Value::Num(1.0), Value::str("x")].into());
        let c = Value::Tuple(vec![Value::Num(2.0), Value::str("x")].into());
        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert_eq!(a.to_text(), "(1, x)");
    }

    #[test]
    fn test_containers_compare_by_identity() {
        let a = Value::Array(Collection::new(FreshId::parse("1").unwrap(), vec![]));
        let b = Value::Array(Collection::new(FreshId::parse("2").unwrap(), vec![]));
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert!(!a.same(&Value::Null));
        assert_eq!(a.to_text(), "#1");
    }
}
