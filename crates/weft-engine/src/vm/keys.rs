//! Canonical comparator
//!
//! Maps and sets are ordered by [`MapKey`], never by insertion or storage
//! order:
//!
//! - numbers order numerically, NaN last, `-0` before `+0`
//! - strings and booleans use their native order
//! - objects and containers compare by identifier, in minting order
//! - tuples compare by their canonical string encoding
//!
//! Keys of different kinds only meet in a map keyed by a nullable type,
//! where `null` sorts first.

use super::ids::FreshId;
use super::value::{format_num, Value};
use std::cmp::Ordering;
use std::rc::Rc;

/// Number ordered by the canonical comparator
#[derive(Debug, Clone, Copy)]
pub struct NumKey(pub f64);

impl Ord for NumKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.total_cmp(&other.0),
        }
    }
}

impl PartialOrd for NumKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NumKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumKey {}

/// Canonical key of a map key or set element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Num(NumKey),
    /// String
    Str(Rc<str>),
    /// Object, array, map or set, ordered like [`FreshId`]
    Ref(FreshId),
    /// Tuple or suggestion, by canonical encoding
    Encoded(String),
}

impl MapKey {
    /// Canonical key of `value`
    pub fn of(value: &Value) -> MapKey {
        match value {
            Value::Null => MapKey::Null,
            Value::Bool(b) => MapKey::Bool(*b),
            Value::Num(n) => MapKey::Num(NumKey(*n)),
            Value::Str(s) => MapKey::Str(s.clone()),
            Value::Tuple(_) | Value::Suggestion(_) => MapKey::Encoded(encode(value)),
            heap => match heap.id() {
                Some(id) => MapKey::Ref(id),
                None => MapKey::Null,
            },
        }
    }
}

/// Canonical string encoding of a value.
///
/// Two tuples encode identically exactly when they are equal.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Num(n) => out.push_str(&format_num(*n)),
        Value::Str(s) => out.push_str(&serde_json::Value::from(s.as_ref()).to_string()),
        Value::Tuple(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_into(item, out);
            }
            out.push(']');
        }
        Value::Suggestion(s) => {
            out.push_str("suggestion:");
            out.push_str(&format!("{:p}", Rc::as_ptr(s)));
        }
        heap => {
            out.push('#');
            if let Some(id) = heap.id() {
                out.push_str(id.as_str());
            }
        }
    }
}

/// Compare two values with the canonical comparator
pub fn compare(a: &Value, b: &Value) -> Ordering {
    MapKey::of(a).cmp(&MapKey::of(b))
}
