//! Executable units
//!
//! Checked method bodies lower to a small tree IR: statements ([`Op`]) over
//! typed expressions ([`Code`]) whose locals and scratch temporaries live in
//! numbered frame slots. Every name, member and class reference is already
//! resolved; the interpreter never looks anything up by string except the
//! dispatch slot of a method call.

use crate::compiler::classes::{ClassId, FieldId};
use crate::parser::checker::IterKind;
use crate::parser::types::{MethodSlot, Type};
use crate::vm::Value;
use std::rc::Rc;

/// Frame slot index
pub type Slot = usize;

/// A compiled method body or field initializer.
///
/// Called as `(runtime, this, caller, args) -> value`; arguments occupy the
/// first `arity` slots.
#[derive(Debug)]
pub struct Unit {
    /// `Class.member`, for diagnostics
    pub name: String,
    /// Number of parameters
    pub arity: usize,
    /// Frame size (parameters, locals and temporaries)
    pub slot_count: usize,
    /// Declared result type; falling off the end yields its default
    pub ret: Type,
    /// Body
    pub body: Vec<Op>,
}

/// Element access flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Array element by position
    Array,
    /// Map value by key
    Map,
    /// Character of a string
    Str,
}

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

/// Ordering operator over numbers or strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Statement
#[derive(Debug)]
pub enum Op {
    /// Evaluate for effect
    Eval(Code),
    /// Write a frame slot
    Store {
        /// Destination
        slot: Slot,
        /// Value
        value: Code,
    },
    /// Write a field; a null object makes this a no-op
    SetField {
        /// Object, evaluated first
        object: Code,
        /// Field
        field: FieldId,
        /// Value, evaluated second
        value: Code,
    },
    /// Write an array element or map entry
    SetIndex {
        /// Container, evaluated first
        target: Code,
        /// Container kind
        kind: IndexKind,
        /// Position or key
        index: Code,
        /// Value
        value: Code,
    },
    /// Append to an array or add to a set
    Append {
        /// Container
        target: Code,
        /// Element
        value: Code,
    },
    /// Remove a map key or a set element
    Remove {
        /// Container
        target: Code,
        /// Key or element
        value: Code,
    },
    /// Conditional
    If {
        /// Condition
        cond: Code,
        /// Taken when true
        then: Vec<Op>,
        /// Taken when false
        otherwise: Vec<Op>,
    },
    /// Pre-tested loop
    While {
        /// Condition
        cond: Code,
        /// Body
        body: Vec<Op>,
    },
    /// Iterate a snapshot of a collection
    ForEach {
        /// Collection
        source: Code,
        /// Collection kind
        kind: IterKind,
        /// First loop variable
        first: Slot,
        /// Second loop variable
        second: Option<Slot>,
        /// Body
        body: Vec<Op>,
    },
    /// Leave the innermost loop
    Break,
    /// Next iteration of the innermost loop
    Continue,
    /// Return a value
    Return(Code),
    /// Extend an object with a class
    Extend {
        /// Object
        target: Code,
        /// Class
        class: ClassId,
    },
    /// Retract a class from an object
    Retract {
        /// Object
        target: Code,
        /// Class
        class: ClassId,
    },
    /// Apply a suggestion
    Enforce(Code),
    /// Reset temporaries whose statement has completed
    Release(Vec<Slot>),
}

/// Expression
#[derive(Debug)]
pub enum Code {
    /// Number literal
    Num(f64),
    /// String literal
    Str(Rc<str>),
    /// Boolean literal
    Bool(bool),
    /// `null`
    Null,
    /// Default value of a type; `constructed` creates empty containers
    Default {
        /// Type
        ty: Type,
        /// Create containers instead of null
        constructed: bool,
    },
    /// Read a frame slot
    Local(Slot),
    /// Evaluate, store into a slot, and yield the value
    Tee {
        /// Destination
        slot: Slot,
        /// Value
        value: Box<Code>,
    },
    /// Receiver
    This,
    /// Invoking object
    Caller,
    /// Pre-built value (fabrics)
    Const(Value),
    /// Field read; missing fields and null objects read as the type default
    GetField {
        /// Object
        object: Box<Code>,
        /// Field
        field: FieldId,
        /// Field type
        ty: Type,
    },
    /// Element read; missing elements read as the type default
    Index {
        /// Container
        object: Box<Code>,
        /// Container kind
        kind: IndexKind,
        /// Position or key
        index: Box<Code>,
        /// Element type
        ty: Type,
    },
    /// Tuple element read
    TupleGet {
        /// Tuple
        tuple: Box<Code>,
        /// Element position
        index: usize,
    },
    /// Dynamically dispatched call
    Call {
        /// Receiver
        object: Box<Code>,
        /// Dispatch slot
        slot: MethodSlot,
        /// Arguments
        args: Vec<Code>,
        /// Declared result type
        ret: Type,
    },
    /// Call of a parent implementation on `this`
    SuperCall {
        /// Parent supplying the implementation
        parent: ClassId,
        /// Dispatch slot
        slot: MethodSlot,
        /// Arguments
        args: Vec<Code>,
    },
    /// Instantiate a class
    New(ClassId),
    /// Empty array
    NewArray,
    /// Empty map
    NewMap,
    /// Empty set
    NewSet,
    /// Array literal
    ArrayLit(Vec<Code>),
    /// Tuple literal
    TupleLit(Vec<Code>),
    /// Numeric arithmetic
    Arith {
        /// Operator
        op: ArithOp,
        /// Left operand
        left: Box<Code>,
        /// Right operand
        right: Box<Code>,
    },
    /// String concatenation; non-string operands are stringified
    Concat {
        /// Left operand
        left: Box<Code>,
        /// Right operand
        right: Box<Code>,
    },
    /// Number or string ordering
    Compare {
        /// Operator
        op: CompareOp,
        /// Left operand
        left: Box<Code>,
        /// Right operand
        right: Box<Code>,
    },
    /// Equality; references compare by identity
    Equal {
        /// `!=` instead of `==`
        negate: bool,
        /// Left operand
        left: Box<Code>,
        /// Right operand
        right: Box<Code>,
    },
    /// Short-circuit `&&` / `||`
    Logic {
        /// `&&` instead of `||`
        and: bool,
        /// Left operand
        left: Box<Code>,
        /// Right operand
        right: Box<Code>,
    },
    /// Logical not
    Not(Box<Code>),
    /// Numeric negation
    Neg(Box<Code>),
    /// Suggestion concatenation
    Merge {
        /// Earlier steps
        left: Box<Code>,
        /// Later steps
        right: Box<Code>,
    },
    /// Checked conversion; failed object casts yield null
    Cast {
        /// Value
        value: Box<Code>,
        /// Target type
        to: Type,
    },
    /// Shallow copy with a fresh identity
    Clone(Box<Code>),
    /// Length of a string or collection
    Len(Box<Code>),
    /// Map key or set membership
    Has {
        /// Map or set
        collection: Box<Code>,
        /// Key or element
        key: Box<Code>,
    },
    /// Next number from `this`'s deterministic stream
    Random,
    /// Whether an object currently embodies a class
    Is {
        /// Object
        value: Box<Code>,
        /// Class
        class: ClassId,
    },
    /// Suggestion literal
    Suggest(Vec<StepCode>),
}

/// Suggestion step, evaluated when the literal is
#[derive(Debug)]
pub enum StepCode {
    /// Extend step
    Extend {
        /// Object
        target: Code,
        /// Class
        class: ClassId,
    },
    /// Retract step
    Retract {
        /// Object
        target: Code,
        /// Class
        class: ClassId,
    },
    /// Call step
    Call {
        /// Receiver
        target: Code,
        /// Dispatch slot
        slot: MethodSlot,
        /// Arguments
        args: Vec<Code>,
    },
}
