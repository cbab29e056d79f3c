//! Typed syntax tree consumed by the engine.
//!
//! Every node serializes as `{"type": <tag>, "children": {...}}` (serde
//! adjacent tagging). External parsers produce this tree; the engine never
//! sees surface syntax.

use super::Span;
use serde::{Deserialize, Serialize};

/// Dotted name, e.g. `["core", "Object"]`
pub type Path = Vec<String>;

/// A compilation unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    /// Top-level declarations in source order
    #[serde(default)]
    pub declarations: Vec<Decl>,
}

/// Top-level declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
pub enum Decl {
    /// Copyright line
    Copyright {
        /// Copyright text
        text: String,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// License declaration
    License {
        /// License identifier or text
        text: String,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Import of another module, bound to a local name
    Import {
        /// Module URL
        url: String,
        /// Local name the module is bound to
        name: String,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Local alias for a dotted name
    Alias {
        /// Alias name
        name: String,
        /// Aliased path
        path: Path,
        /// Whether the alias is exported
        #[serde(default)]
        exported: bool,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Brings every export of the module at `path` into scope (nonlocally)
    Wildcard {
        /// Path to a module
        path: Path,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Class declaration
    Class(ClassDecl),
    /// Named text resource compiled to an immutable `array<string>`
    Fabric(FabricDecl),
    /// Designates the module's main class
    Main {
        /// Path to a class
        path: Path,
        /// Source location
        #[serde(default)]
        span: Span,
    },
}

impl Decl {
    /// Source location of the declaration
    pub fn span(&self) -> Span {
        match self {
            Decl::Copyright { span, .. }
            | Decl::License { span, .. }
            | Decl::Import { span, .. }
            | Decl::Alias { span, .. }
            | Decl::Wildcard { span, .. }
            | Decl::Main { span, .. } => *span,
            Decl::Class(class) => class.span,
            Decl::Fabric(fabric) => fabric.span,
        }
    }
}

/// Class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Class name
    pub name: String,
    /// Declared parents, in order
    #[serde(default)]
    pub parents: Vec<Path>,
    /// Whether the class is exported
    #[serde(default)]
    pub exported: bool,
    /// Fields and methods
    #[serde(default)]
    pub members: Vec<Member>,
    /// Source location
    #[serde(default)]
    pub span: Span,
}

/// Fabric declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricDecl {
    /// Fabric name
    pub name: String,
    /// Lines; all of equal length
    pub lines: Vec<String>,
    /// Whether the fabric is exported
    #[serde(default)]
    pub exported: bool,
    /// Source location
    #[serde(default)]
    pub span: Span,
}

/// Class member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
pub enum Member {
    /// Field declaration
    Field(FieldDecl),
    /// Method declaration
    Method(MethodDecl),
}

/// Field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeExpr,
    /// Initializer expression
    #[serde(default)]
    pub init: Option<Expr>,
    /// Source location
    #[serde(default)]
    pub span: Span,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Method name
    pub name: String,
    /// Parameters in order
    #[serde(default)]
    pub params: Vec<Param>,
    /// Return type
    #[serde(default = "TypeExpr::void")]
    pub ret: TypeExpr,
    /// May mutate any reachable object
    #[serde(default)]
    pub mutating: bool,
    /// May mutate `this`
    #[serde(default)]
    pub mutating_this: bool,
    /// Overrides an inherited method
    #[serde(default, rename = "override")]
    pub is_override: bool,
    /// Method body
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// Source location
    #[serde(default)]
    pub span: Span,
}

/// Method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeExpr,
}

/// Type expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
pub enum TypeExpr {
    /// `num`
    Num,
    /// `string`
    String,
    /// `bool`
    Bool,
    /// `void`
    Void,
    /// `array<T>`
    Array {
        /// Element type
        element: Box<TypeExpr>,
    },
    /// `(T1, T2, ...)`
    Tuple {
        /// Element types
        elements: Vec<TypeExpr>,
    },
    /// `map<K, V>`
    Map {
        /// Key type
        key: Box<TypeExpr>,
        /// Value type
        value: Box<TypeExpr>,
    },
    /// `set<T>`
    Set {
        /// Element type
        element: Box<TypeExpr>,
    },
    /// `suggestion`
    Suggestion,
    /// Class reference
    Named {
        /// Dotted class name
        path: Path,
    },
}

impl TypeExpr {
    /// The `void` type expression
    pub fn void() -> Self {
        TypeExpr::Void
    }
}

/// Compound assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompoundOp {
    /// `+=`
    #[serde(rename = "+=")]
    Add,
    /// `-=`
    #[serde(rename = "-=")]
    Sub,
    /// `*=`
    #[serde(rename = "*=")]
    Mul,
    /// `/=`
    #[serde(rename = "/=")]
    Div,
}

impl CompoundOp {
    /// Operator spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            CompoundOp::Add => "+=",
            CompoundOp::Sub => "-=",
            CompoundOp::Mul => "*=",
            CompoundOp::Div => "/=",
        }
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
pub enum Stmt {
    /// Local variable declaration
    Let {
        /// Variable name
        name: String,
        /// Declared type
        #[serde(default)]
        ty: Option<TypeExpr>,
        /// Initializer
        #[serde(default)]
        init: Option<Expr>,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// `target = value`
    Assign {
        /// Assigned location
        target: Expr,
        /// New value
        value: Expr,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// `target op= value`
    Compound {
        /// Operator
        op: CompoundOp,
        /// Updated location
        target: Expr,
        /// Operand
        value: Expr,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Expression evaluated for effect
    Expr {
        /// Expression
        expr: Expr,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Conditional
    If {
        /// Condition
        cond: Expr,
        /// Taken when true
        then: Vec<Stmt>,
        /// Taken when false
        #[serde(default, rename = "else")]
        otherwise: Vec<Stmt>,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Loop while a condition holds
    While {
        /// Condition
        cond: Expr,
        /// Body
        body: Vec<Stmt>,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Loop over a string, array, map or set
    For {
        /// First loop variable
        key: String,
        /// Second loop variable
        #[serde(default)]
        value: Option<String>,
        /// Annotation for the first variable
        #[serde(default)]
        key_ty: Option<TypeExpr>,
        /// Annotation for the second variable
        #[serde(default)]
        value_ty: Option<TypeExpr>,
        /// Iterated collection
        iter: Expr,
        /// Body
        body: Vec<Stmt>,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Return from the method
    Return {
        /// Returned value
        #[serde(default)]
        value: Option<Expr>,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Leave the innermost loop
    Break {
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Next iteration of the innermost loop
    Continue {
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Add a class to an object's worn list
    Extend {
        /// Extended object
        target: Expr,
        /// Class path
        class: Path,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Remove a class from an object's worn list
    Retract {
        /// Retracted object
        target: Expr,
        /// Class path
        class: Path,
        /// Source location
        #[serde(default)]
        span: Span,
    },
    /// Apply a suggestion
    Enforce {
        /// Suggestion value
        suggestion: Expr,
        /// Source location
        #[serde(default)]
        span: Span,
    },
}

impl Stmt {
    /// Source location of the statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Compound { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Extend { span, .. }
            | Stmt::Retract { span, .. }
            | Stmt::Enforce { span, .. } => *span,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    #[serde(rename = "+")]
    Add,
    /// `-`
    #[serde(rename = "-")]
    Sub,
    /// `*`
    #[serde(rename = "*")]
    Mul,
    /// `/`
    #[serde(rename = "/")]
    Div,
    /// `%`
    #[serde(rename = "%")]
    Rem,
    /// `==`
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `&&`
    #[serde(rename = "&&")]
    And,
    /// `||`
    #[serde(rename = "||")]
    Or,
}

impl BinaryOp {
    /// Operator spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation
    #[serde(rename = "-")]
    Neg,
    /// Logical not
    #[serde(rename = "!")]
    Not,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
pub enum Expr {
    /// Number literal
    Num {
        /// Value
        value: f64,
    },
    /// String literal
    Str {
        /// Value
        value: String,
    },
    /// Boolean literal
    Bool {
        /// Value
        value: bool,
    },
    /// `null`
    Null,
    /// The receiver of the current method
    This,
    /// The object that invoked the current method
    Caller,
    /// Local variable or module-level value
    Name {
        /// Dotted name
        path: Path,
    },
    /// Field read
    Field {
        /// Object
        object: Box<Expr>,
        /// Field name
        name: String,
    },
    /// Index read (array, map, string, tuple)
    Index {
        /// Indexed value
        object: Box<Expr>,
        /// Index or key
        index: Box<Expr>,
    },
    /// Method call
    Call {
        /// Receiver
        object: Box<Expr>,
        /// Method name
        method: String,
        /// Arguments
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Call of an inherited implementation
    SuperCall {
        /// Method name
        method: String,
        /// Arguments
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Instantiate a class or an empty container
    New {
        /// Instantiated type
        ty: TypeExpr,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Array literal
    Array {
        /// Elements
        elements: Vec<Expr>,
    },
    /// Tuple literal
    Tuple {
        /// Elements
        elements: Vec<Expr>,
    },
    /// Checked conversion
    Cast {
        /// Converted value
        value: Box<Expr>,
        /// Target type
        ty: TypeExpr,
    },
    /// Shallow copy with a fresh identity
    Clone {
        /// Copied value
        value: Box<Expr>,
    },
    /// Length of a string, array, map or set
    Len {
        /// Measured value
        value: Box<Expr>,
    },
    /// Map key or set membership test
    Has {
        /// Map or set
        collection: Box<Expr>,
        /// Key or element
        key: Box<Expr>,
    },
    /// Whether an object currently embodies a class
    Is {
        /// Tested object
        value: Box<Expr>,
        /// Class path
        class: Path,
    },
    /// Next number in `[0, 1)` from this object's deterministic stream
    Random,
    /// Suggestion literal
    Suggest {
        /// Steps in suggested order
        #[serde(default)]
        steps: Vec<SuggestStep>,
    },
}

/// One step of a suggestion literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
pub enum SuggestStep {
    /// Extend `target` with `class`
    Extend {
        /// Target object
        target: Expr,
        /// Class path
        class: Path,
    },
    /// Retract `class` from `target`
    Retract {
        /// Target object
        target: Expr,
        /// Class path
        class: Path,
    },
    /// Call `method` on `target`
    Call {
        /// Target object
        target: Expr,
        /// Method name
        method: String,
        /// Arguments
        #[serde(default)]
        args: Vec<Expr>,
    },
}
