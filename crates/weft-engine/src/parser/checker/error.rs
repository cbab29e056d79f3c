//! Error types for name resolution and type checking
//!
//! Provides structured error types with source locations for reporting
//! resolution and checking errors.

use crate::parser::Span;
use thiserror::Error;

/// Errors that can occur during name and export resolution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    /// Module carries no copyright declaration
    #[error("Module '{url}' has no copyright declaration")]
    MissingCopyright {
        /// Module URL
        url: String,
    },

    /// Module does not carry exactly one license declaration
    #[error("Module '{url}' must declare exactly one license, found {count}")]
    LicenseCount {
        /// Module URL
        url: String,
        /// Number of license declarations found
        count: usize,
    },

    /// Duplicate local symbol
    #[error("Duplicate symbol '{name}'")]
    DuplicateSymbol {
        /// Symbol name
        name: String,
        /// Location of the duplicate definition
        span: Span,
    },

    /// Name not bound (or ambiguous between two nonlocal bindings)
    #[error("Undefined symbol '{name}'")]
    UndefinedSymbol {
        /// Symbol name
        name: String,
        /// Location of the reference
        span: Span,
    },

    /// A dotted path stepped through something that is not a module
    #[error("Cannot resolve '{step}' in '{path}': '{parent}' is not a module")]
    InvalidPathStep {
        /// Full dotted path
        path: String,
        /// Segment that could not be resolved
        step: String,
        /// Segment that was expected to be a module
        parent: String,
        /// Location of the reference
        span: Span,
    },

    /// Path names something other than a class
    #[error("'{path}' is not a class")]
    NotAClass {
        /// Dotted path
        path: String,
        /// Location of the reference
        span: Span,
    },

    /// Path names something other than a module
    #[error("'{path}' is not a module")]
    NotAModule {
        /// Dotted path
        path: String,
        /// Location of the reference
        span: Span,
    },

    /// `main` declared more than once
    #[error("Main class declared more than once")]
    MainRedeclared {
        /// Location of the second declaration
        span: Span,
    },

    /// Fabric lines differ in length
    #[error("Lines of fabric '{name}' must all have the same length")]
    RaggedFabric {
        /// Fabric name
        name: String,
        /// Location of the declaration
        span: Span,
    },

    /// The core module does not define the root class
    #[error("Core module does not define root class '{name}'")]
    MissingRootClass {
        /// Configured root class name
        name: String,
    },

    /// Empty dotted path
    #[error("Empty name")]
    EmptyPath {
        /// Location of the reference
        span: Span,
    },
}

impl ResolveError {
    /// Location of the error, if it refers to a declaration or reference
    pub fn span(&self) -> Option<Span> {
        match self {
            ResolveError::MissingCopyright { .. }
            | ResolveError::LicenseCount { .. }
            | ResolveError::MissingRootClass { .. } => None,
            ResolveError::DuplicateSymbol { span, .. }
            | ResolveError::UndefinedSymbol { span, .. }
            | ResolveError::InvalidPathStep { span, .. }
            | ResolveError::NotAClass { span, .. }
            | ResolveError::NotAModule { span, .. }
            | ResolveError::MainRedeclared { span }
            | ResolveError::RaggedFabric { span, .. }
            | ResolveError::EmptyPath { span } => Some(*span),
        }
    }
}

/// Errors that can occur during type checking
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CheckError {
    /// Name resolution failed inside a method body or type
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Type mismatch
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type (human-readable)
        expected: String,
        /// Actual type (human-readable)
        actual: String,
        /// Location of the mismatch
        span: Span,
    },

    /// Use of a name the parents of a class disagree on
    #[error("'{name}' is inherited inconsistently by '{class}' and cannot be used")]
    InheritanceConflict {
        /// Class name
        class: String,
        /// Member name
        name: String,
        /// Location of the use
        span: Span,
    },

    /// Unknown field or method
    #[error("'{class}' has no member '{name}'")]
    UndefinedMember {
        /// Class name
        class: String,
        /// Member name
        name: String,
        /// Location of the use
        span: Span,
    },

    /// Member access on a non-object
    #[error("Cannot access '{name}' on non-object type '{ty}'")]
    NotAnObject {
        /// Member name
        name: String,
        /// Receiver type
        ty: String,
        /// Location of the access
        span: Span,
    },

    /// Method used as a value
    #[error("Method '{name}' must be called")]
    MethodAsValue {
        /// Method name
        name: String,
        /// Location of the use
        span: Span,
    },

    /// Module or class used as a value
    #[error("'{name}' is not a value")]
    NotAValue {
        /// Dotted name
        name: String,
        /// Location of the use
        span: Span,
    },

    /// Void expression used as a value
    #[error("Expression has no value")]
    VoidValue {
        /// Location of the use
        span: Span,
    },

    /// Wrong number of call arguments
    #[error("Method '{method}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        /// Method name
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
        /// Location of the call
        span: Span,
    },

    /// Operator applied to unsupported operand types
    #[error("Operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperands {
        /// Operator spelling
        op: String,
        /// Left operand type
        left: String,
        /// Right operand type
        right: String,
        /// Location of the operation
        span: Span,
    },

    /// Compound assignment on an unsupported target type
    #[error("Operator '{op}' is not supported on {ty}")]
    InvalidCompound {
        /// Operator spelling
        op: String,
        /// Target type
        ty: String,
        /// Location of the statement
        span: Span,
    },

    /// Index on a type that cannot be indexed
    #[error("Type '{ty}' cannot be indexed")]
    NotIndexable {
        /// Indexed type
        ty: String,
        /// Location of the index
        span: Span,
    },

    /// Tuple index not a literal or out of range
    #[error("Tuple index must be an integer literal below {len}")]
    TupleIndex {
        /// Tuple arity
        len: usize,
        /// Location of the index
        span: Span,
    },

    /// `[]` has no element type
    #[error("Empty array literal; use `new` to create an empty array")]
    EmptyArrayLiteral {
        /// Location of the literal
        span: Span,
    },

    /// Array literal elements disagree on their type
    #[error("Array literal elements must share one type: {first} and {other}")]
    MixedArrayLiteral {
        /// Type of the first element
        first: String,
        /// Type of a disagreeing element
        other: String,
        /// Location of the literal
        span: Span,
    },

    /// Cast between unrelated types
    #[error("Cannot cast {from} to {to}")]
    InvalidCast {
        /// Source type
        from: String,
        /// Target type
        to: String,
        /// Location of the cast
        span: Span,
    },

    /// Clone of a type that is not clonable
    #[error("Type '{ty}' is not clonable")]
    NotClonable {
        /// Cloned type
        ty: String,
        /// Location of the clone
        span: Span,
    },

    /// `new` on a type that cannot be instantiated
    #[error("Type '{ty}' cannot be instantiated")]
    NotInstantiable {
        /// Instantiated type
        ty: String,
        /// Location of the expression
        span: Span,
    },

    /// `for` over a type that cannot be iterated
    #[error("Type '{ty}' cannot be iterated")]
    NotIterable {
        /// Iterated type
        ty: String,
        /// Location of the loop
        span: Span,
    },

    /// Loop variables do not fit the iterated collection
    #[error("Invalid loop binding: {message}")]
    LoopBinding {
        /// Explanation
        message: String,
        /// Location of the loop
        span: Span,
    },

    /// Assignment target is not a location
    #[error("Expression cannot be assigned to")]
    NotAssignable {
        /// Location of the assignment
        span: Span,
    },

    /// Local declared with neither a type nor a typed initializer
    #[error("Cannot infer the type of '{name}'")]
    CannotInferType {
        /// Variable name
        name: String,
        /// Location of the declaration
        span: Span,
    },

    /// Local declared twice in the same scope
    #[error("Duplicate variable '{name}'")]
    DuplicateLocal {
        /// Variable name
        name: String,
        /// Location of the second declaration
        span: Span,
    },

    /// Non-void method returns without a value
    #[error("Missing return value of type {expected}")]
    MissingReturnValue {
        /// Declared return type
        expected: String,
        /// Location of the return
        span: Span,
    },

    /// `break` or `continue` outside a loop
    #[error("'{keyword}' outside of a loop")]
    OutsideLoop {
        /// Keyword used
        keyword: &'static str,
        /// Location of the statement
        span: Span,
    },

    /// `super` call with no parent implementation
    #[error("No parent of '{class}' defines method '{name}'")]
    NoSuperMethod {
        /// Class name
        class: String,
        /// Method name
        name: String,
        /// Location of the call
        span: Span,
    },

    /// Mutation not permitted by the enclosing method's effects
    #[error("{action} requires a {required} method")]
    MutationDenied {
        /// What was attempted
        action: String,
        /// Qualifier the enclosing method lacks
        required: &'static str,
        /// Location of the statement
        span: Span,
    },

    /// Write rooted at a fabric
    #[error("Fabric '{name}' is immutable")]
    ImmutableFabric {
        /// Fabric name
        name: String,
        /// Location of the write
        span: Span,
    },
}

impl CheckError {
    /// Location of the error
    pub fn span(&self) -> Span {
        match self {
            CheckError::Resolve(e) => e.span().unwrap_or_default(),
            CheckError::TypeMismatch { span, .. }
            | CheckError::InheritanceConflict { span, .. }
            | CheckError::UndefinedMember { span, .. }
            | CheckError::NotAnObject { span, .. }
            | CheckError::MethodAsValue { span, .. }
            | CheckError::NotAValue { span, .. }
            | CheckError::VoidValue { span }
            | CheckError::ArgumentCount { span, .. }
            | CheckError::InvalidOperands { span, .. }
            | CheckError::InvalidCompound { span, .. }
            | CheckError::NotIndexable { span, .. }
            | CheckError::TupleIndex { span, .. }
            | CheckError::EmptyArrayLiteral { span }
            | CheckError::MixedArrayLiteral { span, .. }
            | CheckError::InvalidCast { span, .. }
            | CheckError::NotClonable { span, .. }
            | CheckError::NotInstantiable { span, .. }
            | CheckError::NotIterable { span, .. }
            | CheckError::LoopBinding { span, .. }
            | CheckError::NotAssignable { span }
            | CheckError::CannotInferType { span, .. }
            | CheckError::DuplicateLocal { span, .. }
            | CheckError::MissingReturnValue { span, .. }
            | CheckError::OutsideLoop { span, .. }
            | CheckError::NoSuperMethod { span, .. }
            | CheckError::MutationDenied { span, .. }
            | CheckError::ImmutableFabric { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_display() {
        let err = ResolveError::InvalidPathStep {
            path: "shapes.Circle.radius".to_string(),
            step: "radius".to_string(),
            parent: "Circle".to_string(),
            span: Span::new(0, 5, 2, 4),
        };
        assert_eq!(
            err.to_string(),
            "Cannot resolve 'radius' in 'shapes.Circle.radius': 'Circle' is not a module"
        );
        assert_eq!(err.span(), Some(Span::new(0, 5, 2, 4)));
    }

    #[test]
    fn test_license_error_has_no_span() {
        let err = ResolveError::LicenseCount {
            url: "app".to_string(),
            count: 0,
        };
        assert!(err.span().is_none());
        assert!(err.to_string().contains("exactly one license"));
    }

    #[test]
    fn test_check_error_span() {
        let span = Span::new(10, 20, 3, 5);
        let err = CheckError::MutationDenied {
            action: "Calling 'move'".to_string(),
            required: "mutating",
            span,
        };
        assert_eq!(err.span(), span);
        assert_eq!(err.to_string(), "Calling 'move' requires a mutating method");
    }

    #[test]
    fn test_resolve_wraps_transparently() {
        let inner = ResolveError::UndefinedSymbol {
            name: "Foo".to_string(),
            span: Span::new(1, 4, 1, 2),
        };
        let err: CheckError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
        assert_eq!(err.span(), Span::new(1, 4, 1, 2));
    }
}
