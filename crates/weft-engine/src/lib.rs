//! Weft Language Engine
//!
//! This crate provides the semantic core of the Weft language:
//! - **Parser**: the syntax-tree contract, type lattice, resolver and type
//!   checker (`parser` module)
//! - **Compiler**: class composition, module import pipeline and code
//!   generation (`compiler` module)
//! - **VM**: the object runtime that executes generated units, including
//!   dynamic extend/retract and suggestion enforcement (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_engine::{Engine, EngineOptions, MapFetcher};
//!
//! let mut fetcher = MapFetcher::new();
//! fetcher.insert("weft:core", core_tree_json);
//! fetcher.insert("app", app_tree_json);
//!
//! let mut engine = Engine::new(EngineOptions::default(), Box::new(fetcher));
//! engine.import("app")?;
//! let main = engine.run_main("app")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]
#![allow(clippy::result_large_err)]

/// Syntax-tree contract, type lattice, resolver and type checker
pub mod parser;

/// Class composition, module import pipeline and code generation
pub mod compiler;

/// Object runtime: values, manifestation, interpreter, suggestions
pub mod vm;

/// Engine configuration
pub mod config;

/// Engine facade tying the pipeline and runtime together
pub mod engine;

// ============================================================================
// Re-exports
// ============================================================================

pub use parser::{
    ast, JsonTreeParser, ParseError, SourceParser, Span,
    // Types
    types::{ClassHierarchy, MethodSig, MethodSlot, Relation, Type},
    // Checker
    checker::{CheckError, ResolveError, SymbolTable, TypeChecker},
};

pub use compiler::{
    classes::{ClassDef, ClassId, ClassRegistry, ComposeError, Entry, FieldId, FieldInfo},
    ir,
    module::{
        FabricId, Fetch, FetchError, FileFetcher, ImportError, MapFetcher, Module, ModuleId,
        ModuleLoader, ModuleRegistry,
    },
};

pub use vm::{
    snapshot, FieldView, FreshId, FreshIds, Object, ObjectRef, Runtime, Step, Suggestion, Value,
    VmError, VmResult,
};

pub use config::{EngineOptions, RuntimeOptions};
pub use engine::{Engine, EngineError};
