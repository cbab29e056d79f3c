//! Weft compiler
//!
//! Turns checked syntax trees into classes the runtime can instantiate:
//!
//! - `classes`: class registry and multiple-inheritance composition
//! - `ir`: executable units
//! - `codegen`: lowering of method bodies and field initializers
//! - `module`: the import pipeline (fetch, resolve, compose, check, lower)

pub mod classes;
pub mod codegen;
pub mod ir;
pub mod module;

pub use classes::{ClassDef, ClassId, ClassRegistry, ComposeError};
pub use codegen::CodegenError;
pub use ir::Unit;
