//! Name resolution and type checking
//!
//! Resolution builds each module's symbol and export tables; checking walks
//! method bodies and field initializers against the composed classes,
//! enforcing types and mutation effects, and records what every node
//! resolved to for the code generator.

pub mod effects;
pub mod error;
pub mod resolver;
pub mod symbols;

#[allow(clippy::module_inception)]
mod checker;
mod stmt;

pub use checker::{CheckContext, CheckResult, IterKind, LoopPlan, Resolution, TypeChecker};
pub use effects::{Effects, Requirement};
pub use error::{CheckError, ResolveError};
pub use resolver::NameResolver;
pub use symbols::{Binding, ExportTable, Origin, SymbolTable, Target};
