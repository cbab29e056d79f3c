//! Weft object runtime
//!
//! This module provides the execution side of the engine:
//! - Values, heap objects and fresh identifiers
//! - Manifestation and the shared method-table cache
//! - The interpreter for generated units
//! - Suggestion enforcement
//! - Object-graph snapshots

pub mod ids;
pub mod interpreter;
pub mod keys;
pub mod manifest;
pub mod object;
pub mod random;
pub mod runtime;
pub mod snapshot;
pub mod suggestion;
pub mod value;

use crate::compiler::classes::ClassId;
use thiserror::Error;

pub use ids::{FreshId, FreshIds};
pub use keys::MapKey;
pub use manifest::{compute_manifest, CacheStats, Manifest, ManifestCache, VTable};
pub use object::{Object, ObjectRef};
pub use runtime::{FieldView, Runtime};
pub use suggestion::{Step, Suggestion};
pub use value::{format_num, Collection, Value};

/// Fatal runtime errors.
///
/// Everyday gaps (missing methods, missing fields, null containers) fall
/// back to default values instead; these are the states that cannot.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    /// Class id not in the registry
    #[error("Unknown class {class}")]
    UnknownClass {
        /// Requested class
        class: ClassId,
    },

    /// `super` call whose parent no longer provides an implementation
    #[error("Class '{class}' has no implementation of '{method}' to call through super")]
    MissingSuperMethod {
        /// Parent class name
        class: String,
        /// Method name
        method: String,
    },

    /// Invocation nesting exceeded the configured limit
    #[error("Call depth limit of {limit} exceeded")]
    CallDepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Host call of a method the object does not have
    #[error("Object has no method '{name}'")]
    UnknownMethod {
        /// Method name
        name: String,
    },

    /// Host call with the wrong number of arguments
    #[error("Method '{method}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Method name
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Snapshot that cannot be restored
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Runtime result
pub type VmResult<T> = Result<T, VmError>;
