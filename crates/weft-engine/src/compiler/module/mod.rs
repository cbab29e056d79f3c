//! Module import pipeline
//!
//! This module turns module URLs into registered modules:
//! - Source fetching through the [`Fetch`] collaborator
//! - The module registry (`registry`)
//! - Resolution, composition, checking and lowering (`loader`)
//! - Import cycle detection

mod fetch;
mod loader;
mod registry;

pub use fetch::{Fetch, FetchError, FileFetcher, MapFetcher};
pub use loader::ModuleLoader;
pub use registry::{FabricId, Module, ModuleId, ModuleRegistry};

use crate::compiler::classes::ComposeError;
use crate::compiler::codegen::CodegenError;
use crate::parser::checker::{CheckError, ResolveError};
use crate::parser::ParseError;
use thiserror::Error;

fn format_chain(chain: &[String]) -> String {
    chain.join(" -> ")
}

/// Errors that can occur while importing a module
#[derive(Debug, Error)]
pub enum ImportError {
    /// Source could not be fetched
    #[error("Cannot fetch '{url}': {source}")]
    Fetch {
        /// Module URL
        url: String,
        /// Transport failure
        #[source]
        source: FetchError,
    },

    /// Source is not a valid syntax tree
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Name or export resolution failed
    #[error("Resolution error in '{url}': {source}")]
    Resolve {
        /// Module URL
        url: String,
        /// Underlying error
        #[source]
        source: ResolveError,
    },

    /// Class composition failed
    #[error("Class error in '{url}': {source}")]
    Compose {
        /// Module URL
        url: String,
        /// Underlying error
        #[source]
        source: ComposeError,
    },

    /// Type or effect checking failed
    #[error("Type error in '{url}' at {}: {source}", .source.span())]
    Check {
        /// Module URL
        url: String,
        /// Underlying error
        #[source]
        source: CheckError,
    },

    /// Lowering failed
    #[error("Code generation error in '{url}': {source}")]
    Codegen {
        /// Module URL
        url: String,
        /// Underlying error
        #[source]
        source: CodegenError,
    },

    /// A module imports itself, directly or through others
    #[error("Circular import: {}", format_chain(.chain))]
    Cycle {
        /// URLs from the first module of the cycle back to it
        chain: Vec<String>,
    },
}

impl ImportError {
    /// URL of the module the error belongs to, when known
    pub fn url(&self) -> Option<&str> {
        match self {
            ImportError::Fetch { url, .. }
            | ImportError::Resolve { url, .. }
            | ImportError::Compose { url, .. }
            | ImportError::Check { url, .. }
            | ImportError::Codegen { url, .. } => Some(url),
            ImportError::Parse(ParseError::Malformed { url, .. }) => Some(url),
            ImportError::Cycle { chain } => chain.last().map(String::as_str),
        }
    }
}
