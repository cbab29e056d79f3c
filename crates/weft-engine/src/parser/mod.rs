//! Syntax-tree contract and static semantics.
//!
//! Surface syntax is owned by external parsers; the engine consumes a tree
//! of typed nodes. Every node is `{"type": <tag>, "children": {...}}`, and
//! declaration/statement nodes carry a source [`Span`] for diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use weft_engine::parser::{JsonTreeParser, SourceParser};
//!
//! let tree = r#"{"type": "module", "children": {"declarations": []}}"#;
//! let module = JsonTreeParser.parse("app", tree)?;
//! assert!(module.declarations.is_empty());
//! ```

pub mod ast;

// Type system modules
pub mod types;

// Resolver and checker
pub mod checker;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source location of a declaration or statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character
    #[serde(default)]
    pub start: usize,
    /// Byte offset one past the last character
    #[serde(default)]
    pub end: usize,
    /// 1-based line number (0 when unknown)
    #[serde(default)]
    pub line: u32,
    /// 1-based column number (0 when unknown)
    #[serde(default)]
    pub column: u32,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Whether the span carries any location information
    pub fn is_known(&self) -> bool {
        self.line != 0 || self.end != 0
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors produced while decoding a syntax tree
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is not a well-formed node tree
    #[error("Malformed syntax tree for '{url}': {message}")]
    Malformed {
        /// Module URL
        url: String,
        /// Decoder message
        message: String,
    },
}

/// Collaborator turning fetched source text into a syntax tree
pub trait SourceParser {
    /// Parse the text fetched for `url`
    fn parse(&self, url: &str, text: &str) -> Result<ast::Module, ParseError>;
}

/// Parser for syntax trees serialized as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTreeParser;

/// Root node wrapper so the module itself follows the node contract
#[derive(Deserialize)]
#[serde(tag = "type", content = "children", rename_all = "snake_case")]
enum TreeRoot {
    Module(ast::Module),
}

impl SourceParser for JsonTreeParser {
    fn parse(&self, url: &str, text: &str) -> Result<ast::Module, ParseError> {
        let root: TreeRoot = serde_json::from_str(text).map_err(|e| ParseError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let TreeRoot::Module(module) = root;
        Ok(module)
    }
}
