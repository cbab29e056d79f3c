//! Engine configuration (`weft.toml`)
//!
//! Every key is optional; a missing key takes its default:
//!
//! ```toml
//! core_url = "weft:core"
//! root_class = "Object"
//! clonable_class = "Clonable"
//! entry_method = "init"
//! privileged = []
//!
//! [runtime]
//! max_call_depth = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Runtime limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Deepest allowed nesting of method invocations
    pub max_call_depth: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { max_call_depth: 256 }
    }
}

/// Engine options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// URL of the core module every other module implicitly imports
    pub core_url: String,
    /// Core class every class without declared parents inherits from
    pub root_class: String,
    /// Core class whose descendants may be cloned
    pub clonable_class: String,
    /// Method `run_main` calls on a fresh main object
    pub entry_method: String,
    /// Additional modules allowed to declare parentless classes
    pub privileged: Vec<String>,
    /// Runtime limits
    pub runtime: RuntimeOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            core_url: "weft:core".to_string(),
            root_class: "Object".to_string(),
            clonable_class: "Clonable".to_string(),
            entry_method: "init".to_string(),
            privileged: Vec::new(),
            runtime: RuntimeOptions::default(),
        }
    }
}

impl EngineOptions {
    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: EngineOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_url.is_empty() {
            return Err(ConfigError::ValidationError("core_url cannot be empty".to_string()));
        }
        if self.root_class.is_empty() || self.entry_method.is_empty() {
            return Err(ConfigError::ValidationError(
                "root_class and entry_method cannot be empty".to_string(),
            ));
        }
        if self.runtime.max_call_depth == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.max_call_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `url` may declare parentless classes
    pub fn is_privileged(&self, url: &str) -> bool {
        url == self.core_url || self.privileged.iter().any(|p| p == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::from_toml_str("").unwrap();
        assert_eq!(options, EngineOptions::default());
        assert_eq!(options.runtime.max_call_depth, 256);
        assert!(options.is_privileged("weft:core"));
        assert!(!options.is_privileged("app"));
    }

    #[test]
    fn test_partial_override() {
        let options = EngineOptions::from_toml_str(
            r#"
            root_class = "Thing"
            privileged = ["lib:kernel"]

            [runtime]
            max_call_depth = 32
            "#,
        )
        .unwrap();
        assert_eq!(options.root_class, "Thing");
        assert_eq!(options.core_url, "weft:core");
        assert_eq!(options.runtime.max_call_depth, 32);
        assert!(options.is_privileged("lib:kernel"));
    }

    #[test]
    fn test_validation() {
        let err = EngineOptions::from_toml_str("[runtime]\nmax_call_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err = EngineOptions::from_toml_str("core_url = 5").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weft.toml");
        std::fs::write(&path, "entry_method = \"start\"\n").unwrap();
        let options = EngineOptions::from_file(&path).unwrap();
        assert_eq!(options.entry_method, "start");
    }
}
