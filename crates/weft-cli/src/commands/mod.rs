//! Subcommand implementations

pub mod check;
pub mod restore;
pub mod run;

use anyhow::Context;
use std::path::Path;
use weft_engine::{Engine, EngineOptions, FileFetcher};

/// Engine reading sources under `root`, configured from `config` or from
/// `<root>/weft.toml` when that file exists
pub fn open_engine(root: &Path, config: Option<&Path>) -> anyhow::Result<Engine> {
    let default_config = root.join("weft.toml");
    let config = match config {
        Some(path) => Some(path),
        None if default_config.is_file() => Some(default_config.as_path()),
        None => None,
    };

    let options = match config {
        Some(path) => EngineOptions::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => EngineOptions::default(),
    };

    Ok(Engine::new(options, Box::new(FileFetcher::new(root))))
}
