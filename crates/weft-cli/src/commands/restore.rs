//! `weft restore` - rebuild a saved object graph and print it back.

use anyhow::Context;
use std::path::Path;
use weft_engine::snapshot::Snapshot;
use weft_engine::Engine;

pub fn execute(engine: &mut Engine, url: &str, path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = Snapshot::from_json(&text).with_context(|| format!("Invalid snapshot in {}", path.display()))?;

    engine.import(url)?;
    let root = engine.restore(&snapshot)?;
    println!("{}", engine.snapshot(&root).to_json()?);
    Ok(())
}
