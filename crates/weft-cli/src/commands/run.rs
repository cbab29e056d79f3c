//! `weft run` - instantiate the main class and print its object graph.

use anyhow::Context;
use std::path::Path;
use weft_engine::{Engine, Value};

pub fn execute(engine: &mut Engine, url: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let main = engine.run_main(url)?;
    let snapshot = engine.snapshot(&Value::Object(main));
    let text = snapshot.to_json()?;

    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} entities to {}", snapshot.entity_count(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
