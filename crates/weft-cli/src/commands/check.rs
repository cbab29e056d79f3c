//! `weft check` - import a module without running it.

use weft_engine::Engine;

pub fn execute(engine: &mut Engine, url: &str, json: bool) -> anyhow::Result<()> {
    engine.import(url)?;

    if json {
        let modules: Vec<serde_json::Value> = engine
            .modules()
            .iter()
            .map(|m| {
                serde_json::json!({
                    "url": m.url,
                    "checksum": m.checksum_hex(),
                    "classes": m.classes.len(),
                    "license": m.license,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    for module in engine.modules().iter() {
        println!(
            "{:<24} {} ({} classes)",
            module.url,
            &module.checksum_hex()[..12],
            module.classes.len()
        );
    }
    println!("ok: {}", url);
    Ok(())
}
