//! Example: Translate a USDA file and list the package contents.
//!
//! Run with: cargo run --example convert_usda -- scene.usda [out.unitypackage]

use std::env;
use std::path::Path;

use anyhow::Context;
use usdpkg_core::translate::export_stage;
use usdpkg_core::usd::load_usda;
use usdpkg_core::ConvertOptions;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: convert_usda <path-to-usda-file> [output.unitypackage]");
        println!("\nExample:");
        println!("  cargo run --example convert_usda -- shot.usda shot.unitypackage");
        return Ok(());
    }

    let path = &args[1];
    println!("Loading USDA file: {}", path);

    let stage = load_usda(path).with_context(|| format!("loading {}", path))?;
    println!("\n=== Stage: {} ===", stage.name);
    println!("Up axis: {}", stage.up_axis.as_token());
    println!("Meters per unit: {}", stage.meters_per_unit);
    println!("Prims: {}", stage.prim_count());

    let export = export_stage(&stage, &ConvertOptions::default())?;

    println!("\n--- Package ---");
    for asset in &export.package.assets {
        let size = asset
            .asset
            .as_ref()
            .map(|a| format!("{} bytes", a.len()))
            .unwrap_or_else(|| "folder".to_string());
        println!("  {} {} ({})", asset.guid, asset.pathname, size);
    }

    if !export.notes.is_empty() {
        println!("\n--- Skipped ---");
        for note in &export.notes {
            println!("  {}", note);
        }
    }

    if let Some(out) = args.get(2) {
        export.package.write_to_path(Path::new(out))?;
        println!("\nWrote {}", out);
    }

    Ok(())
}
