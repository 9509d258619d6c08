//! Validate a scene.

use std::path::PathBuf;

use heatreel_processing_core::colormap::Colormap;
use heatreel_processing_core::timeline::TimelineResampler;
use heatreel_scene_model::LoadedScene;

pub fn run(scene_path: PathBuf) -> anyhow::Result<()> {
    println!("Validating scene at: {}", scene_path.display());

    let scene = LoadedScene::load(&scene_path)
        .map_err(|e| anyhow::anyhow!("Failed to load scene: {e}"))?;

    println!("  Regions: {}", scene.regions.len());
    println!("  Streams: {}", scene.streams.len());
    println!("  Cameras: {}", scene.cameras.len());
    println!("  Events: {}", scene.events.len());

    let mut issues = Vec::new();
    if let Err(e) = scene.validate() {
        issues.push(e.to_string());
    }
    if let Err(e) = scene.config().scale.colormap.parse::<Colormap>() {
        issues.push(e.to_string());
    }
    let rows = match TimelineResampler::new().resample(&scene.streams) {
        Ok(timeline) if timeline.is_empty() => {
            issues.push("no sensor stream contains a usable sample".to_string());
            0
        }
        Ok(timeline) => timeline.len(),
        Err(e) => {
            issues.push(e.to_string());
            0
        }
    };

    if issues.is_empty() {
        let fps = scene.config().frame_rate(rows);
        println!("  Frames: {rows} at {fps:.3} fps");
        println!("\nScene is valid.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        anyhow::bail!("{} issue(s) found", issues.len())
    }
}
