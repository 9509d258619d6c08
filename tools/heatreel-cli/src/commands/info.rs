//! Show scene information.

use std::path::PathBuf;

use heatreel_processing_core::timeline::TimelineResampler;
use heatreel_scene_model::LoadedScene;

pub fn run(scene_path: PathBuf) -> anyhow::Result<()> {
    let scene = LoadedScene::load(&scene_path)
        .map_err(|e| anyhow::anyhow!("Failed to load scene: {e}"))?;
    let config = scene.config();

    println!("Scene: {}", scene_path.display());
    println!("  Background: {}", scene.background.display());
    println!();

    println!("Regions:");
    for (region, stream) in scene.regions.iter().zip(&scene.streams) {
        let range = stream
            .observed_range()
            .map(|(first, last)| format!("{first}s..{last}s"))
            .unwrap_or_else(|| "no samples".to_string());
        println!(
            "  [{}] {} ({}, {} samples, {})",
            region.index,
            region.name,
            region.shape.kind(),
            stream.samples.len(),
            range
        );
    }
    println!();

    let timeline = TimelineResampler::new()
        .resample(&scene.streams)
        .map_err(|e| anyhow::anyhow!("Failed to align sensor streams: {e}"))?;
    println!("Timeline:");
    match timeline.start_second() {
        Some(start) => println!(
            "  Seconds: {}..{} ({} rows)",
            start,
            timeline.second(timeline.len() - 1),
            timeline.len()
        ),
        None => println!("  Seconds: none"),
    }
    println!("  Frame rate: {:.3} fps", config.frame_rate(timeline.len()));
    println!("  Events: {}", scene.events.len());
    println!();

    println!("Rendering:");
    println!(
        "  Colormap: {} [{}, {}]",
        config.scale.colormap, config.scale.min, config.scale.max
    );
    println!("  Base width: {}px", config.layout.base_width);
    println!("  Codec: {}", config.output.codec.encoder());
    if scene.cameras.is_empty() {
        println!("  Cameras: none");
    } else {
        println!("  Cameras:");
        for (i, camera) in scene.cameras.iter().enumerate() {
            println!("    [{i}] {}", camera.display());
        }
    }

    Ok(())
}
