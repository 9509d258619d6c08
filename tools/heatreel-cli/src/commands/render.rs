//! Render a scene.

use std::io::Write;
use std::path::PathBuf;

use heatreel_common::config::AppConfig;
use heatreel_render_engine::export::{
    render_scene, OutputTarget, ProgressCallback, RenderJob, RenderStage,
};

pub fn run(
    app_config: &AppConfig,
    scene: PathBuf,
    output: Option<PathBuf>,
    frames_dir: Option<PathBuf>,
    duration: Option<f64>,
    no_prefetch: bool,
) -> anyhow::Result<()> {
    println!("Rendering scene: {}", scene.display());

    let target = match (frames_dir, output) {
        (Some(dir), _) => OutputTarget::ImageDirectory(dir),
        (None, Some(path)) => OutputTarget::video(path),
        (None, None) => {
            let stem = scene
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "heatmap".to_string());
            OutputTarget::video(app_config.output_dir.join(stem))
        }
    };

    let mut decode = app_config.decode.clone();
    if no_prefetch {
        decode.prefetch = false;
    }

    println!("  Output: {}", target.path().display());
    if let Some(secs) = duration {
        println!("  Duration: {secs}s");
    }

    tracing::debug!(
        prefetch = decode.prefetch,
        queue_capacity = decode.queue_capacity,
        "Resolved render job"
    );

    let job = RenderJob {
        scene,
        output: target,
        decode,
        duration_secs: duration,
    };

    let progress_cb: ProgressCallback = Box::new(|p| {
        if p.stage == RenderStage::Rendering {
            print!(
                "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
                p.eta_secs,
            );
            let _ = std::io::stdout().flush();
        }
    });

    let summary = render_scene(&job, Some(progress_cb))
        .map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;

    println!("\nRender complete: {}", summary.output.display());
    println!(
        "  {} frames at {:.3} fps, {}x{}",
        summary.frames, summary.fps, summary.width, summary.height
    );
    for camera in &summary.exhausted_cameras {
        println!(
            "  Camera {} ran out after {} frames",
            camera.source, camera.after_frames
        );
    }
    if !summary.overflowing_captions.is_empty() {
        println!(
            "  {} caption(s) wider than the caption panel",
            summary.overflowing_captions.len()
        );
    }
    println!("  Report: {}", summary.report.display());

    Ok(())
}
