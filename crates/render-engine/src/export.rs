//! Render jobs and the sequential render loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use heatreel_common::config::DecodeDefaults;
use heatreel_common::error::{HeatreelError, HeatreelResult};
use heatreel_processing_core::timeline::{AlignedTimeline, TimelineResampler};
use heatreel_scene_model::config::RenderConfig;
use heatreel_scene_model::scene::LoadedScene;
use serde::Serialize;

use crate::camera::{open_camera_sources, CameraFrameSource};
use crate::compositor::FrameCompositor;
use crate::panels::resize_to_width;
use crate::sink::{FfmpegVideoSink, ImageDirectorySink, VideoSink, VideoSinkOptions};
use crate::text::TextStyles;

/// A render ready to run.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Scene manifest path.
    pub scene: PathBuf,

    pub output: OutputTarget,

    /// Camera decoding and encoder binaries.
    pub decode: DecodeDefaults,

    /// Replaces `output.duration_secs` from the scene.
    pub duration_secs: Option<f64>,
}

/// Where frames go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Encoded video file.
    Video(PathBuf),
    /// Numbered PNG stills in a directory.
    ImageDirectory(PathBuf),
}

impl OutputTarget {
    /// Video output, with `.mp4` appended when the name lacks it.
    pub fn video(path: impl AsRef<Path>) -> Self {
        Self::Video(with_mp4_extension(path.as_ref()))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Video(path) | Self::ImageDirectory(path) => path,
        }
    }

    /// JSON report location: beside a video, inside a still directory.
    pub fn report_path(&self) -> PathBuf {
        match self {
            Self::Video(path) => path.with_extension("render-report.json"),
            Self::ImageDirectory(dir) => dir.join("render-report.json"),
        }
    }
}

/// Append `.mp4` unless the name already ends with it.
pub fn with_mp4_extension(path: &Path) -> PathBuf {
    if path.to_string_lossy().ends_with(".mp4") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".mp4");
        PathBuf::from(name)
    }
}

/// Progress callback for rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Render progress report.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: RenderStage,
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Rendering,
    Encoding,
    Finalizing,
    Complete,
    Failed,
}

fn report_progress(
    progress: Option<&ProgressCallback>,
    stage: RenderStage,
    frames_rendered: u64,
    total_frames: u64,
    eta_secs: f64,
) {
    if let Some(cb) = progress {
        let fraction = if total_frames == 0 {
            0.0
        } else {
            frames_rendered as f64 / total_frames as f64
        };
        cb(RenderProgress {
            progress: fraction,
            frames_rendered,
            total_frames,
            eta_secs,
            stage,
        });
    }
}

/// A camera source that ran out before the timeline did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExhaustedCamera {
    pub source: String,
    /// Frames the source supplied before ending.
    pub after_frames: usize,
}

/// Outcome of the render loop.
#[derive(Debug, Clone)]
pub struct RenderStats {
    pub frames: usize,
    pub exhausted_cameras: Vec<ExhaustedCamera>,
    pub elapsed_secs: f64,
}

/// Outcome of [`render_scene`].
#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub output: PathBuf,
    pub report: PathBuf,
    pub frames: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub exhausted_cameras: Vec<ExhaustedCamera>,
    pub overflowing_captions: Vec<String>,
    pub elapsed_secs: f64,
}

/// Everything loaded, validated, and precomputed; only the loop is left.
pub struct PreparedRender {
    scene: LoadedScene,
    config: Arc<RenderConfig>,
    timeline: AlignedTimeline,
    compositor: FrameCompositor,
    fps: f64,
    caption_half_window: i64,
}

impl PreparedRender {
    /// Load the scene at `scene_path`, optionally overriding its output
    /// duration.
    pub fn load(scene_path: &Path, duration_secs: Option<f64>) -> HeatreelResult<Self> {
        let mut scene = LoadedScene::load(scene_path)?;
        if let Some(duration) = duration_secs {
            scene.manifest.config.output.duration_secs = Some(duration);
        }
        Self::from_scene(scene)
    }

    /// Validate a loaded scene and build every static piece of the render.
    pub fn from_scene(scene: LoadedScene) -> HeatreelResult<Self> {
        let started = Instant::now();
        scene.validate()?;
        let config = Arc::new(scene.config().clone());

        let background = image::open(&scene.background)
            .map_err(|e| {
                HeatreelError::config(
                    "background",
                    format!("cannot decode {}: {e}", scene.background.display()),
                )
            })?
            .to_rgb8();
        let background = resize_to_width(&background, config.layout.base_width);

        let timeline = TimelineResampler::new().resample(&scene.streams)?;
        if timeline.is_empty() {
            return Err(HeatreelError::config(
                "streams",
                "no sensor stream contains a usable sample",
            ));
        }
        let fps = config.frame_rate(timeline.len());
        let caption_half_window = config.caption_half_window_rows(fps);

        let text = TextStyles::load(&config.fonts, &scene.root)?;
        let compositor = FrameCompositor::new(
            config.clone(),
            background,
            scene.regions.clone(),
            &scene.events,
            scene.cameras.len(),
            text,
        )?;

        tracing::info!(
            rows = timeline.len(),
            fps,
            width = compositor.layout().width,
            height = compositor.layout().height,
            prepare_ms = started.elapsed().as_millis(),
            "Render prepared"
        );

        Ok(Self {
            scene,
            config,
            timeline,
            compositor,
            fps,
            caption_half_window,
        })
    }

    pub fn scene(&self) -> &LoadedScene {
        &self.scene
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn timeline(&self) -> &AlignedTimeline {
        &self.timeline
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn total_frames(&self) -> usize {
        self.timeline.len()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.compositor.frame_size()
    }

    /// One frame per aligned row, each pulling exactly one item from every
    /// camera source. A sink failure aborts the sink and ends the render.
    pub fn run(
        &self,
        cameras: &mut [Box<dyn CameraFrameSource>],
        sink: &mut dyn VideoSink,
        progress: Option<&ProgressCallback>,
    ) -> HeatreelResult<RenderStats> {
        let started = Instant::now();
        let total = self.timeline.len() as u64;
        let mut ended_at: Vec<Option<usize>> = vec![None; cameras.len()];

        report_progress(progress, RenderStage::Rendering, 0, total, 0.0);

        for (index, row) in self.timeline.rows().enumerate() {
            let mut camera_frames = Vec::with_capacity(cameras.len());
            for (i, source) in cameras.iter_mut().enumerate() {
                let frame = source.next_frame();
                if frame.is_none() && ended_at[i].is_none() {
                    tracing::info!(
                        source = source.label(),
                        frame = index,
                        "Camera source exhausted; showing placeholder"
                    );
                    ended_at[i] = Some(index);
                }
                camera_frames.push(frame);
            }

            let captions = self
                .scene
                .events
                .active_at(row.second, self.caption_half_window);
            let second = row.second;
            let ctx = self.compositor.context(row, captions, camera_frames);
            let frame = self.compositor.compose(&ctx);

            if let Err(e) = sink.write_frame(&frame) {
                tracing::error!(frame = index, second, error = %e, "Writing frame failed; discarding output");
                sink.abort();
                report_progress(progress, RenderStage::Failed, index as u64, total, 0.0);
                return Err(e);
            }

            let done = index as u64 + 1;
            let elapsed = started.elapsed().as_secs_f64();
            let eta = elapsed / done as f64 * (total - done) as f64;
            report_progress(progress, RenderStage::Rendering, done, total, eta);
            tracing::trace!(frame = index, second, "Frame composed");
        }

        report_progress(progress, RenderStage::Encoding, total, total, 0.0);
        if let Err(e) = sink.finish() {
            report_progress(progress, RenderStage::Failed, total, total, 0.0);
            return Err(e);
        }

        let exhausted_cameras = cameras
            .iter()
            .zip(&ended_at)
            .filter_map(|(source, ended)| {
                ended.map(|after_frames| ExhaustedCamera {
                    source: source.label().to_string(),
                    after_frames,
                })
            })
            .collect();

        Ok(RenderStats {
            frames: self.timeline.len(),
            exhausted_cameras,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

/// Render a scene to its output target.
///
/// This is the main entry point for rendering. Every input is loaded and
/// validated before the sink is opened, so configuration errors never leave
/// a partial output behind.
pub fn render_scene(
    job: &RenderJob,
    progress: Option<ProgressCallback>,
) -> HeatreelResult<RenderSummary> {
    let started = Instant::now();
    tracing::info!(
        scene = %job.scene.display(),
        output = %job.output.path().display(),
        "Starting render"
    );
    report_progress(progress.as_ref(), RenderStage::Preparing, 0, 0, 0.0);

    let prepared = match PreparedRender::load(&job.scene, job.duration_secs) {
        Ok(prepared) => prepared,
        Err(e) => {
            report_progress(progress.as_ref(), RenderStage::Failed, 0, 0, 0.0);
            return Err(e);
        }
    };
    let mut cameras = open_camera_sources(&prepared.scene().cameras, &job.decode)?;

    let (width, height) = prepared.frame_size();
    let mut sink: Box<dyn VideoSink> = match &job.output {
        OutputTarget::Video(path) => Box::new(FfmpegVideoSink::create(
            path,
            &VideoSinkOptions {
                ffmpeg_binary: job.decode.ffmpeg_binary.clone(),
                width,
                height,
                fps: prepared.fps(),
                codec: prepared.config().output.codec,
            },
        )?),
        OutputTarget::ImageDirectory(dir) => Box::new(ImageDirectorySink::create(dir)?),
    };

    let stats = prepared.run(&mut cameras, &mut *sink, progress.as_ref())?;
    report_progress(
        progress.as_ref(),
        RenderStage::Finalizing,
        stats.frames as u64,
        stats.frames as u64,
        0.0,
    );

    let summary = RenderSummary {
        output: sink.output().to_path_buf(),
        report: job.output.report_path(),
        frames: stats.frames,
        fps: prepared.fps(),
        width,
        height,
        exhausted_cameras: stats.exhausted_cameras,
        overflowing_captions: prepared.compositor().overflowing_captions().to_vec(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    write_report(job, &summary)?;

    report_progress(
        progress.as_ref(),
        RenderStage::Complete,
        stats.frames as u64,
        stats.frames as u64,
        0.0,
    );
    tracing::info!(
        output = %summary.output.display(),
        frames = summary.frames,
        elapsed_secs = summary.elapsed_secs,
        "Render finished"
    );
    Ok(summary)
}

fn write_report(job: &RenderJob, summary: &RenderSummary) -> HeatreelResult<()> {
    let clean = summary.exhausted_cameras.is_empty() && summary.overflowing_captions.is_empty();
    let report = serde_json::json!({
        "scene": job.scene,
        "output": summary.output,
        "frames": summary.frames,
        "fps": summary.fps,
        "width": summary.width,
        "height": summary.height,
        "exhausted_cameras": summary.exhausted_cameras,
        "overflowing_captions": summary.overflowing_captions,
        "elapsed_secs": summary.elapsed_secs,
        "rendered_at": chrono::Utc::now().to_rfc3339(),
        "status": if clean { "ok" } else { "warn" }
    });
    std::fs::write(&summary.report, serde_json::to_string_pretty(&report)?)?;
    tracing::info!(report = %summary.report.display(), "Wrote render report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_extension_is_appended_once() {
        assert_eq!(with_mp4_extension(Path::new("out")), PathBuf::from("out.mp4"));
        assert_eq!(with_mp4_extension(Path::new("out.mp4")), PathBuf::from("out.mp4"));
        assert_eq!(
            with_mp4_extension(Path::new("dir/take.2")),
            PathBuf::from("dir/take.2.mp4")
        );
    }

    #[test]
    fn report_sits_beside_the_output() {
        let video = OutputTarget::video("renders/lab");
        assert_eq!(video.path(), Path::new("renders/lab.mp4"));
        assert_eq!(
            video.report_path(),
            PathBuf::from("renders/lab.render-report.json")
        );

        let stills = OutputTarget::ImageDirectory(PathBuf::from("frames"));
        assert_eq!(stills.report_path(), PathBuf::from("frames/render-report.json"));
    }

    #[test]
    fn missing_scene_fails_before_output_exists() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("stills");
        let job = RenderJob {
            scene: dir.path().join("absent.json"),
            output: OutputTarget::ImageDirectory(out.clone()),
            decode: DecodeDefaults::default(),
            duration_secs: None,
        };
        assert!(render_scene(&job, None).is_err());
        assert!(!out.exists());
    }
}
