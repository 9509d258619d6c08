//! Frame sinks.
//!
//! A sink receives every composed frame in order. When a render fails, the
//! sink removes whatever it wrote so no partial output is left behind.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use heatreel_common::error::{HeatreelError, HeatreelResult};
use heatreel_scene_model::config::VideoCodec;
use image::RgbImage;

use crate::camera::command_exists;

/// Ordered destination for composed frames.
pub trait VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> HeatreelResult<()>;

    /// Flush and close. On failure the output is removed.
    fn finish(&mut self) -> HeatreelResult<()>;

    /// Discard everything written so far.
    fn abort(&mut self);

    /// Where the output lives.
    fn output(&self) -> &Path;
}

/// Settings for [`FfmpegVideoSink`].
#[derive(Debug, Clone)]
pub struct VideoSinkOptions {
    pub ffmpeg_binary: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: VideoCodec,
}

/// Pipes raw `rgb24` frames into an `ffmpeg` encoder.
pub struct FfmpegVideoSink {
    output: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frame_size: (u32, u32),
    frames: u64,
}

impl FfmpegVideoSink {
    pub fn create(output: &Path, options: &VideoSinkOptions) -> HeatreelResult<Self> {
        if !command_exists(&options.ffmpeg_binary) {
            return Err(HeatreelError::unsupported(format!(
                "`{}` not found in PATH; it is required to encode video",
                options.ffmpeg_binary
            )));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let args = encoder_args(output, options);
        tracing::debug!(args = ?args, "Starting ffmpeg encoder");
        let mut child = Command::new(&options.ffmpeg_binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HeatreelError::sink(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HeatreelError::sink("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HeatreelError::sink("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = std::io::BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            output = %output.display(),
            pid = child.id(),
            codec = options.codec.encoder(),
            fps = options.fps,
            "ffmpeg encoder started"
        );

        Ok(Self {
            output: output.to_path_buf(),
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            frame_size: (options.width, options.height),
            frames: 0,
        })
    }

    fn stderr_output(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }

    fn remove_output(&self) {
        if self.output.exists() {
            if let Err(e) = std::fs::remove_file(&self.output) {
                tracing::warn!(path = %self.output.display(), error = %e, "Failed to remove partial output");
            }
        }
    }
}

impl VideoSink for FfmpegVideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> HeatreelResult<()> {
        if frame.dimensions() != self.frame_size {
            return Err(HeatreelError::sink(format!(
                "frame is {:?}, encoder expects {:?}",
                frame.dimensions(),
                self.frame_size
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| HeatreelError::sink("Encoder is already closed"))?;
        stdin.write_all(frame.as_raw()).map_err(|e| {
            HeatreelError::sink(format!("Writing frame {} to ffmpeg failed: {e}", self.frames))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> HeatreelResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Err(HeatreelError::sink("Encoder is already closed"));
        };
        let status = child
            .wait()
            .map_err(|e| HeatreelError::sink(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = self.stderr_output();
        if !status.success() {
            self.remove_output();
            return Err(HeatreelError::sink(format!(
                "ffmpeg encode failed (status {status}): {}",
                stderr.trim()
            )));
        }
        tracing::info!(output = %self.output.display(), frames = self.frames, "Video written");
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.stderr_output();
        self.remove_output();
    }

    fn output(&self) -> &Path {
        &self.output
    }
}

impl Drop for FfmpegVideoSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            tracing::warn!(output = %self.output.display(), "Encoder dropped before finish; discarding output");
            self.abort();
        }
    }
}

fn encoder_args(output: &Path, options: &VideoSinkOptions) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        format!("{}x{}", options.width, options.height),
        "-framerate".to_string(),
        format!("{}", options.fps),
        "-i".to_string(),
        "-".to_string(),
        // yuv420p needs even dimensions.
        "-vf".to_string(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        "-c:v".to_string(),
        options.codec.encoder().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.display().to_string(),
    ]
}

/// Writes numbered PNG stills into a directory.
pub struct ImageDirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
    created_dir: bool,
}

impl ImageDirectorySink {
    pub fn create(dir: &Path) -> HeatreelResult<Self> {
        let created_dir = !dir.exists();
        std::fs::create_dir_all(dir)?;
        tracing::info!(dir = %dir.display(), "Writing frames as still images");
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
            created_dir,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:05}.png"))
    }
}

impl VideoSink for ImageDirectorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> HeatreelResult<()> {
        let path = self.frame_path(self.written.len());
        frame
            .save(&path)
            .map_err(|e| HeatreelError::sink(format!("Writing {} failed: {e}", path.display())))?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> HeatreelResult<()> {
        tracing::info!(dir = %self.dir.display(), frames = self.written.len(), "Frames written");
        Ok(())
    }

    fn abort(&mut self) {
        for path in self.written.drain(..) {
            let _ = std::fs::remove_file(path);
        }
        if self.created_dir {
            let _ = std::fs::remove_dir(&self.dir);
        }
    }

    fn output(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn stills_are_numbered_in_order() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("frames");
        let mut sink = ImageDirectorySink::create(&dir).unwrap();
        for i in 0..3u8 {
            sink.write_frame(&RgbImage::from_pixel(4, 4, Rgb([i * 50, 0, 0])))
                .unwrap();
        }
        sink.finish().unwrap();

        let second = image::open(dir.join("frame_00001.png")).unwrap().to_rgb8();
        assert_eq!(*second.get_pixel(0, 0), Rgb([50, 0, 0]));
        assert!(dir.join("frame_00002.png").exists());
        assert!(!dir.join("frame_00003.png").exists());
    }

    #[test]
    fn abort_removes_written_stills() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("frames");
        let mut sink = ImageDirectorySink::create(&dir).unwrap();
        sink.write_frame(&RgbImage::new(2, 2)).unwrap();
        sink.abort();
        assert!(!dir.exists());
    }

    #[test]
    fn encoder_arguments_name_codec_and_rate() {
        let args = encoder_args(
            Path::new("out.mp4"),
            &VideoSinkOptions {
                ffmpeg_binary: "ffmpeg".into(),
                width: 641,
                height: 480,
                fps: 2.5,
                codec: VideoCodec::Mpeg4,
            },
        );
        let joined = args.join(" ");
        assert!(joined.contains("-s 641x480"));
        assert!(joined.contains("-framerate 2.5"));
        assert!(joined.contains("-c:v mpeg4"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }
}
