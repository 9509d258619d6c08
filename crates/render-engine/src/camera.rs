//! Auxiliary camera footage.
//!
//! A [`CameraFrameSource`] hands the render loop one frame per call, in
//! source order, and `None` forever once the footage ends. Decoding sits
//! behind [`FrameDecoder`]; [`QueuedCameraSource`] moves it onto a producer
//! thread with a bounded queue so decoding overlaps composition.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use heatreel_common::config::DecodeDefaults;
use heatreel_common::error::{HeatreelError, HeatreelResult};
use image::RgbImage;

/// Produces decoded frames in order. `Ok(None)` marks the end of the stream.
pub trait FrameDecoder: Send {
    fn decode_next(&mut self) -> HeatreelResult<Option<RgbImage>>;
}

/// Pull-based frame access for the render loop.
pub trait CameraFrameSource {
    /// Next frame, or `None` once the source has ended. Never yields a frame
    /// after the first `None`.
    fn next_frame(&mut self) -> Option<RgbImage>;

    /// Name used in logs and the render report.
    fn label(&self) -> &str;
}

/// Decodes raw `rgb24` frames from an `ffmpeg` child process.
pub struct FfmpegDecoder {
    path: PathBuf,
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl FfmpegDecoder {
    /// Probe the stream size and start decoding.
    pub fn open(path: &Path, decode: &DecodeDefaults) -> HeatreelResult<Self> {
        if !command_exists(&decode.ffmpeg_binary) {
            return Err(HeatreelError::unsupported(format!(
                "`{}` not found in PATH; it is required to decode camera footage",
                decode.ffmpeg_binary
            )));
        }
        let (width, height) = probe_video_dimensions(&decode.ffprobe_binary, path)
            .ok_or_else(|| {
                HeatreelError::decode(format!(
                    "Could not read video dimensions of {}",
                    path.display()
                ))
            })?;

        let mut child = Command::new(&decode.ffmpeg_binary)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HeatreelError::decode(format!("Failed to start ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HeatreelError::decode("Failed to capture ffmpeg stdout"))?;

        tracing::debug!(
            source = %path.display(),
            width,
            height,
            pid = child.id(),
            "Camera decoder started"
        );

        Ok(Self {
            path: path.to_path_buf(),
            child,
            stdout,
            width,
            height,
            buffer: vec![0; width as usize * height as usize * 3],
        })
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn decode_next(&mut self) -> HeatreelResult<Option<RgbImage>> {
        match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(HeatreelError::decode(format!(
                    "Reading frames from {} failed: {e}",
                    self.path.display()
                )))
            }
        }
        RgbImage::from_raw(self.width, self.height, self.buffer.clone())
            .map(Some)
            .ok_or_else(|| HeatreelError::decode("Decoded frame has the wrong size"))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// In-memory frames, played back once.
#[derive(Debug, Clone, Default)]
pub struct ImageSequenceDecoder {
    frames: VecDeque<RgbImage>,
}

impl ImageSequenceDecoder {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameDecoder for ImageSequenceDecoder {
    fn decode_next(&mut self) -> HeatreelResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Decodes on the render thread.
pub struct SyncCameraSource {
    label: String,
    decoder: Box<dyn FrameDecoder>,
    finished: bool,
}

impl SyncCameraSource {
    pub fn new(label: impl Into<String>, decoder: Box<dyn FrameDecoder>) -> Self {
        Self {
            label: label.into(),
            decoder,
            finished: false,
        }
    }
}

impl CameraFrameSource for SyncCameraSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.finished {
            return None;
        }
        match self.decoder.decode_next() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                tracing::info!(source = %self.label, "Camera source ended");
                self.finished = true;
                None
            }
            Err(e) => {
                tracing::warn!(source = %self.label, error = %e, "Camera decode failed; treating as end of stream");
                self.finished = true;
                None
            }
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

enum QueueItem {
    Frame(RgbImage),
    End,
}

/// Decodes on a producer thread into a bounded queue. The producer blocks
/// when the queue is full.
pub struct QueuedCameraSource {
    label: String,
    receiver: Option<Receiver<QueueItem>>,
    producer: Option<JoinHandle<()>>,
    poll_interval: Duration,
    finished: bool,
}

impl QueuedCameraSource {
    pub fn spawn(
        label: impl Into<String>,
        mut decoder: Box<dyn FrameDecoder>,
        capacity: usize,
        poll_interval: Duration,
    ) -> HeatreelResult<Self> {
        let label = label.into();
        let (tx, rx) = sync_channel(capacity.max(1));

        let thread_label = label.clone();
        let producer = std::thread::Builder::new()
            .name(format!("camera-{label}"))
            .spawn(move || {
                let mut frames = 0u64;
                loop {
                    let item = match decoder.decode_next() {
                        Ok(Some(frame)) => QueueItem::Frame(frame),
                        Ok(None) => QueueItem::End,
                        Err(e) => {
                            tracing::warn!(
                                source = %thread_label,
                                error = %e,
                                "Camera decode failed; treating as end of stream"
                            );
                            QueueItem::End
                        }
                    };
                    let end = matches!(item, QueueItem::End);
                    if tx.send(item).is_err() || end {
                        break;
                    }
                    frames += 1;
                }
                tracing::debug!(source = %thread_label, frames, "Camera producer finished");
            })
            .map_err(|e| HeatreelError::decode(format!("Failed to start camera thread: {e}")))?;

        Ok(Self {
            label,
            receiver: Some(rx),
            producer: Some(producer),
            poll_interval,
            finished: false,
        })
    }
}

impl CameraFrameSource for QueuedCameraSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.finished {
            return None;
        }
        let receiver = self.receiver.as_ref()?;
        loop {
            match receiver.recv_timeout(self.poll_interval) {
                Ok(QueueItem::Frame(frame)) => return Some(frame),
                Ok(QueueItem::End) | Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!(source = %self.label, "Camera source ended");
                    self.finished = true;
                    return None;
                }
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for QueuedCameraSource {
    fn drop(&mut self) {
        // Disconnect first so a producer blocked on a full queue wakes up.
        drop(self.receiver.take());
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                tracing::warn!(source = %self.label, "Camera producer panicked");
            }
        }
    }
}

/// Open one source per camera file, queued or synchronous per `decode`.
///
/// A file that cannot be opened for decoding still gets a source, one that
/// has already ended, so its panel shows the placeholder from the first frame.
pub fn open_camera_sources(
    paths: &[PathBuf],
    decode: &DecodeDefaults,
) -> HeatreelResult<Vec<Box<dyn CameraFrameSource>>> {
    paths
        .iter()
        .map(|path| -> HeatreelResult<Box<dyn CameraFrameSource>> {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let decoder = match FfmpegDecoder::open(path, decode) {
                Ok(decoder) => Box::new(decoder),
                Err(e) => {
                    tracing::warn!(
                        source = %label,
                        error = %e,
                        "Cannot decode camera footage; showing placeholder"
                    );
                    let ended = ImageSequenceDecoder::default();
                    return Ok(Box::new(SyncCameraSource::new(label, Box::new(ended))));
                }
            };
            if decode.prefetch {
                Ok(Box::new(QueuedCameraSource::spawn(
                    label,
                    decoder,
                    decode.queue_capacity,
                    Duration::from_millis(decode.poll_interval_ms),
                )?))
            } else {
                Ok(Box::new(SyncCameraSource::new(label, decoder)))
            }
        })
        .collect()
}

pub(crate) fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn probe_video_dimensions(ffprobe: &str, path: &Path) -> Option<(u32, u32)> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let (w, h) = raw.lines().next()?.trim().split_once('x')?;
    let width = w.parse::<u32>().ok()?;
    let height = h.parse::<u32>().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn frames(n: u8) -> Vec<RgbImage> {
        (0..n).map(|i| RgbImage::from_pixel(2, 2, Rgb([i, 0, 0]))).collect()
    }

    struct FailingDecoder {
        remaining: u8,
    }

    impl FrameDecoder for FailingDecoder {
        fn decode_next(&mut self) -> HeatreelResult<Option<RgbImage>> {
            if self.remaining == 0 {
                return Err(HeatreelError::decode("corrupt packet"));
            }
            self.remaining -= 1;
            Ok(Some(RgbImage::new(1, 1)))
        }
    }

    #[test]
    fn sync_source_is_terminal_after_end() {
        let mut source = SyncCameraSource::new("cam", Box::new(ImageSequenceDecoder::new(frames(2))));
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_none());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn queued_source_preserves_order() {
        let decoder = Box::new(ImageSequenceDecoder::new(frames(20)));
        let mut source =
            QueuedCameraSource::spawn("cam", decoder, 3, Duration::from_millis(5)).unwrap();
        for i in 0..20u8 {
            let frame = source.next_frame().expect("frame");
            assert_eq!(frame.get_pixel(0, 0).0[0], i);
        }
        assert!(source.next_frame().is_none());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn decode_error_ends_the_stream() {
        let mut sync = SyncCameraSource::new("a", Box::new(FailingDecoder { remaining: 2 }));
        assert!(sync.next_frame().is_some());
        assert!(sync.next_frame().is_some());
        assert!(sync.next_frame().is_none());

        let mut queued = QueuedCameraSource::spawn(
            "b",
            Box::new(FailingDecoder { remaining: 1 }),
            4,
            Duration::from_millis(5),
        )
        .unwrap();
        assert!(queued.next_frame().is_some());
        assert!(queued.next_frame().is_none());
    }

    /// Yields blank frames forever and counts how often it was asked.
    struct CountingDecoder {
        pulls: Arc<AtomicUsize>,
    }

    impl FrameDecoder for CountingDecoder {
        fn decode_next(&mut self) -> HeatreelResult<Option<RgbImage>> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(RgbImage::new(1, 1)))
        }
    }

    #[test]
    fn full_queue_blocks_the_producer() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let decoder = Box::new(CountingDecoder {
            pulls: pulls.clone(),
        });
        let source = QueuedCameraSource::spawn("cam", decoder, 2, Duration::from_millis(5)).unwrap();

        std::thread::sleep(Duration::from_millis(200));
        let pulled = pulls.load(Ordering::SeqCst);
        assert!(pulled >= 2, "producer never filled the queue: {pulled}");
        // Two queued frames plus one held by the blocked send.
        assert!(pulled <= 3, "producer ran ahead of a full queue: {pulled}");

        drop(source);
        assert!(pulls.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn unopenable_footage_yields_an_ended_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam.mp4");
        std::fs::write(&path, b"not a video").unwrap();
        let decode = DecodeDefaults {
            ffmpeg_binary: "true".to_string(),
            ffprobe_binary: "false".to_string(),
            ..DecodeDefaults::default()
        };

        let mut sources = open_camera_sources(&[path], &decode).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].label(), "cam.mp4");
        assert!(sources[0].next_frame().is_none());
        assert!(sources[0].next_frame().is_none());
    }

    #[test]
    fn dropping_a_full_queue_joins_the_producer() {
        let decoder = Box::new(ImageSequenceDecoder::new(frames(50)));
        let mut source =
            QueuedCameraSource::spawn("cam", decoder, 2, Duration::from_millis(5)).unwrap();
        assert!(source.next_frame().is_some());
        drop(source);
    }
}
