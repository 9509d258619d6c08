//! Heatreel Render Engine
//!
//! Turns a loaded scene into an ordered sequence of composed frames and
//! hands them to a sink.
//!
//! # Pipeline Architecture
//!
//! ```text
//! sensor CSVs ──► TimelineResampler ──► one row per second
//!                                              │
//! shapes.json ──► region masks (once) ─────────┤
//!                                              ├── FrameCompositor ──► VideoSink
//! camera files ──► CameraFrameSource ──────────┤        │               │
//!                                              │        │               ▼
//! events.txt ──► caption window ───────────────┘        │        output.mp4 or
//!                                                       │        frame_NNNNN.png
//!                              colorbar / readout / bar chart panels
//! ```

pub mod camera;
pub mod compositor;
pub mod export;
pub mod layout;
pub mod panels;
pub mod sink;
pub mod text;

pub use export::*;
