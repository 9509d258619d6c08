//! Heatreel Processing Core
//!
//! The data side of the render pipeline:
//! - **Timeline:** Align asynchronous sensor streams onto one row per second
//! - **Masks:** Rasterize region geometry once, recolor it every frame
//! - **Colormap:** Map sensor values (or their absence) to RGB
//! - **Geometry:** Route arrows from regions to their camera panels
//!
//! This crate performs no I/O. All inputs are data; all outputs are data.

pub mod colormap;
pub mod geometry;
pub mod masks;
pub mod timeline;

pub use colormap::{ColorMapper, Colormap, UnknownColormap};
pub use masks::{create_masks, merge, RegionMask, RegionMasks};
pub use timeline::{AlignedRow, AlignedTimeline, TimelineResampler};
