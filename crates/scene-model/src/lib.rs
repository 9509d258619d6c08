//! Heatreel Scene Model
//!
//! Defines the data contracts consumed by the render pipeline:
//! - **Regions:** Named overlay areas with rectangle, circle, or polygon geometry
//! - **Sensors:** Per-region `(second, value)` streams loaded from CSV
//! - **Events:** Sparse second → caption annotations
//! - **Config:** The immutable [`RenderConfig`] shared by every component
//! - **Scene:** A manifest tying all of the above to files on disk
//!
//! Region coordinates are pixels of the width-resized background image.

pub mod config;
pub mod event;
pub mod region;
pub mod scene;
pub mod sensor;

pub use config::*;
pub use event::*;
pub use region::*;
pub use scene::*;
pub use sensor::*;
