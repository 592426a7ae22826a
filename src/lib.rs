// src/lib.rs
//! Animated, radius-bounded flood fill.
//!
//! A [`WaveSession`] owns a raster and fills blank regions from a seed pixel as
//! a wave that grows by at most `radius` pixels per animation frame. Expansion
//! runs on a pool of worker threads; finished fills are recorded in a history
//! that can be undone, redone and replayed.

pub mod color;
pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod player;
pub mod raster;
pub mod scheduler;
pub mod session;
pub mod wave;

pub use color::{ColorMatcher, Rgba};
pub use config::FillConfig;
pub use display::{HeadlessSurface, Surface};
pub use error::{FillError, FillResult};
pub use history::{History, HistoryEntry};
pub use player::PlayRequest;
pub use raster::{Pixel, RasterBuffer};
pub use session::{Completion, SessionStatus, WaveSession};
