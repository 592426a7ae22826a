// src/config.rs

//! Defines the configuration structures for a wave-fill session.
//!
//! Every section derives `Deserialize` with `#[serde(default)]`, so a config
//! file only needs to name the values it changes. Defaults follow the values
//! the animation was tuned with: a 20 pixel wave at 60 fps over a white canvas.

use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::Context;

use crate::color::{ColorMatcher, Rgba};
use crate::error::{FillError, FillResult};

// --- Top-Level Configuration Structure ---

/// Complete configuration for a [`crate::session::WaveSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FillConfig {
    /// Wavefront geometry and blank tolerance.
    pub wave: WaveConfig,
    /// Blank, margin and fill colors.
    pub colors: ColorConfig,
    /// Worker pool sizing and slice loads.
    pub workers: WorkerConfig,
    /// Frame pacing.
    pub performance: PerformanceConfig,
    /// History recording.
    pub history: HistoryConfig,
}

impl FillConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: FillConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Blank predicate built from the blank color and threshold.
    pub fn blank_matcher(&self) -> ColorMatcher {
        ColorMatcher::new(self.colors.blank, self.wave.threshold)
    }

    /// Reject values the fill algorithm cannot run with.
    pub fn validate(&self) -> FillResult<()> {
        if self.wave.radius == 0 {
            return Err(FillError::invalid_config("wave radius must be at least 1"));
        }
        if self.workers.count == 0 {
            return Err(FillError::invalid_config("worker count must be at least 1"));
        }
        if self.workers.min_load == 0 {
            return Err(FillError::invalid_config("minimum worker load must be at least 1"));
        }
        if self.workers.max_load != 0 && self.workers.max_load < self.workers.min_load {
            log::warn!(
                "Config: max_load {} is below min_load {}; max_load wins",
                self.workers.max_load,
                self.workers.min_load
            );
        }
        for color in self.fill_colors() {
            self.check_fill_color(color)?;
        }
        Ok(())
    }

    /// Every color a fill may use: the palette when one is set, otherwise the
    /// single fill color.
    pub fn fill_colors(&self) -> Vec<Rgba> {
        if self.colors.palette.is_empty() {
            vec![self.colors.fill]
        } else {
            self.colors.palette.clone()
        }
    }

    /// Fill color for the `ordinal`-th fill of a session.
    pub fn fill_color_for(&self, ordinal: usize) -> Rgba {
        if self.colors.palette.is_empty() {
            self.colors.fill
        } else {
            self.colors.palette[ordinal % self.colors.palette.len()]
        }
    }

    /// A fill color that still matches blank would be re-filled forever, and one
    /// that matches the margin would erase the boundary it is meant to respect.
    pub fn check_fill_color(&self, fill: Rgba) -> FillResult<()> {
        let threshold = self.wave.threshold;
        for (name, other) in [("blank", self.colors.blank), ("margin", self.colors.margin)] {
            if ColorMatcher::new(other, threshold).matches(fill) {
                return Err(FillError::ColorConflict {
                    fill: fill.0,
                    against: name,
                    other: other.0,
                });
            }
        }
        Ok(())
    }
}

// --- Wave Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Wave thickness in pixels painted per frame.
    pub radius: u32,
    /// Maximum per-channel deviance for a pixel to count as blank.
    pub threshold: u8,
}

impl Default for WaveConfig {
    fn default() -> Self {
        WaveConfig {
            radius: 20,
            threshold: 20,
        }
    }
}

// --- Color Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Color considered blank (fillable).
    pub blank: Rgba,
    /// Boundary color; fill colors must stay distinguishable from it.
    pub margin: Rgba,
    /// Color painted over filled pixels.
    pub fill: Rgba,
    /// When non-empty, successive fills cycle through these colors instead of
    /// using `fill`.
    pub palette: Vec<Rgba>,
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            blank: Rgba::WHITE,
            margin: Rgba::BLACK,
            fill: Rgba::new(255, 0, 0, 50),
            palette: Vec::new(),
        }
    }
}

// --- Worker Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker threads.
    pub count: usize,
    /// Minimum number of shore pixels handed to one worker, if that many are
    /// available.
    pub min_load: usize,
    /// Maximum number of shore pixels handed to one worker (0 disables the cap).
    pub max_load: usize,
    /// Compute upcoming frames before the current one is painted. Faster, but
    /// the wave stops looking like an advancing circle on large areas.
    pub compute_ahead: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        WorkerConfig {
            count: (cores / 2).max(1),
            min_load: 100,
            max_load: 200,
            compute_ahead: false,
        }
    }
}

// --- Performance Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Frame limiter; 0 paints every frame as soon as it is computed.
    pub fps: u32,
    /// Period of the display tick used while waiting on workers, in milliseconds.
    pub refresh_interval_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            fps: 60,
            refresh_interval_ms: 16,
        }
    }
}

// --- History Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record completed fills for undo, redo and playback.
    pub record: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig { record: true }
    }
}
