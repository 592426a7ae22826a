// src/display/headless.rs
//! Headless surface: keeps statistics about presented frames, draws nothing.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::trace;

use crate::display::Surface;
use crate::raster::{Pixel, RasterBuffer};

/// Running totals of what a [`HeadlessSurface`] was shown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresentStats {
    pub presents: usize,
    pub damaged_pixels: usize,
    /// Damage size of every present, in order.
    pub damage_per_present: Vec<usize>,
}

/// Surface that records present calls. Clones share the same statistics, so a
/// caller can keep one clone while the session owns the other.
#[derive(Debug, Default, Clone)]
pub struct HeadlessSurface {
    stats: Arc<Mutex<PresentStats>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> PresentStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Surface for HeadlessSurface {
    fn present(&mut self, _raster: &RasterBuffer, damage: &[Pixel]) -> Result<()> {
        let mut stats = self
            .stats
            .lock()
            .map_err(|_| anyhow::anyhow!("headless surface statistics poisoned"))?;
        stats.presents += 1;
        stats.damaged_pixels += damage.len();
        stats.damage_per_present.push(damage.len());
        trace!("HeadlessSurface: present #{} ({} px)", stats.presents, damage.len());
        Ok(())
    }
}
