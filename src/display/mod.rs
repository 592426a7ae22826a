// src/display/mod.rs
//! Display surface seam.
//!
//! The session never binds a window or canvas itself. After every painted
//! frame it hands the raster and the frame's damaged pixels to a [`Surface`],
//! which may blit, encode, or just count what it is given.

pub mod headless;

pub use headless::HeadlessSurface;

use crate::raster::{Pixel, RasterBuffer};

/// Receiver of painted frames.
pub trait Surface {
    /// Show `raster`. `damage` lists the pixels changed since the last call.
    ///
    /// Returning an error aborts the running fill or playback; pixels already
    /// written to the raster stay written.
    fn present(&mut self, raster: &RasterBuffer, damage: &[Pixel]) -> anyhow::Result<()>;
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn present(&mut self, raster: &RasterBuffer, damage: &[Pixel]) -> anyhow::Result<()> {
        (**self).present(raster, damage)
    }
}
