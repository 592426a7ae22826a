// src/raster.rs

//! The RGBA raster the session paints into, and pixel coordinates on it.

use crate::color::{ColorMatcher, Rgba};
use crate::error::{FillError, FillResult};

pub const BYTES_PER_PIXEL: usize = 4;

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

impl Pixel {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance; avoids floating point in the radius test.
    #[inline]
    pub fn distance_sq(&self, other: &Pixel) -> u64 {
        let dx = self.x.abs_diff(other.x) as u64;
        let dy = self.y.abs_diff(other.y) as u64;
        dx * dx + dy * dy
    }

    /// The 4-connected neighbours that lie inside a `width` x `height` raster,
    /// in up/right/down/left order.
    pub fn neighbors(self, width: u32, height: u32) -> impl Iterator<Item = Pixel> {
        let Pixel { x, y } = self;
        let up = (y > 0).then(|| Pixel::new(x, y - 1));
        let right = (x + 1 < width).then(|| Pixel::new(x + 1, y));
        let down = (y + 1 < height).then(|| Pixel::new(x, y + 1));
        let left = (x > 0).then(|| Pixel::new(x - 1, y));
        [up, right, down, left].into_iter().flatten()
    }
}

/// Row-major RGBA8 byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap an existing RGBA8 buffer. Fails if the length does not match the
    /// dimensions.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> FillResult<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if width == 0 || height == 0 {
            return Err(FillError::invalid_config(format!(
                "raster dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if data.len() != expected {
            return Err(FillError::invalid_config(format!(
                "raster buffer holds {} bytes, {width}x{height} RGBA needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A raster filled with one color.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&color.0);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn contains(&self, pixel: Pixel) -> bool {
        pixel.x < self.width && pixel.y < self.height
    }

    /// Linear index of a pixel, for per-pixel side tables.
    #[inline]
    pub fn index_of(&self, pixel: Pixel) -> usize {
        pixel.y as usize * self.width as usize + pixel.x as usize
    }

    #[inline]
    fn offset(&self, pixel: Pixel) -> usize {
        self.index_of(pixel) * BYTES_PER_PIXEL
    }

    /// Color at `pixel`, or `None` outside the raster.
    pub fn get(&self, pixel: Pixel) -> Option<Rgba> {
        if !self.contains(pixel) {
            return None;
        }
        let start = self.offset(pixel);
        let mut channels = [0u8; BYTES_PER_PIXEL];
        channels.copy_from_slice(&self.data[start..start + BYTES_PER_PIXEL]);
        Some(Rgba(channels))
    }

    /// Whether `pixel` is inside the raster and matches the blank predicate.
    #[inline]
    pub fn is_blank(&self, pixel: Pixel, blank: &ColorMatcher) -> bool {
        if !self.contains(pixel) {
            return false;
        }
        let start = self.offset(pixel);
        blank.matches_bytes(&self.data[start..start + BYTES_PER_PIXEL])
    }

    /// Write `color` at `pixel`. Pixels outside the raster are ignored.
    #[inline]
    pub fn put(&mut self, pixel: Pixel, color: Rgba) {
        if !self.contains(pixel) {
            return;
        }
        let start = self.offset(pixel);
        self.data[start..start + BYTES_PER_PIXEL].copy_from_slice(&color.0);
    }

    /// Paint a batch of pixels with one color.
    pub fn paint(&mut self, pixels: &[Pixel], color: Rgba) {
        for pixel in pixels {
            self.put(*pixel, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn rejects_mismatched_buffer_length() {
        let err = RasterBuffer::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, FillError::InvalidConfig(_)));
    }

    #[test_log::test]
    fn neighbors_stay_inside_bounds() {
        let corner: Vec<_> = Pixel::new(0, 0).neighbors(3, 3).collect();
        assert_eq!(corner, vec![Pixel::new(1, 0), Pixel::new(0, 1)]);

        let far_corner: Vec<_> = Pixel::new(2, 2).neighbors(3, 3).collect();
        assert_eq!(far_corner, vec![Pixel::new(2, 1), Pixel::new(1, 2)]);

        assert_eq!(Pixel::new(1, 1).neighbors(3, 3).count(), 4);
    }

    #[test_log::test]
    fn put_and_get_round_trip_one_pixel() {
        let mut raster = RasterBuffer::filled(4, 3, Rgba::WHITE);
        let red = Rgba::new(255, 0, 0, 255);
        raster.put(Pixel::new(3, 2), red);
        assert_eq!(raster.get(Pixel::new(3, 2)), Some(red));
        assert_eq!(raster.get(Pixel::new(2, 2)), Some(Rgba::WHITE));
        assert_eq!(raster.get(Pixel::new(4, 0)), None);
        raster.put(Pixel::new(9, 9), red);
        assert_eq!(raster.as_bytes().len(), 4 * 3 * 4);
    }

    #[test_log::test]
    fn squared_distance() {
        assert_eq!(Pixel::new(1, 1).distance_sq(&Pixel::new(4, 5)), 25);
        assert_eq!(Pixel::new(4, 5).distance_sq(&Pixel::new(1, 1)), 25);
    }
}
