// src/color.rs

//! Defines the RGBA color type and the per-channel tolerance test that decides
//! whether a pixel counts as blank.

use serde::{Deserialize, Serialize};

/// A straight (non-premultiplied) RGBA color, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 4]", into = "[u8; 4]")]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba([r, g, b, a])
    }

    /// Largest absolute difference over the four channels.
    pub fn max_channel_delta(&self, other: &Rgba) -> u8 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0)
    }
}

impl From<[u8; 4]> for Rgba {
    fn from(channels: [u8; 4]) -> Self {
        Rgba(channels)
    }
}

impl From<Rgba> for [u8; 4] {
    fn from(color: Rgba) -> Self {
        color.0
    }
}

/// Blank-pixel predicate: a color matches when every channel lies within
/// `threshold` of the reference color. Threshold 0 is exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMatcher {
    pub reference: Rgba,
    pub threshold: u8,
}

impl ColorMatcher {
    pub fn new(reference: Rgba, threshold: u8) -> Self {
        Self {
            reference,
            threshold,
        }
    }

    #[inline]
    pub fn matches(&self, color: Rgba) -> bool {
        self.reference.max_channel_delta(&color) <= self.threshold
    }

    /// Same test against a raw 4-byte slice taken straight from a raster.
    #[inline]
    pub fn matches_bytes(&self, bytes: &[u8]) -> bool {
        bytes
            .iter()
            .zip(self.reference.0.iter())
            .all(|(c, r)| c.abs_diff(*r) <= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn zero_threshold_is_exact_equality() {
        let matcher = ColorMatcher::new(Rgba::new(10, 20, 30, 255), 0);
        assert!(matcher.matches(Rgba::new(10, 20, 30, 255)));
        assert!(!matcher.matches(Rgba::new(11, 20, 30, 255)));
        assert!(!matcher.matches(Rgba::new(10, 20, 30, 254)));
    }

    #[test_log::test]
    fn acceptance_grows_with_threshold() {
        let reference = Rgba::new(128, 128, 128, 255);
        let samples = [
            Rgba::new(128, 128, 128, 255),
            Rgba::new(130, 127, 128, 255),
            Rgba::new(140, 128, 100, 250),
            Rgba::new(0, 255, 128, 0),
        ];
        let mut previous = 0;
        for threshold in 0..=255u8 {
            let matcher = ColorMatcher::new(reference, threshold);
            let accepted = samples.iter().filter(|c| matcher.matches(**c)).count();
            assert!(accepted >= previous, "threshold {threshold} lost a match");
            previous = accepted;
        }
        assert_eq!(previous, samples.len());
    }

    #[test_log::test]
    fn byte_and_color_forms_agree() {
        let matcher = ColorMatcher::new(Rgba::WHITE, 20);
        for color in [Rgba::new(240, 250, 255, 255), Rgba::new(230, 255, 255, 255)] {
            assert_eq!(matcher.matches(color), matcher.matches_bytes(&color.0));
        }
    }

    #[test_log::test]
    fn deserializes_from_channel_array() {
        let color: Rgba = serde_json::from_str("[255, 0, 0, 50]").unwrap();
        assert_eq!(color, Rgba::new(255, 0, 0, 50));
    }
}
