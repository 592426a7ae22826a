// src/wave/expander.rs
//! WaveExpander - expands one slice of the shore by one wavefront step.
//!
//! Runs inside a worker thread. Reads an immutable raster snapshot and the
//! worker's own claim mask; nothing here is shared between workers.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::color::ColorMatcher;
use crate::raster::{Pixel, RasterBuffer};

/// Pixels a single worker has already marked filled during the current fill.
///
/// Once claimed, a pixel is no longer blank from this worker's point of view,
/// so each worker claims any pixel at most once per fill.
#[derive(Debug, Clone)]
pub struct ClaimMask {
    width: u32,
    bits: Vec<bool>,
}

impl ClaimMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            bits: vec![false; width as usize * height as usize],
        }
    }

    #[inline]
    fn index(&self, pixel: Pixel) -> usize {
        pixel.y as usize * self.width as usize + pixel.x as usize
    }

    #[inline]
    pub fn is_claimed(&self, pixel: Pixel) -> bool {
        self.bits[self.index(pixel)]
    }

    #[inline]
    pub fn claim(&mut self, pixel: Pixel) {
        let idx = self.index(pixel);
        self.bits[idx] = true;
    }
}

/// Uniform grid over the full shore, bucketed by `radius`-sized cells, so the
/// radius test only visits the 3x3 cells around a candidate.
#[derive(Debug)]
pub struct ShoreIndex {
    cell: u32,
    radius_sq: u64,
    cells: HashMap<(u32, u32), Vec<Pixel>>,
}

impl ShoreIndex {
    pub fn new(shore: &[Pixel], radius: u32) -> Self {
        let cell = radius.max(1);
        let mut cells: HashMap<(u32, u32), Vec<Pixel>> = HashMap::new();
        for pixel in shore {
            cells
                .entry((pixel.x / cell, pixel.y / cell))
                .or_default()
                .push(*pixel);
        }
        Self {
            cell,
            radius_sq: radius as u64 * radius as u64,
            cells,
        }
    }

    /// Whether `pixel` lies within the radius of any shore pixel.
    pub fn within_radius(&self, pixel: Pixel) -> bool {
        let cx = pixel.x / self.cell;
        let cy = pixel.y / self.cell;
        for gy in cy.saturating_sub(1)..=cy.saturating_add(1) {
            for gx in cx.saturating_sub(1)..=cx.saturating_add(1) {
                let Some(bucket) = self.cells.get(&(gx, gy)) else {
                    continue;
                };
                if bucket
                    .iter()
                    .any(|shore| shore.distance_sq(&pixel) <= self.radius_sq)
                {
                    return true;
                }
            }
        }
        false
    }
}

/// Output of one expansion call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Pixels accepted this call, in discovery order.
    pub filled: Vec<Pixel>,
    /// Blank pixels found outside the radius; unique within this call.
    pub edge: Vec<Pixel>,
}

/// Stateless expansion parameters bound to one raster snapshot.
pub struct WaveExpander<'a> {
    snapshot: &'a RasterBuffer,
    blank: ColorMatcher,
    radius_sq: u64,
}

impl<'a> WaveExpander<'a> {
    pub fn new(snapshot: &'a RasterBuffer, blank: ColorMatcher, radius: u32) -> Self {
        Self {
            snapshot,
            blank,
            radius_sq: radius as u64 * radius as u64,
        }
    }

    /// Breadth-first expansion from every pixel of `slice`.
    ///
    /// A neighbour is filled when it is blank in the snapshot, unclaimed, and
    /// within the radius of some pixel of the full shore. Blank pixels outside
    /// the radius become edge candidates and are not expanded.
    pub fn expand(&self, slice: &[Pixel], shore: &ShoreIndex, claims: &mut ClaimMask) -> Expansion {
        let width = self.snapshot.width();
        let height = self.snapshot.height();
        let mut out = Expansion::default();
        let mut edge_seen = HashSet::new();
        let mut frontier = VecDeque::new();

        for &origin in slice {
            frontier.clear();
            frontier.push_back(origin);
            while let Some(current) = frontier.pop_front() {
                for neighbor in current.neighbors(width, height) {
                    if claims.is_claimed(neighbor) || !self.snapshot.is_blank(neighbor, &self.blank) {
                        continue;
                    }
                    let near = origin.distance_sq(&neighbor) <= self.radius_sq
                        || shore.within_radius(neighbor);
                    if near {
                        claims.claim(neighbor);
                        out.filled.push(neighbor);
                        frontier.push_back(neighbor);
                    } else if edge_seen.insert(neighbor) {
                        out.edge.push(neighbor);
                    }
                }
            }
        }

        // A pixel first seen outside one origin's radius may be filled later from
        // another origin in the same slice.
        out.edge.retain(|pixel| !claims.is_claimed(*pixel));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    fn blank() -> ColorMatcher {
        ColorMatcher::new(Rgba::WHITE, 0)
    }

    #[test_log::test]
    fn large_radius_fills_whole_region_in_one_call() {
        let raster = RasterBuffer::filled(10, 10, Rgba::WHITE);
        let shore = [Pixel::new(5, 5)];
        let index = ShoreIndex::new(&shore, 20);
        let mut claims = ClaimMask::new(10, 10);
        let out = WaveExpander::new(&raster, blank(), 20).expand(&shore, &index, &mut claims);
        assert_eq!(out.filled.len(), 100);
        assert!(out.edge.is_empty());
    }

    #[test_log::test]
    fn radius_one_fills_seed_and_ring_and_reports_next_ring() {
        let raster = RasterBuffer::filled(10, 10, Rgba::WHITE);
        let shore = [Pixel::new(5, 5)];
        let index = ShoreIndex::new(&shore, 1);
        let mut claims = ClaimMask::new(10, 10);
        let out = WaveExpander::new(&raster, blank(), 1).expand(&shore, &index, &mut claims);

        let filled: HashSet<_> = out.filled.iter().copied().collect();
        let expected: HashSet<_> = [(5, 5), (5, 4), (6, 5), (5, 6), (4, 5)]
            .into_iter()
            .map(|(x, y)| Pixel::new(x, y))
            .collect();
        assert_eq!(filled, expected);
        // Manhattan ring at distance two.
        assert_eq!(out.edge.len(), 8);
        assert!(out
            .edge
            .iter()
            .all(|p| p.x.abs_diff(5) + p.y.abs_diff(5) == 2));
    }

    #[test_log::test]
    fn walls_stop_the_wave() {
        let mut raster = RasterBuffer::filled(5, 5, Rgba::WHITE);
        for y in 0..5 {
            raster.put(Pixel::new(2, y), Rgba::BLACK);
        }
        let shore = [Pixel::new(0, 0)];
        let index = ShoreIndex::new(&shore, 50);
        let mut claims = ClaimMask::new(5, 5);
        let out = WaveExpander::new(&raster, blank(), 50).expand(&shore, &index, &mut claims);
        assert_eq!(out.filled.len(), 10);
        assert!(out.filled.iter().all(|p| p.x < 2));
    }

    #[test_log::test]
    fn claimed_pixels_are_not_filled_twice() {
        let raster = RasterBuffer::filled(4, 4, Rgba::WHITE);
        let shore = [Pixel::new(0, 0)];
        let index = ShoreIndex::new(&shore, 10);
        let mut claims = ClaimMask::new(4, 4);
        let expander = WaveExpander::new(&raster, blank(), 10);
        let first = expander.expand(&shore, &index, &mut claims);
        let second = expander.expand(&shore, &index, &mut claims);
        assert_eq!(first.filled.len(), 16);
        assert!(second.filled.is_empty());
        assert!(second.edge.is_empty());
    }

    #[test_log::test]
    fn radius_is_measured_against_the_full_shore() {
        let raster = RasterBuffer::filled(12, 1, Rgba::WHITE);
        // Expanding only (0,0), but (5,0) is also on the shore and pulls the
        // wave past the origin's own radius.
        let full = [Pixel::new(0, 0), Pixel::new(5, 0)];
        let index = ShoreIndex::new(&full, 2);
        let mut claims = ClaimMask::new(12, 1);
        let out = WaveExpander::new(&raster, blank(), 2).expand(&full[..1], &index, &mut claims);
        let mut xs: Vec<u32> = out.filled.iter().map(|p| p.x).collect();
        xs.sort_unstable();
        assert_eq!(xs, (0..=7).collect::<Vec<_>>());
        assert_eq!(out.edge, vec![Pixel::new(8, 0)]);
    }

    #[test_log::test]
    fn shore_index_matches_brute_force() {
        let shore: Vec<Pixel> = (0..40).map(|i| Pixel::new((i * 7) % 31, (i * 13) % 29)).collect();
        for radius in [1u32, 3, 8] {
            let index = ShoreIndex::new(&shore, radius);
            let r2 = radius as u64 * radius as u64;
            for y in 0..32 {
                for x in 0..32 {
                    let p = Pixel::new(x, y);
                    let brute = shore.iter().any(|s| s.distance_sq(&p) <= r2);
                    assert_eq!(index.within_radius(p), brute, "radius {radius} at {p:?}");
                }
            }
        }
    }
}
