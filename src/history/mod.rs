// src/history/mod.rs
//! HistoryManager - records completed fills as replayable, undoable entries.
//!
//! Recording compacts the painted frames so every pixel appears in exactly one
//! frame of an entry. The history is a linear undo stack: recording while the
//! cursor is behind the newest entry discards the redo branch.
//!
//! Overwrite detection marks entries whose pixels were later repainted by a
//! newer entry.

use std::collections::HashSet;

use log::*;

use crate::color::Rgba;
use crate::error::{FillError, FillResult};
use crate::raster::Pixel;

/// Shore and filled pixels of one painted frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedFrame {
    pub shore: Vec<Pixel>,
    pub filled: Vec<Pixel>,
}

/// The compacted record of one fill action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seed: Pixel,
    pub frames: Vec<RecordedFrame>,
    pub total_filled: usize,
    pub fill: Rgba,
    /// Blank color configured when the fill ran; painted back on undo.
    pub blank: Rgba,
    /// Newer entry that repainted this one, set by overwrite detection.
    overwritten_by: Option<usize>,
}

impl HistoryEntry {
    pub fn first_filled(&self) -> Option<Pixel> {
        self.frames
            .iter()
            .find_map(|frame| frame.filled.first().copied())
    }

    pub fn filled_pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.frames.iter().flat_map(|frame| frame.filled.iter().copied())
    }

    pub fn contains(&self, pixel: Pixel) -> bool {
        self.frames.iter().any(|frame| frame.filled.contains(&pixel))
    }

    pub fn overwritten_by(&self) -> Option<usize> {
        self.overwritten_by
    }
}

/// Drop every filled pixel already seen in an earlier frame, then drop frames
/// left empty. Returns the kept frames and the number of unique pixels.
pub fn compact(frames: Vec<RecordedFrame>) -> (Vec<RecordedFrame>, usize) {
    let mut seen = HashSet::new();
    let mut total = 0;
    let kept: Vec<RecordedFrame> = frames
        .into_iter()
        .filter_map(|frame| {
            let filled: Vec<Pixel> = frame
                .filled
                .into_iter()
                .filter(|pixel| seen.insert(*pixel))
                .collect();
            if filled.is_empty() {
                return None;
            }
            total += filled.len();
            Some(RecordedFrame {
                shore: frame.shore,
                filled,
            })
        })
        .collect();
    (kept, total)
}

/// Linear list of entries plus a cursor at the entry the raster reflects.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Index of the newest entry currently applied, `None` before the first.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Option<usize>) {
        debug_assert!(cursor.map_or(true, |c| c < self.entries.len()));
        self.cursor = cursor;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.redo_index().is_some()
    }

    /// Entry a redo would replay.
    pub fn redo_index(&self) -> Option<usize> {
        let next = self.cursor.map_or(0, |c| c + 1);
        (next < self.entries.len()).then_some(next)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Compact a finished fill and store it after the cursor, discarding any
    /// entries beyond the cursor. Returns the new entry's index, or `None` when
    /// compaction left nothing to record.
    pub fn record(
        &mut self,
        seed: Pixel,
        frames: Vec<RecordedFrame>,
        fill: Rgba,
        blank: Rgba,
    ) -> Option<usize> {
        let (frames, total_filled) = compact(frames);
        if frames.is_empty() {
            debug!("History: fill from {:?} painted nothing, not recorded", seed);
            return None;
        }

        let keep = self.cursor.map_or(0, |c| c + 1);
        if keep < self.entries.len() {
            debug!(
                "History: discarding {} entries after cursor",
                self.entries.len() - keep
            );
            self.entries.truncate(keep);
        }
        self.entries.push(HistoryEntry {
            seed,
            frames,
            total_filled,
            fill,
            blank,
            overwritten_by: None,
        });
        let index = self.entries.len() - 1;
        self.cursor = Some(index);
        info!(
            "History: recorded entry {} ({} frames, {} pixels)",
            index,
            self.entries[index].frames.len(),
            total_filled
        );
        Some(index)
    }

    /// Reject `start..=end` unless both ends name existing entries in order.
    pub fn check_range(&self, start: usize, end: usize) -> FillResult<()> {
        if end < start || end >= self.entries.len() {
            return Err(FillError::InvalidRange {
                start,
                end,
                len: self.entries.len(),
            });
        }
        Ok(())
    }

    /// Recompute overwrite marks over the whole history.
    pub fn detect_overwrites(&mut self) -> usize {
        match self.entries.len() {
            0 => 0,
            len => self.detect_overwrites_within(0, len - 1),
        }
    }

    /// Recompute overwrite marks, considering only entries in `start..=end`.
    ///
    /// Entries are scanned newest to oldest. An unmarked entry samples its
    /// first filled pixel; every older unmarked entry that filled the same
    /// pixel is marked as overwritten by it. An entry is marked at most once,
    /// so in a chain of overwrites only the first overwriter found claims it.
    /// Marks outside the range are cleared. Returns the number of entries
    /// marked.
    pub fn detect_overwrites_within(&mut self, start: usize, end: usize) -> usize {
        for entry in &mut self.entries {
            entry.overwritten_by = None;
        }
        let end = end.min(self.entries.len().saturating_sub(1));
        if self.entries.is_empty() || start > end {
            return 0;
        }

        let mut marked = 0;
        for h in (start..=end).rev() {
            if self.entries[h].overwritten_by.is_some() {
                continue;
            }
            let Some(sample) = self.entries[h].first_filled() else {
                continue;
            };
            for i in start..h {
                let entry = &mut self.entries[i];
                if entry.overwritten_by.is_some() || !entry.contains(sample) {
                    continue;
                }
                entry.overwritten_by = Some(h);
                marked += 1;
                trace!("History: entry {} overwritten by entry {}", i, h);
            }
        }
        debug!(
            "History: {} of entries {}..={} overwritten",
            marked, start, end
        );
        marked
    }
}
