// src/scheduler/frame.rs
//! Frames of one fill action and the table that orders them.

use std::collections::HashSet;
use std::sync::Arc;

use crate::raster::Pixel;

/// One ordered unit of computed-then-painted fill progress.
#[derive(Debug, Default)]
pub struct Frame {
    pub index: usize,
    /// Unique wavefront pixels, in discovery order.
    shore: Vec<Pixel>,
    shore_members: HashSet<Pixel>,
    /// Snapshot of `shore` handed to workers; rebuilt when the shore grows.
    shared_shore: Option<Arc<[Pixel]>>,
    /// Union of every worker's filled output for this frame.
    filled: Vec<Pixel>,
    filled_members: HashSet<Pixel>,
    /// Shore pixels whose expansion has been reported back.
    pub worked: usize,
    /// Shore pixels handed out to workers so far.
    pub next_idle: usize,
    pub computed: bool,
}

impl Frame {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn shore(&self) -> &[Pixel] {
        &self.shore
    }

    pub fn shore_len(&self) -> usize {
        self.shore.len()
    }

    pub fn filled(&self) -> &[Pixel] {
        &self.filled
    }

    /// Append shore pixels not already present. Returns how many were new.
    pub fn extend_shore(&mut self, pixels: impl IntoIterator<Item = Pixel>) -> usize {
        let before = self.shore.len();
        for pixel in pixels {
            if self.shore_members.insert(pixel) {
                self.shore.push(pixel);
            }
        }
        let added = self.shore.len() - before;
        if added > 0 {
            self.shared_shore = None;
        }
        added
    }

    /// Set-union `pixels` into the filled set.
    pub fn merge_filled(&mut self, pixels: impl IntoIterator<Item = Pixel>) {
        for pixel in pixels {
            if self.filled_members.insert(pixel) {
                self.filled.push(pixel);
            }
        }
    }

    /// The full shore as a cheaply clonable snapshot.
    pub fn shared_shore(&mut self) -> Arc<[Pixel]> {
        match &self.shared_shore {
            Some(shared) => Arc::clone(shared),
            None => {
                let shared: Arc<[Pixel]> = Arc::from(self.shore.as_slice());
                self.shared_shore = Some(Arc::clone(&shared));
                shared
            }
        }
    }

    /// Shore pixels not yet handed to any worker.
    pub fn has_unassigned(&self) -> bool {
        self.next_idle < self.shore.len()
    }

    /// Every shore pixel has been expanded and reported back.
    pub fn is_worked(&self) -> bool {
        self.worked == self.shore.len()
    }

    /// Drop the working sets once painted; returns the shore and filled pixels.
    pub fn take_working_sets(&mut self) -> (Vec<Pixel>, Vec<Pixel>) {
        self.shore_members = HashSet::new();
        self.filled_members = HashSet::new();
        self.shared_shore = None;
        (std::mem::take(&mut self.shore), std::mem::take(&mut self.filled))
    }
}

/// Append-only table of the frames of one fill action.
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Vec<Frame>,
    /// Every pixel merged as filled so far in this fill action.
    merged_filled: HashSet<Pixel>,
}

impl FrameTable {
    /// Table whose first frame has `seed` as its only shore pixel.
    pub fn seeded(seed: Pixel) -> Self {
        let mut frame = Frame::new(0);
        frame.extend_shore([seed]);
        Self {
            frames: vec![frame],
            merged_filled: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Create frames up to and including `index`.
    pub fn ensure(&mut self, index: usize) -> &mut Frame {
        while self.frames.len() <= index {
            let next = self.frames.len();
            self.frames.push(Frame::new(next));
        }
        &mut self.frames[index]
    }

    /// First frame at or after `from` with shore pixels not yet assigned.
    pub fn first_idle(&self, from: usize) -> Option<usize> {
        self.frames
            .iter()
            .skip(from)
            .find(|frame| frame.has_unassigned())
            .map(|frame| frame.index)
    }

    /// Merge a worker result for `frame_index`: filled pixels into that frame,
    /// edge candidates into the next frame's shore.
    ///
    /// Edge candidates already merged as filled are dropped; the worker that
    /// filled them has already expanded their neighbourhood.
    pub fn merge(&mut self, frame_index: usize, worked: usize, filled: Vec<Pixel>, edge: Vec<Pixel>) {
        self.ensure(frame_index + 1);
        self.merged_filled.extend(filled.iter().copied());
        let frame = &mut self.frames[frame_index];
        frame.worked += worked;
        frame.merge_filled(filled);

        let merged_filled = &self.merged_filled;
        let fresh: Vec<Pixel> = edge
            .into_iter()
            .filter(|pixel| !merged_filled.contains(pixel))
            .collect();
        self.frames[frame_index + 1].extend_shore(fresh);
    }

    /// Frame `index` is complete and every earlier frame has been painted.
    pub fn is_ready(&self, index: usize) -> bool {
        let Some(frame) = self.frames.get(index) else {
            return false;
        };
        let previous_painted = index == 0 || self.frames[index - 1].computed;
        frame.is_worked() && previous_painted && !frame.computed
    }
}
