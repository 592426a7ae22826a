// src/scheduler/mod.rs
//! FrameScheduler - turns worker results into strictly ordered, paced frames.
//!
//! One scheduler drives one fill action. Each tick it checks whether the
//! current frame is fully worked and its predecessor painted, waits out the
//! frame budget, then paints the frame into the raster and moves on. The fill
//! ends when the frame after the one just painted has an empty shore.

pub mod frame;
pub mod pacer;

use std::time::{Duration, Instant};

use log::*;

use crate::color::Rgba;
use crate::display::Surface;
use crate::error::{FillError, FillResult};
use crate::history::RecordedFrame;
use crate::raster::{Pixel, RasterBuffer};
use crate::wave::messages::WorkerResponse;
use crate::wave::pool::WorkerPool;

use frame::FrameTable;
use pacer::Pacer;

/// Outcome of one scheduler tick.
#[derive(Debug)]
pub enum SchedulerStatus {
    /// Still computing or waiting on the frame budget.
    Pending,
    /// Last frame painted.
    Finished(FillSummary),
}

/// What a completed fill action painted.
#[derive(Debug, Clone)]
pub struct FillSummary {
    pub seed: Pixel,
    pub fill: Rgba,
    pub frames_painted: usize,
    pub pixels_painted: usize,
    pub elapsed: Duration,
    /// Painted frames in order, kept only when recording.
    pub recorded: Vec<RecordedFrame>,
}

pub struct FrameScheduler {
    seed: Pixel,
    frames: FrameTable,
    current: usize,
    pacer: Pacer,
    fill: Rgba,
    compute_ahead: bool,
    record: bool,
    recorded: Vec<RecordedFrame>,
    started: Instant,
    pixels_painted: usize,
}

impl FrameScheduler {
    /// Create frame 0 with `seed` as its shore and hand it to the pool.
    ///
    /// The pool must already be initialized for this operation's epoch.
    pub fn start(
        seed: Pixel,
        fill: Rgba,
        fps: u32,
        compute_ahead: bool,
        record: bool,
        pool: &mut WorkerPool,
        now: Instant,
    ) -> FillResult<Self> {
        let mut scheduler = Self {
            seed,
            frames: FrameTable::seeded(seed),
            current: 0,
            pacer: Pacer::new(fps, now),
            fill,
            compute_ahead,
            record,
            recorded: Vec::new(),
            started: now,
            pixels_painted: 0,
        };
        pool.assign_work(&mut scheduler.frames, 0)?;
        debug!("FrameScheduler: fill from {:?} started", seed);
        Ok(scheduler)
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Time until the current frame's budget runs out, if it is still running.
    pub fn time_to_due(&self, now: Instant) -> Option<Duration> {
        self.pacer.remaining(now)
    }

    /// Feed one worker response into the frame table.
    pub fn on_response(&mut self, response: WorkerResponse, pool: &mut WorkerPool) -> FillResult<()> {
        pool.handle_response(response, &mut self.frames, self.current, self.compute_ahead)
    }

    /// Paint the current frame if it is ready and due.
    pub fn tick(
        &mut self,
        now: Instant,
        pool: &mut WorkerPool,
        raster: &mut RasterBuffer,
        surface: &mut dyn Surface,
    ) -> FillResult<SchedulerStatus> {
        if !self.frames.is_ready(self.current) || !self.pacer.is_due(now) {
            return Ok(SchedulerStatus::Pending);
        }

        self.paint_current(raster, surface)?;
        self.current += 1;

        let next_has_shore = self
            .frames
            .get(self.current)
            .is_some_and(|frame| frame.shore_len() > 0);
        if !next_has_shore {
            return Ok(SchedulerStatus::Finished(self.finish(now)));
        }

        self.pacer.frame_painted(now);
        pool.assign_work(&mut self.frames, self.current)?;
        Ok(SchedulerStatus::Pending)
    }

    fn paint_current(&mut self, raster: &mut RasterBuffer, surface: &mut dyn Surface) -> FillResult<()> {
        let index = self.current;
        let Some(frame) = self.frames.get_mut(index) else {
            return Ok(());
        };
        let (shore, filled) = frame.take_working_sets();
        frame.computed = true;

        raster.paint(&filled, self.fill);
        self.pixels_painted += filled.len();
        trace!(
            "FrameScheduler: painted frame {} ({} shore, {} filled)",
            index,
            shore.len(),
            filled.len()
        );
        surface.present(raster, &filled).map_err(FillError::Surface)?;

        if self.record {
            self.recorded.push(RecordedFrame { shore, filled });
        }
        Ok(())
    }

    fn finish(&mut self, now: Instant) -> FillSummary {
        let elapsed = now.saturating_duration_since(self.started);
        let frames_painted = self.current;
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { frames_painted as f64 / secs } else { 0.0 };
        info!(
            "FrameScheduler: done in {} ms @ {:.2} fps ({} frames, {} pixels)",
            elapsed.as_millis(),
            rate,
            frames_painted,
            self.pixels_painted
        );
        FillSummary {
            seed: self.seed,
            fill: self.fill,
            frames_painted,
            pixels_painted: self.pixels_painted,
            elapsed,
            recorded: std::mem::take(&mut self.recorded),
        }
    }
}
