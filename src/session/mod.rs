// src/session/mod.rs
//! WaveSession - the single-threaded orchestrator of one raster.
//!
//! The session owns the raster, the worker pool, the history and the display
//! surface. At most one operation (a fill, a playback or a worker
//! reconfiguration) runs at a time; starting another while one is active is
//! rejected with [`FillError::LockConflict`] and never queued.
//!
//! Every operation has a non-blocking `begin_*` form that validates and starts
//! it, after which [`WaveSession::tick`] advances it one cooperative step per
//! call. The blocking forms begin the operation and drive ticks until it
//! completes, parking until the next refresh interval or the next worker
//! message, whichever comes first.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::*;

use crate::color::Rgba;
use crate::config::FillConfig;
use crate::display::Surface;
use crate::error::{FillError, FillResult};
use crate::history::History;
use crate::player::{PlayRequest, PlaySummary, Player, PlayerStatus};
use crate::raster::{Pixel, RasterBuffer};
use crate::scheduler::{FillSummary, FrameScheduler, SchedulerStatus};
use crate::wave::messages::WorkerResponse;
use crate::wave::pool::{WaveParams, WorkerLoads, WorkerPool};

/// Result of one [`WaveSession::tick`].
#[derive(Debug)]
pub enum SessionStatus {
    /// No operation is running.
    Idle,
    /// The active operation needs more ticks.
    Running,
    /// The active operation finished during this tick; the session is unlocked.
    Complete(Completion),
}

/// What a finished operation did.
#[derive(Debug, Clone)]
pub enum Completion {
    /// A fill action ended. `entry` is the history index it was recorded
    /// under, `None` when recording is off or nothing was painted.
    Fill { summary: FillSummary, entry: Option<usize> },
    /// A playback, undo or redo ended.
    Play(PlaySummary),
    /// Every worker acknowledged the new configuration.
    Reconfigure { workers: usize, epoch: u64 },
}

impl Completion {
    pub fn fill_summary(&self) -> Option<&FillSummary> {
        match self {
            Completion::Fill { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn play_summary(&self) -> Option<&PlaySummary> {
        match self {
            Completion::Play(summary) => Some(summary),
            _ => None,
        }
    }
}

struct FillOperation {
    scheduler: FrameScheduler,
    blank: Rgba,
}

struct Reconfiguration {
    epoch: u64,
    pending: HashSet<usize>,
}

enum Operation {
    Fill(FillOperation),
    Playback(Player),
    Reconfigure(Reconfiguration),
    /// Finished at `begin_*` time; reported by the next tick.
    Settled(Option<Completion>),
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Fill(_) | Operation::Settled(_) => "fill",
            Operation::Playback(_) => "playback",
            Operation::Reconfigure(_) => "reconfigure",
        }
    }
}

pub struct WaveSession {
    raster: RasterBuffer,
    original: RasterBuffer,
    config: FillConfig,
    pool: WorkerPool,
    history: History,
    surface: Box<dyn Surface>,
    active: Option<Operation>,
    fills_started: usize,
}

fn loads_of(config: &FillConfig) -> WorkerLoads {
    WorkerLoads {
        min: config.workers.min_load,
        max: config.workers.max_load,
    }
}

impl WaveSession {
    /// Validate `config`, spawn the worker pool and take ownership of `raster`.
    pub fn new<S: Surface + 'static>(
        raster: RasterBuffer,
        config: FillConfig,
        surface: S,
    ) -> FillResult<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.workers.count, loads_of(&config))?;
        info!(
            "WaveSession: {}x{} raster, {} workers, radius {}, {} fps",
            raster.width(),
            raster.height(),
            pool.len(),
            config.wave.radius,
            config.performance.fps
        );
        Ok(Self {
            original: raster.clone(),
            raster,
            config,
            pool,
            history: History::new(),
            surface: Box::new(surface),
            active: None,
            fills_started: 0,
        })
    }

    pub fn raster(&self) -> &RasterBuffer {
        &self.raster
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &FillConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    pub fn is_locked(&self) -> bool {
        self.active.is_some()
    }

    /// Name of the running operation, if any.
    pub fn active_operation(&self) -> Option<&'static str> {
        self.active.as_ref().map(Operation::name)
    }

    fn ensure_unlocked(&self) -> FillResult<()> {
        match &self.active {
            Some(operation) => {
                debug!("WaveSession: rejected, {} in progress", operation.name());
                Err(FillError::LockConflict {
                    active: operation.name(),
                })
            }
            None => Ok(()),
        }
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.config.performance.refresh_interval_ms)
    }

    // --- Fill ---

    /// Start a fill from `(x, y)`.
    ///
    /// A seed that is not blank completes on the next tick with nothing
    /// painted or recorded.
    pub fn begin_fill(&mut self, x: u32, y: u32, now: Instant) -> FillResult<()> {
        self.ensure_unlocked()?;
        let seed = Pixel::new(x, y);
        if !self.raster.contains(seed) {
            return Err(FillError::OutOfBounds {
                x,
                y,
                width: self.raster.width(),
                height: self.raster.height(),
            });
        }
        let fill = self.config.fill_color_for(self.fills_started);
        self.config.check_fill_color(fill)?;
        let blank = self.config.colors.blank;

        if !self.raster.is_blank(seed, &self.config.blank_matcher()) {
            info!("WaveSession: seed {:?} is not blank, nothing to fill", seed);
            let summary = FillSummary {
                seed,
                fill,
                frames_painted: 0,
                pixels_painted: 0,
                elapsed: Duration::ZERO,
                recorded: Vec::new(),
            };
            self.active = Some(Operation::Settled(Some(Completion::Fill { summary, entry: None })));
            return Ok(());
        }

        let params = WaveParams {
            threshold: self.config.wave.threshold,
            blank,
            fill,
            radius: self.config.wave.radius,
        };
        let snapshot = Arc::new(self.raster.clone());
        self.pool.init_all(&params, snapshot)?;
        let scheduler = FrameScheduler::start(
            seed,
            fill,
            self.config.performance.fps,
            self.config.workers.compute_ahead,
            self.config.history.record,
            &mut self.pool,
            now,
        )?;
        self.fills_started += 1;
        info!("WaveSession: fill #{} from {:?} with {:?}", self.fills_started, seed, fill);
        self.active = Some(Operation::Fill(FillOperation { scheduler, blank }));
        Ok(())
    }

    /// Fill from `(x, y)` and wait for the last frame.
    pub fn fill(&mut self, x: u32, y: u32) -> FillResult<Completion> {
        self.begin_fill(x, y, Instant::now())?;
        self.drive()
    }

    // --- Playback ---

    /// Start playing history entries `start..=end`.
    pub fn begin_play(
        &mut self,
        start: usize,
        end: usize,
        simultaneous: bool,
        reverse: bool,
        now: Instant,
    ) -> FillResult<()> {
        self.begin_request(PlayRequest::new(start, end, simultaneous, reverse), now)
    }

    fn begin_request(&mut self, request: PlayRequest, now: Instant) -> FillResult<()> {
        self.ensure_unlocked()?;
        let player = Player::start(request, &mut self.history, self.config.performance.fps, now)?;
        self.active = Some(Operation::Playback(player));
        Ok(())
    }

    pub fn play(
        &mut self,
        start: usize,
        end: usize,
        simultaneous: bool,
        reverse: bool,
    ) -> FillResult<Completion> {
        self.begin_play(start, end, simultaneous, reverse, Instant::now())?;
        self.drive()
    }

    /// Start undoing the entry at the cursor. Returns `false` when there is
    /// nothing to undo.
    pub fn begin_undo(&mut self, now: Instant) -> FillResult<bool> {
        self.ensure_unlocked()?;
        let Some(cursor) = self.history.cursor() else {
            debug!("WaveSession: nothing to undo");
            return Ok(false);
        };
        self.begin_request(PlayRequest::undo(cursor), now)?;
        Ok(true)
    }

    pub fn undo(&mut self) -> FillResult<Option<Completion>> {
        if !self.begin_undo(Instant::now())? {
            return Ok(None);
        }
        self.drive().map(Some)
    }

    /// Start replaying the entry after the cursor. Returns `false` when there
    /// is nothing to redo.
    pub fn begin_redo(&mut self, now: Instant) -> FillResult<bool> {
        self.ensure_unlocked()?;
        let Some(index) = self.history.redo_index() else {
            debug!("WaveSession: nothing to redo");
            return Ok(false);
        };
        self.begin_request(PlayRequest::redo(index), now)?;
        Ok(true)
    }

    pub fn redo(&mut self) -> FillResult<Option<Completion>> {
        if !self.begin_redo(Instant::now())? {
            return Ok(None);
        }
        self.drive().map(Some)
    }

    // --- Reconfiguration ---

    /// Adopt `config`: resize the pool, respawn dead workers and re-initialize
    /// every worker. Completes once every worker has acknowledged.
    pub fn begin_update_workers(&mut self, config: FillConfig) -> FillResult<()> {
        self.ensure_unlocked()?;
        config.validate()?;
        self.pool.resize(config.workers.count)?;
        self.pool.set_loads(loads_of(&config));

        let params = WaveParams {
            threshold: config.wave.threshold,
            blank: config.colors.blank,
            fill: config.fill_color_for(self.fills_started),
            radius: config.wave.radius,
        };
        self.config = config;
        let epoch = self.pool.init_all(&params, Arc::new(self.raster.clone()))?;
        let pending = (0..self.pool.len()).collect();
        info!("WaveSession: reconfiguring {} workers (epoch {})", self.pool.len(), epoch);
        self.active = Some(Operation::Reconfigure(Reconfiguration { epoch, pending }));
        Ok(())
    }

    pub fn update_workers(&mut self, config: FillConfig) -> FillResult<Completion> {
        self.begin_update_workers(config)?;
        self.drive()
    }

    // --- Reset ---

    /// Drop the whole history and restore the raster the session started with.
    pub fn reset(&mut self) -> FillResult<()> {
        self.ensure_unlocked()?;
        let damage: Vec<Pixel> = (0..self.raster.height())
            .flat_map(|y| (0..self.raster.width()).map(move |x| Pixel::new(x, y)))
            .filter(|&pixel| self.raster.get(pixel) != self.original.get(pixel))
            .collect();
        self.history.clear();
        self.fills_started = 0;
        self.raster = self.original.clone();
        info!("WaveSession: reset ({} pixels restored)", damage.len());
        self.surface
            .present(&self.raster, &damage)
            .map_err(FillError::Surface)
    }

    // --- Driving ---

    /// Advance the active operation by one step.
    ///
    /// An error ends the operation and unlocks the session; pixels already
    /// painted stay painted.
    pub fn tick(&mut self, now: Instant) -> FillResult<SessionStatus> {
        let Some(mut operation) = self.active.take() else {
            return Ok(SessionStatus::Idle);
        };
        match self.step(&mut operation, now) {
            Ok(Some(completion)) => {
                debug!("WaveSession: {} complete", operation.name());
                Ok(SessionStatus::Complete(completion))
            }
            Ok(None) => {
                self.active = Some(operation);
                Ok(SessionStatus::Running)
            }
            Err(e) => {
                error!("WaveSession: {} aborted: {}", operation.name(), e);
                Err(e)
            }
        }
    }

    fn step(&mut self, operation: &mut Operation, now: Instant) -> FillResult<Option<Completion>> {
        match operation {
            Operation::Settled(completion) => Ok(completion.take()),
            Operation::Fill(fill) => self.step_fill(fill, now),
            Operation::Playback(player) => self.step_playback(player, now),
            Operation::Reconfigure(reconfiguration) => self.step_reconfigure(reconfiguration),
        }
    }

    fn step_fill(&mut self, fill: &mut FillOperation, now: Instant) -> FillResult<Option<Completion>> {
        for response in self.pool.poll() {
            fill.scheduler.on_response(response, &mut self.pool)?;
        }
        self.pool.check_health()?;

        match fill
            .scheduler
            .tick(now, &mut self.pool, &mut self.raster, &mut *self.surface)?
        {
            SchedulerStatus::Pending => Ok(None),
            SchedulerStatus::Finished(mut summary) => {
                let entry = if self.config.history.record {
                    let frames = std::mem::take(&mut summary.recorded);
                    self.history.record(summary.seed, frames, summary.fill, fill.blank)
                } else {
                    None
                };
                Ok(Some(Completion::Fill { summary, entry }))
            }
        }
    }

    fn step_playback(&mut self, player: &mut Player, now: Instant) -> FillResult<Option<Completion>> {
        match player.tick(now, &self.history, &mut self.raster, &mut *self.surface)? {
            PlayerStatus::Pending => Ok(None),
            PlayerStatus::Finished(summary) => {
                self.history.set_cursor(summary.cursor);
                Ok(Some(Completion::Play(summary)))
            }
        }
    }

    fn step_reconfigure(&mut self, reconfiguration: &mut Reconfiguration) -> FillResult<Option<Completion>> {
        for response in self.pool.poll() {
            match response {
                WorkerResponse::InitDone { worker, .. } => {
                    reconfiguration.pending.remove(&worker);
                }
                WorkerResponse::Fault { worker, reason, .. } => {
                    return Err(FillError::WorkerFault { worker, reason });
                }
                other => {
                    warn!(
                        "WaveSession: unexpected response from worker {} while reconfiguring",
                        other.worker()
                    );
                }
            }
        }
        if let Some(&dead) = reconfiguration
            .pending
            .iter()
            .find(|&&worker| !self.pool.is_worker_alive(worker))
        {
            return Err(FillError::worker_fault(dead, "worker thread exited before acknowledging"));
        }
        if !reconfiguration.pending.is_empty() {
            return Ok(None);
        }
        Ok(Some(Completion::Reconfigure {
            workers: self.pool.len(),
            epoch: reconfiguration.epoch,
        }))
    }

    /// How long the blocking driver may sleep before the next tick.
    fn wait_budget(&self, now: Instant) -> Option<Duration> {
        let refresh = self.refresh_interval();
        match &self.active {
            Some(Operation::Fill(fill)) => Some(
                fill.scheduler
                    .time_to_due(now)
                    .map_or(refresh, |due| due.min(refresh)),
            ),
            Some(Operation::Playback(player)) => player.time_to_due(now).map(|due| due.min(refresh)),
            Some(Operation::Reconfigure(_)) => Some(refresh),
            Some(Operation::Settled(_)) | None => None,
        }
    }

    /// Tick the active operation until it completes.
    fn drive(&mut self) -> FillResult<Completion> {
        debug_assert!(self.active.is_some());
        loop {
            let now = Instant::now();
            if let SessionStatus::Complete(completion) = self.tick(now)? {
                return Ok(completion);
            }
            match (&self.active, self.wait_budget(now)) {
                (Some(Operation::Playback(_)), Some(budget)) => std::thread::sleep(budget),
                (_, Some(budget)) => self.pool.park(budget),
                (_, None) => {}
            }
        }
    }
}
