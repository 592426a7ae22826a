// src/wave/pool.rs
//! WorkerPool - hands shore slices to idle workers and merges their results.
//!
//! The pool lives on the orchestrator thread. Workers answer on one shared
//! response channel; every response carries the epoch of the operation it
//! belongs to, and answers from an abandoned operation are dropped.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use log::*;

use crate::color::Rgba;
use crate::error::{FillError, FillResult};
use crate::raster::RasterBuffer;
use crate::scheduler::frame::FrameTable;
use crate::wave::messages::{WorkerInit, WorkerRequest, WorkerResponse};
use crate::wave::worker::{spawn_worker, WorkerHandle};

/// Per-worker slice bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLoads {
    pub min: usize,
    /// 0 disables the cap.
    pub max: usize,
}

impl WorkerLoads {
    /// Slice size for `remaining` shore pixels split over `idle` workers.
    pub fn slice_size(&self, remaining: usize, idle: usize) -> usize {
        let even = remaining.div_ceil(idle.max(1));
        let slice = even.max(self.min).max(1);
        if self.max > 0 {
            slice.min(self.max)
        } else {
            slice
        }
    }
}

/// Fill parameters sent to every worker at the start of an operation.
#[derive(Debug, Clone)]
pub struct WaveParams {
    pub threshold: u8,
    pub blank: Rgba,
    pub fill: Rgba,
    pub radius: u32,
}

pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    response_tx: Sender<WorkerResponse>,
    response_rx: Receiver<WorkerResponse>,
    inbox: VecDeque<WorkerResponse>,
    loads: WorkerLoads,
    epoch: u64,
}

impl WorkerPool {
    pub fn new(count: usize, loads: WorkerLoads) -> FillResult<Self> {
        let (response_tx, response_rx) = channel();
        let mut pool = Self {
            workers: Vec::with_capacity(count),
            response_tx,
            response_rx,
            inbox: VecDeque::new(),
            loads,
            epoch: 0,
        };
        pool.resize(count)?;
        info!("WorkerPool: {} workers spawned", pool.workers.len());
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn idle_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_idle()).count()
    }

    pub fn set_loads(&mut self, loads: WorkerLoads) {
        self.loads = loads;
    }

    /// Grow or shrink to `count` workers, respawning any whose thread has died.
    pub fn resize(&mut self, count: usize) -> FillResult<()> {
        if count == 0 {
            return Err(FillError::invalid_config("worker count must be at least 1"));
        }
        self.workers.truncate(count);
        for slot in 0..self.workers.len() {
            if !self.workers[slot].is_alive() {
                warn!("WorkerPool: worker {} is down, respawning", slot);
                self.workers[slot] = self.spawn(slot)?;
            }
        }
        while self.workers.len() < count {
            let index = self.workers.len();
            let handle = self.spawn(index)?;
            self.workers.push(handle);
        }
        Ok(())
    }

    fn spawn(&self, index: usize) -> FillResult<WorkerHandle> {
        spawn_worker(index, self.response_tx.clone())
            .map_err(|e| FillError::worker_fault(index, format!("{e:#}")))
    }

    /// Start a new operation epoch and send every worker a fresh snapshot.
    ///
    /// Workers process requests in order, so work sent after this call always
    /// sees the new snapshot. Returns the new epoch.
    pub fn init_all(&mut self, params: &WaveParams, snapshot: Arc<RasterBuffer>) -> FillResult<u64> {
        self.epoch += 1;
        let epoch = self.epoch;
        for worker in &mut self.workers {
            // Whatever it was doing belongs to an older epoch now.
            worker.busy_frame = None;
            let init = WorkerInit {
                epoch,
                threshold: params.threshold,
                blank: params.blank,
                fill: params.fill,
                radius: params.radius,
                width: snapshot.width(),
                height: snapshot.height(),
                snapshot: Arc::clone(&snapshot),
            };
            worker
                .send(WorkerRequest::Init(init))
                .map_err(|_| FillError::worker_fault(worker.index(), "request channel closed"))?;
        }
        debug!("WorkerPool: epoch {} initialized on {} workers", epoch, self.workers.len());
        Ok(epoch)
    }

    /// Hand slices of the first idle frame at or after `current` to idle
    /// workers. Returns the number of shore pixels assigned.
    pub fn assign_work(&mut self, frames: &mut FrameTable, current: usize) -> FillResult<usize> {
        let Some(frame_index) = frames.first_idle(current) else {
            return Ok(0);
        };
        let idle: Vec<usize> = self
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_idle())
            .map(|(slot, _)| slot)
            .collect();
        if idle.is_empty() {
            return Ok(0);
        }

        let Some(frame) = frames.get_mut(frame_index) else {
            return Ok(0);
        };
        let shore_len = frame.shore_len();
        let offset = frame.next_idle;
        let slice = self.loads.slice_size(shore_len - offset, idle.len());
        let shore = frame.shared_shore();

        let mut assigned = 0;
        for (i, slot) in idle.into_iter().enumerate() {
            let start = offset + slice * i;
            if start >= shore_len {
                break;
            }
            let end = (start + slice).min(shore_len);
            let worker = &mut self.workers[slot];
            worker
                .send(WorkerRequest::Work {
                    epoch: self.epoch,
                    frame_index,
                    slice: shore[start..end].to_vec(),
                    shore: Arc::clone(&shore),
                })
                .map_err(|_| FillError::worker_fault(worker.index(), "request channel closed"))?;
            worker.busy_frame = Some(frame_index);
            assigned += end - start;
        }
        frame.next_idle += assigned;

        trace!(
            "WorkerPool: assigned {} of {} shore pixels of frame {} (slice {})",
            assigned,
            shore_len,
            frame_index,
            slice
        );
        Ok(assigned)
    }

    /// Merge one current-epoch response into the frame table and request
    /// more work as the scheduling mode allows.
    pub fn handle_response(
        &mut self,
        response: WorkerResponse,
        frames: &mut FrameTable,
        current: usize,
        compute_ahead: bool,
    ) -> FillResult<()> {
        match response {
            WorkerResponse::InitDone { .. } => Ok(()),
            WorkerResponse::Fault { worker, reason, .. } => {
                self.release(worker);
                Err(FillError::WorkerFault { worker, reason })
            }
            WorkerResponse::Done {
                worker,
                frame_index,
                worked,
                filled,
                edge,
                ..
            } => {
                let expected = self.release(worker);
                if expected != Some(frame_index) {
                    return Err(FillError::worker_fault(
                        worker,
                        format!("reported frame {frame_index}, was assigned {expected:?}"),
                    ));
                }
                let Some(frame) = frames.get(frame_index) else {
                    return Err(FillError::worker_fault(
                        worker,
                        format!("reported unknown frame {frame_index}"),
                    ));
                };
                if frame.worked + worked > frame.next_idle {
                    return Err(FillError::worker_fault(
                        worker,
                        format!(
                            "reported {worked} pixels for frame {frame_index}, only {} outstanding",
                            frame.next_idle - frame.worked
                        ),
                    ));
                }

                frames.merge(frame_index, worked, filled, edge);

                let current_has_work = frames.get(current).is_some_and(|f| f.has_unassigned());
                if compute_ahead || current_has_work {
                    self.assign_work(frames, current)?;
                }
                Ok(())
            }
        }
    }

    /// Mark a worker idle, returning the frame it was busy with.
    fn release(&mut self, worker: usize) -> Option<usize> {
        self.workers
            .get_mut(worker)
            .and_then(|handle| handle.busy_frame.take())
    }

    /// Block until a response arrives or `timeout` passes. The response, if
    /// any, is kept for the next [`WorkerPool::poll`].
    pub fn park(&mut self, timeout: Duration) {
        if !self.inbox.is_empty() {
            return;
        }
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => self.inbox.push_back(response),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("WorkerPool: response channel disconnected");
            }
        }
    }

    /// Drain every pending response of the current epoch. Responses from older
    /// epochs are dropped; `init_all` already freed their workers.
    pub fn poll(&mut self) -> Vec<WorkerResponse> {
        loop {
            match self.response_rx.try_recv() {
                Ok(response) => self.inbox.push_back(response),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let mut current = Vec::with_capacity(self.inbox.len());
        while let Some(response) = self.inbox.pop_front() {
            if response.epoch() == self.epoch {
                current.push(response);
            } else {
                debug!(
                    "WorkerPool: dropping epoch {} response from worker {} (current epoch {})",
                    response.epoch(),
                    response.worker(),
                    self.epoch
                );
            }
        }
        current
    }

    pub fn is_worker_alive(&self, index: usize) -> bool {
        self.workers.get(index).is_some_and(|w| w.is_alive())
    }

    /// Fail if a worker that owes a response has died.
    pub fn check_health(&self) -> FillResult<()> {
        match self.workers.iter().find(|w| !w.is_idle() && !w.is_alive()) {
            Some(dead) => Err(FillError::worker_fault(dead.index(), "worker thread exited")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
