// src/wave/worker.rs
//! WaveWorker - dedicated thread that expands shore slices.
//!
//! Simple request/response actor: receives `Init` and `Work` requests, answers
//! each with exactly one response on the pool's shared response channel.
//!
//! Threading model:
//! - Owns: the current raster snapshot (shared read-only), its claim mask, and
//!   a cached spatial index of the shore it last worked on
//! - Never touches the session raster; results travel back by message

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, SendError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::*;

use crate::color::ColorMatcher;
use crate::raster::{Pixel, RasterBuffer};
use crate::wave::expander::{ClaimMask, ShoreIndex, WaveExpander};
use crate::wave::messages::{WorkerInit, WorkerRequest, WorkerResponse};

/// Per-operation state loaded by `Init`.
struct WorkerContext {
    epoch: u64,
    snapshot: Arc<RasterBuffer>,
    blank: ColorMatcher,
    radius: u32,
    claims: ClaimMask,
    shore_cache: Option<(Arc<[Pixel]>, ShoreIndex)>,
}

/// Worker state (runs on its own thread).
struct WaveWorker {
    index: usize,
    context: Option<WorkerContext>,
}

impl WaveWorker {
    fn new(index: usize) -> Self {
        Self {
            index,
            context: None,
        }
    }

    fn init(&mut self, init: WorkerInit) -> WorkerResponse {
        let epoch = init.epoch;
        if init.snapshot.width() != init.width || init.snapshot.height() != init.height {
            return self.fault(
                epoch,
                format!(
                    "snapshot is {}x{} but init declares {}x{}",
                    init.snapshot.width(),
                    init.snapshot.height(),
                    init.width,
                    init.height
                ),
            );
        }
        if init.radius == 0 {
            return self.fault(epoch, "radius must be at least 1");
        }
        let blank = ColorMatcher::new(init.blank, init.threshold);
        if blank.matches(init.fill) {
            return self.fault(epoch, format!("fill color {:?} counts as blank", init.fill.0));
        }

        self.context = Some(WorkerContext {
            epoch,
            blank,
            radius: init.radius,
            claims: ClaimMask::new(init.width, init.height),
            snapshot: init.snapshot,
            shore_cache: None,
        });
        debug!(
            "WaveWorker {}: initialized for epoch {} ({}x{}, radius {})",
            self.index, epoch, init.width, init.height, init.radius
        );
        WorkerResponse::InitDone {
            worker: self.index,
            epoch,
        }
    }

    fn work(
        &mut self,
        epoch: u64,
        frame_index: usize,
        slice: Vec<Pixel>,
        shore: Arc<[Pixel]>,
    ) -> WorkerResponse {
        let index = self.index;
        let Some(context) = self.context.as_mut() else {
            return self.fault(epoch, "work received before init");
        };
        if context.epoch != epoch {
            let expected = context.epoch;
            return self.fault(epoch, format!("work for epoch {epoch}, initialized for {expected}"));
        }
        if let Some(outside) = slice.iter().find(|p| !context.snapshot.contains(**p)) {
            let outside = *outside;
            return self.fault(epoch, format!("shore pixel {outside:?} is outside the raster"));
        }

        let cached = matches!(&context.shore_cache, Some((arc, _)) if Arc::ptr_eq(arc, &shore));
        if !cached {
            let shore_index = ShoreIndex::new(&shore, context.radius);
            context.shore_cache = Some((shore, shore_index));
        }

        let WorkerContext {
            snapshot,
            blank,
            radius,
            claims,
            shore_cache,
            ..
        } = context;
        let Some((_, shore_index)) = shore_cache.as_ref() else {
            return self.fault(epoch, "shore index missing");
        };

        let expander = WaveExpander::new(snapshot, *blank, *radius);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            expander.expand(&slice, shore_index, claims)
        }));

        match outcome {
            Ok(expansion) => {
                trace!(
                    "WaveWorker {}: frame {} slice of {} -> {} filled, {} edge",
                    index,
                    frame_index,
                    slice.len(),
                    expansion.filled.len(),
                    expansion.edge.len()
                );
                WorkerResponse::Done {
                    worker: index,
                    epoch,
                    frame_index,
                    worked: slice.len(),
                    filled: expansion.filled,
                    edge: expansion.edge,
                }
            }
            Err(_) => {
                // Claims may be half-written; force a re-init before more work.
                self.context = None;
                self.fault(epoch, "expansion panicked")
            }
        }
    }

    fn fault(&self, epoch: u64, reason: impl Into<String>) -> WorkerResponse {
        let reason = reason.into();
        warn!("WaveWorker {}: {}", self.index, reason);
        WorkerResponse::Fault {
            worker: self.index,
            epoch,
            reason,
        }
    }

    /// Run the worker loop: receive request, process, send response.
    fn run(mut self, request_rx: Receiver<WorkerRequest>, response_tx: Sender<WorkerResponse>) {
        debug!("WaveWorker {}: Thread started", self.index);

        while let Ok(request) = request_rx.recv() {
            let response = match request {
                WorkerRequest::Init(init) => self.init(init),
                WorkerRequest::Work {
                    epoch,
                    frame_index,
                    slice,
                    shore,
                } => self.work(epoch, frame_index, slice, shore),
            };
            if response_tx.send(response).is_err() {
                info!("WaveWorker {}: Response channel closed, exiting", self.index);
                return;
            }
        }

        debug!("WaveWorker {}: Request channel closed, exiting", self.index);
    }
}

/// Pool-side handle to one worker thread.
pub struct WorkerHandle {
    index: usize,
    request_tx: Option<Sender<WorkerRequest>>,
    thread_handle: Option<JoinHandle<()>>,
    /// Frame the worker is currently expanding a slice of.
    pub busy_frame: Option<usize>,
}

impl WorkerHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_idle(&self) -> bool {
        self.busy_frame.is_none()
    }

    /// Whether the thread is still running.
    pub fn is_alive(&self) -> bool {
        self.request_tx.is_some()
            && self
                .thread_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    pub fn send(&self, request: WorkerRequest) -> Result<(), SendError<WorkerRequest>> {
        match &self.request_tx {
            Some(tx) => tx.send(request),
            None => Err(SendError(request)),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.request_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                error!("WaveWorker {} thread panicked: {:?}", self.index, e);
            }
        }
    }
}

/// Spawn a worker thread that answers on `response_tx`.
pub fn spawn_worker(index: usize, response_tx: Sender<WorkerResponse>) -> Result<WorkerHandle> {
    let (request_tx, request_rx) = channel();

    let thread_handle = thread::Builder::new()
        .name(format!("wave-worker-{index}"))
        .spawn(move || {
            WaveWorker::new(index).run(request_rx, response_tx);
        })
        .with_context(|| format!("Failed to spawn wave worker {index}"))?;

    Ok(WorkerHandle {
        index,
        request_tx: Some(request_tx),
        thread_handle: Some(thread_handle),
        busy_frame: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use std::time::Duration;

    fn init(epoch: u64, snapshot: Arc<RasterBuffer>) -> WorkerRequest {
        WorkerRequest::Init(WorkerInit {
            epoch,
            threshold: 0,
            blank: Rgba::WHITE,
            fill: Rgba::new(255, 0, 0, 255),
            radius: 20,
            width: snapshot.width(),
            height: snapshot.height(),
            snapshot,
        })
    }

    fn recv(rx: &Receiver<WorkerResponse>) -> WorkerResponse {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test_log::test]
    fn init_then_work_answers_done() {
        let (tx, rx) = channel();
        let handle = spawn_worker(3, tx).unwrap();
        let snapshot = Arc::new(RasterBuffer::filled(6, 6, Rgba::WHITE));
        handle.send(init(7, snapshot)).unwrap();
        assert!(matches!(recv(&rx), WorkerResponse::InitDone { worker: 3, epoch: 7 }));

        let shore: Arc<[Pixel]> = Arc::from(vec![Pixel::new(2, 2)]);
        handle
            .send(WorkerRequest::Work {
                epoch: 7,
                frame_index: 0,
                slice: vec![Pixel::new(2, 2)],
                shore,
            })
            .unwrap();
        match recv(&rx) {
            WorkerResponse::Done {
                worker,
                frame_index,
                worked,
                filled,
                edge,
                ..
            } => {
                assert_eq!(worker, 3);
                assert_eq!(frame_index, 0);
                assert_eq!(worked, 1);
                assert_eq!(filled.len(), 36);
                assert!(edge.is_empty());
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test_log::test]
    fn work_before_init_is_a_fault() {
        let (tx, rx) = channel();
        let handle = spawn_worker(0, tx).unwrap();
        handle
            .send(WorkerRequest::Work {
                epoch: 1,
                frame_index: 0,
                slice: vec![Pixel::new(0, 0)],
                shore: Arc::from(vec![Pixel::new(0, 0)]),
            })
            .unwrap();
        assert!(matches!(recv(&rx), WorkerResponse::Fault { worker: 0, .. }));
    }

    #[test_log::test]
    fn mismatched_dimensions_fail_init() {
        let (tx, rx) = channel();
        let handle = spawn_worker(1, tx).unwrap();
        let snapshot = Arc::new(RasterBuffer::filled(4, 4, Rgba::WHITE));
        let mut request = init(2, snapshot);
        if let WorkerRequest::Init(ref mut payload) = request {
            payload.width = 5;
        }
        handle.send(request).unwrap();
        assert!(matches!(recv(&rx), WorkerResponse::Fault { worker: 1, epoch: 2, .. }));
    }

    #[test_log::test]
    fn dropping_the_handle_stops_the_thread() {
        let (tx, _rx) = channel();
        let handle = spawn_worker(0, tx).unwrap();
        assert!(handle.is_alive());
        drop(handle);
    }
}
