// src/wave/messages.rs
//! Message types for communication between the WorkerPool and its workers.
//!
//! All communication happens via ownership transfer over channels. The only
//! data shared between threads is immutable (`Arc` snapshots).

use std::sync::Arc;

use crate::color::Rgba;
use crate::raster::{Pixel, RasterBuffer};

/// Requests sent from the WorkerPool to a worker.
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    /// Load a fresh raster snapshot and fill parameters, dropping any claims
    /// from the previous operation. Answered with `InitDone` or `Fault`.
    Init(WorkerInit),

    /// Expand `slice` by one step. Answered with `Done` or `Fault`.
    Work {
        epoch: u64,
        frame_index: usize,
        slice: Vec<Pixel>,
        /// The full shore of `frame_index` as of assignment, for radius tests.
        shore: Arc<[Pixel]>,
    },
}

/// Payload of [`WorkerRequest::Init`].
#[derive(Debug, Clone)]
pub struct WorkerInit {
    pub epoch: u64,
    pub threshold: u8,
    pub blank: Rgba,
    pub fill: Rgba,
    pub radius: u32,
    pub width: u32,
    pub height: u32,
    pub snapshot: Arc<RasterBuffer>,
}

/// Responses sent from a worker back to the WorkerPool.
#[derive(Debug, Clone)]
pub enum WorkerResponse {
    /// Initialization accepted.
    InitDone { worker: usize, epoch: u64 },

    /// One slice expanded.
    Done {
        worker: usize,
        epoch: u64,
        frame_index: usize,
        worked: usize,
        filled: Vec<Pixel>,
        edge: Vec<Pixel>,
    },

    /// The request could not be served.
    Fault {
        worker: usize,
        epoch: u64,
        reason: String,
    },
}

impl WorkerResponse {
    pub fn worker(&self) -> usize {
        match self {
            WorkerResponse::InitDone { worker, .. }
            | WorkerResponse::Done { worker, .. }
            | WorkerResponse::Fault { worker, .. } => *worker,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            WorkerResponse::InitDone { epoch, .. }
            | WorkerResponse::Done { epoch, .. }
            | WorkerResponse::Fault { epoch, .. } => *epoch,
        }
    }
}
