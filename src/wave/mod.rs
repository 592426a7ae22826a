// src/wave/mod.rs
//! Wavefront expansion and the worker threads that run it.

pub mod expander;
pub mod messages;
pub mod pool;
pub mod worker;

pub use expander::{ClaimMask, Expansion, ShoreIndex, WaveExpander};
pub use pool::{WaveParams, WorkerLoads, WorkerPool};
