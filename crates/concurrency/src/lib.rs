//! Parallel execution layer for the attribute selection engine
//!
//! This crate implements the fixed-width worker pool used by the measure
//! kernels and by the exploration level expansion:
//! - WorkerPool: contiguous-chunk fan-out over CPU-bound closures
//! - CancelToken: cooperative cancellation observed at task boundaries
//!
//! Workers are CPU-bound and never suspend; the only wait point is the
//! join after a batch has been dispatched.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod pool;

pub use cancel::CancelToken;
pub use pool::WorkerPool;
