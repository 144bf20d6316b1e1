//! Worker run-loops started by the supervisor
//!
//! Every worker exposes the same shape: an async `run(ctx, ...)` entry point
//! taking the shared [`WorkerCtx`](crate::supervisor::WorkerCtx) plus its
//! constructor-supplied dependencies.

pub mod audio;
pub mod controls;
pub mod screen;
