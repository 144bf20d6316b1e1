//! Neurorack GW - concurrent CV/gate sampling and event dispatch for a
//! Eurorack neural synthesizer host
//!
//! The crate coordinates the rack's input sources (gate/CV analog channels,
//! push button, rotary encoder) and its consumers (audio engine, screen) on
//! a single host. Samplers classify raw voltages into canonical events, the
//! router publishes them into shared state and wakes the target consumer,
//! and the supervisor owns every worker's lifecycle.

pub mod config;
pub mod hardware;
pub mod router;
pub mod sampler;
pub mod signal;
pub mod state;
pub mod supervisor;
pub mod workers;
