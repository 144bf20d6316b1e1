//! Hardware seams (ADC channels, push button, rotary encoder, display)
//!
//! The core only talks to these traits. Real GPIO/I2C drivers live outside
//! this crate; the simulated implementations here back `--simulate` runs
//! and the test suite.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("read of channel {channel} failed: {reason}")]
    Read { channel: usize, reason: String },
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Analog input source, one voltage per channel per read
#[async_trait]
pub trait ChannelReader: Send + Sync {
    async fn read_channel(&self, channel: usize) -> Result<f32, HardwareError>;
}

/// Push-button level source
#[async_trait]
pub trait ButtonReader: Send + Sync {
    async fn is_pressed(&self) -> Result<bool, HardwareError>;
}

/// Rotary encoder, detents accumulated since the previous read
#[async_trait]
pub trait RotaryReader: Send + Sync {
    async fn read_delta(&self) -> Result<i32, HardwareError>;
}

/// Display sink for the screen worker
#[async_trait]
pub trait Display: Send + Sync {
    async fn render(&self, mode: u32, line: &str) -> Result<(), HardwareError>;
}

/// Deterministic ADC stand-in: gate channels see a slow square wave,
/// CV channels a triangle ramp
pub struct SimChannelReader {
    ticks: AtomicU64,
}

impl SimChannelReader {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }
}

impl Default for SimChannelReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelReader for SimChannelReader {
    async fn read_channel(&self, channel: usize) -> Result<f32, HardwareError> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let phase = (tick / 64 + channel as u64) % 16;
        // Even channels behave gate-like, odd ones ramp.
        let value = if channel % 2 == 0 {
            if phase < 8 {
                0.0
            } else {
                3.3
            }
        } else {
            phase as f32 / 16.0 * 5.0
        };
        Ok(value)
    }
}

/// Button that is never pressed; placeholder for the GPIO driver
pub struct SimButton;

#[async_trait]
impl ButtonReader for SimButton {
    async fn is_pressed(&self) -> Result<bool, HardwareError> {
        Ok(false)
    }
}

/// Rotary encoder that never moves; placeholder for the I2C driver
pub struct SimRotary;

#[async_trait]
impl RotaryReader for SimRotary {
    async fn read_delta(&self) -> Result<i32, HardwareError> {
        Ok(0)
    }
}

/// Display that logs instead of driving a panel
pub struct LogDisplay;

#[async_trait]
impl Display for LogDisplay {
    async fn render(&self, mode: u32, line: &str) -> Result<(), HardwareError> {
        debug!(mode, "screen: {}", line);
        Ok(())
    }
}
