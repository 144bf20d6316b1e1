//! Configuration management for Neurorack GW
//!
//! Handles loading, parsing, and validating the YAML configuration file.
//! The core consumes only the validated structure; anything that fails
//! validation refuses to start.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
}

/// Physical input layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    /// Channel kinds in id order; channel ids are dense in `[0, len)`
    pub channels: Vec<ChannelKind>,
    /// Channels sampled sequentially by one sampler loop (one loop per ADC chip)
    #[serde(default = "default_channels_per_group")]
    pub channels_per_group: usize,
    /// Delay between consecutive sweeps of a sampler group
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,
}

/// Kind of a physical input channel
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Gate,
    Cv,
}

/// Classification thresholds for the gate / CV state machines
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplingConfig {
    /// Gate opens when a sample exceeds this voltage
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,
    /// Gate may close again once a sample falls below this voltage
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,
    /// Minimum CV delta considered a real movement
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: f32,
    /// Minimum dwell time before a gate-close transition is accepted
    #[serde(default = "default_min_gate_width_ms")]
    pub min_gate_width_ms: u64,
    /// Consecutive quiet samples before a CV channel goes inactive
    #[serde(default = "default_inactivity_limit")]
    pub inactivity_limit: u32,
    /// Hardware read retries before a channel is marked degraded
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    /// Backoff between hardware read retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Audio consumer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Capacity of the per-channel recent-sample window handed to the model
    pub buffer_capacity: usize,
    /// Synthesis model name, resolved against the model registry at startup
    #[serde(default = "default_model")]
    pub model: String,
}

/// Button / rotary polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlsConfig {
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    /// Minimum spacing between accepted button presses
    #[serde(default = "default_button_debounce_ms")]
    pub button_debounce_ms: u64,
}

fn default_channels_per_group() -> usize {
    3
}
fn default_sample_period_ms() -> u64 {
    1
}
fn default_high_threshold() -> f32 {
    2.5
}
fn default_low_threshold() -> f32 {
    2.0
}
fn default_noise_threshold() -> f32 {
    0.05
}
fn default_min_gate_width_ms() -> u64 {
    50
}
fn default_inactivity_limit() -> u32 {
    5
}
fn default_read_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    5
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_model() -> String {
    "bypass".to_string()
}
fn default_poll_period_ms() -> u64 {
    10
}
fn default_button_debounce_ms() -> u64 {
    50
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            noise_threshold: default_noise_threshold(),
            min_gate_width_ms: default_min_gate_width_ms(),
            inactivity_limit: default_inactivity_limit(),
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: default_poll_period_ms(),
            button_debounce_ms: default_button_debounce_ms(),
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that the core relies on; fatal on failure
    pub fn validate(&self) -> Result<()> {
        if self.hardware.channels.is_empty() {
            bail!("config: hardware.channels must list at least one channel");
        }
        if self.hardware.channels_per_group == 0 {
            bail!("config: hardware.channels_per_group must be >= 1");
        }
        if self.sampling.low_threshold >= self.sampling.high_threshold {
            bail!(
                "config: sampling.low_threshold ({}) must be below high_threshold ({})",
                self.sampling.low_threshold,
                self.sampling.high_threshold
            );
        }
        if self.sampling.noise_threshold <= 0.0 {
            bail!("config: sampling.noise_threshold must be positive");
        }
        if self.audio.buffer_capacity == 0 {
            bail!("config: audio.buffer_capacity must be >= 1");
        }
        Ok(())
    }

    pub fn num_channels(&self) -> usize {
        self.hardware.channels.len()
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.hardware.sample_period_ms)
    }

    pub fn min_gate_width(&self) -> Duration {
        Duration::from_millis(self.sampling.min_gate_width_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.sampling.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_YAML: &str = r#"
hardware:
  channels: [gate, gate, cv, cv, cv, cv]
audio:
  buffer_capacity: 64
"#;

    fn minimal_config() -> AppConfig {
        serde_yaml::from_str(MINIMAL_YAML).unwrap()
    }

    #[test]
    fn test_parse_minimal_with_defaults() {
        let config = minimal_config();
        assert_eq!(config.num_channels(), 6);
        assert_eq!(config.hardware.channels[0], ChannelKind::Gate);
        assert_eq!(config.hardware.channels[2], ChannelKind::Cv);
        assert_eq!(config.hardware.channels_per_group, 3);
        assert_eq!(config.sampling.high_threshold, 2.5);
        assert_eq!(config.sampling.low_threshold, 2.0);
        assert_eq!(config.sampling.inactivity_limit, 5);
        assert_eq!(config.audio.model, "bypass");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reject_empty_channels() {
        let mut config = minimal_config();
        config.hardware.channels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_inverted_thresholds() {
        let mut config = minimal_config();
        config.sampling.low_threshold = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_buffer_capacity() {
        let mut config = minimal_config();
        config.audio.buffer_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_unknown_channel_kind() {
        let yaml = r#"
hardware:
  channels: [gate, trigger]
audio:
  buffer_capacity: 8
"#;
        let parsed: Result<AppConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL_YAML.as_bytes()).unwrap();
        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.num_channels(), 6);
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        assert!(AppConfig::load("/nonexistent/config.yaml").await.is_err());
    }
}
