//! Input sampler - concurrent gate/CV classification loops
//!
//! One loop per channel group (one per ADC chip); groups run in parallel,
//! channels within a group are swept sequentially, so per-channel sample
//! order is strict. Classified transitions go through the [`EventRouter`];
//! raw values and windows land in [`SharedState`].

pub mod cv;
pub mod gate;

use crate::config::{AppConfig, ChannelKind, SamplingConfig};
use crate::hardware::{ChannelReader, HardwareError};
use crate::router::EventRouter;
use crate::state::{InputEvent, SharedState};
use anyhow::{Context, Result};
use self::cv::{CvStep, CvTracker};
use self::gate::{GateEdge, GateTracker};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-channel classification state, owned by the group loop
enum ChannelTracker {
    Gate(GateTracker),
    Cv(CvTracker),
}

pub struct InputSampler {
    shared: Arc<SharedState>,
    router: Arc<EventRouter>,
    reader: Arc<dyn ChannelReader>,
    sampling: SamplingConfig,
    kinds: Vec<ChannelKind>,
    sample_period: Duration,
    channels_per_group: usize,
}

impl InputSampler {
    pub fn new(
        config: &AppConfig,
        shared: Arc<SharedState>,
        router: Arc<EventRouter>,
        reader: Arc<dyn ChannelReader>,
    ) -> Self {
        Self {
            shared,
            router,
            reader,
            sampling: config.sampling.clone(),
            kinds: config.hardware.channels.clone(),
            sample_period: config.sample_period(),
            channels_per_group: config.hardware.channels_per_group,
        }
    }

    /// Partition channel ids into sequentially-swept groups
    pub fn groups(&self) -> Vec<Vec<usize>> {
        (0..self.kinds.len())
            .collect::<Vec<_>>()
            .chunks(self.channels_per_group)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Run all group loops until cancellation
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let mut handles = Vec::new();
        for group in self.groups() {
            let sampler = Arc::clone(&self);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(
                async move { sampler.run_group(group, cancel).await },
            ));
        }
        for handle in handles {
            handle.await.context("sampler group task panicked")??;
        }
        Ok(())
    }

    fn make_tracker(&self, id: usize) -> ChannelTracker {
        match self.kinds[id] {
            ChannelKind::Gate => ChannelTracker::Gate(GateTracker::new(
                self.sampling.high_threshold,
                self.sampling.low_threshold,
                Duration::from_millis(self.sampling.min_gate_width_ms),
            )),
            ChannelKind::Cv => ChannelTracker::Cv(CvTracker::new(
                self.sampling.noise_threshold,
                self.sampling.inactivity_limit,
            )),
        }
    }

    async fn run_group(&self, group: Vec<usize>, cancel: CancellationToken) -> Result<()> {
        let mut trackers: Vec<(usize, ChannelTracker)> =
            group.iter().map(|&id| (id, self.make_tracker(id))).collect();
        info!("sampler group {:?} started", group);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            for (id, tracker) in trackers.iter_mut() {
                if self.shared.is_degraded(*id) {
                    continue;
                }
                match self.read_with_retry(*id, &cancel).await {
                    Ok(Some(value)) => self.process_sample(*id, tracker, value),
                    // Canceled mid-backoff; the outer check exits the loop.
                    Ok(None) => break,
                    Err(e) => {
                        warn!(
                            "channel {} degraded after {} read retries: {}",
                            id, self.sampling.read_retries, e
                        );
                        self.shared.with_channel(*id, |ch| ch.degraded = true);
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.sample_period) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("sampler group {:?} stopped", group);
        Ok(())
    }

    /// Read one channel, retrying with backoff; `Ok(None)` means canceled
    async fn read_with_retry(
        &self,
        id: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<f32>, HardwareError> {
        let mut attempt = 0;
        loop {
            match self.reader.read_channel(id).await {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.sampling.read_retries {
                        return Err(e);
                    }
                    debug!("channel {} read failed (attempt {}): {}", id, attempt, e);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(self.sampling.retry_backoff_ms)) => {}
                        _ = cancel.cancelled() => return Ok(None),
                    }
                }
            }
        }
    }

    /// Classify one sample and apply its effects under the channel lock
    fn process_sample(&self, id: usize, tracker: &mut ChannelTracker, value: f32) {
        match tracker {
            ChannelTracker::Gate(gate) => {
                let edge = gate.step(value, Instant::now());
                let open = gate.is_open();
                let opened_at = gate.opened_at();
                self.shared.with_channel(id, |ch| {
                    ch.last_value = value;
                    ch.active = open;
                    ch.gate_open_at = opened_at;
                });
                if edge == Some(GateEdge::Opened) {
                    debug!("gate {} opened at {:.3}V", id, value);
                    self.router.route(InputEvent::Gate(id));
                }
            }
            ChannelTracker::Cv(cv) => match cv.step(value) {
                CvStep::Publish => {
                    self.shared.with_channel(id, |ch| {
                        ch.recent.push(value);
                        ch.last_value = value;
                        ch.active = true;
                        ch.inactivity = 0;
                    });
                    self.router.route(InputEvent::Cv(id));
                }
                CvStep::Deactivate => {
                    debug!("cv {} went inactive", id);
                    self.shared.with_channel(id, |ch| {
                        ch.active = false;
                        ch.inactivity = cv.inactivity();
                    });
                }
                CvStep::Quiet => {
                    self.shared.with_channel(id, |ch| ch.inactivity = cv.inactivity());
                }
            },
        }
    }
}
