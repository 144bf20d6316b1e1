//! Audio consumer worker and synthesis model registry
//!
//! The worker warms the model up, then sleeps on its wake signal. On each
//! wake it clears the signal first, then drains the pending slot and hands
//! the event (plus the channel's recent-sample window for CV moves) to the
//! model. The neural models themselves live outside this crate and register
//! through [`ModelRegistry`].

use crate::state::{Consumer, InputEvent};
use crate::supervisor::WorkerCtx;
use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Audio worker modes published to the shared state
pub mod mode {
    pub const STARTUP: u32 = 0;
    pub const IDLE: u32 = 1;
    pub const HANDLING: u32 = 2;
}

/// Synthesis backend consuming canonical input events
pub trait SynthModel: Send + std::fmt::Debug {
    fn name(&self) -> &str;

    /// One-time warm-up pass before the worker goes idle; the first
    /// inference on an accelerator is far slower than the rest
    fn warm_up(&mut self) -> Result<()>;

    fn handle_gate(&mut self, channel: usize) -> Result<()>;

    fn handle_cv(&mut self, channel: usize, window: &[f32]) -> Result<()>;
}

type ModelCtor = Box<dyn Fn() -> Box<dyn SynthModel> + Send + Sync>;

/// Name-to-constructor registry, resolved once at startup
pub struct ModelRegistry {
    constructors: HashMap<String, ModelCtor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the models this crate ships
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("bypass", || Box::new(BypassModel::default()));
        registry
    }

    pub fn register<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Box<dyn SynthModel> + Send + Sync + 'static,
    {
        self.constructors.insert(name.to_string(), Box::new(ctor));
    }

    /// Instantiate the named model; unknown names are a fatal config error
    pub fn resolve(&self, name: &str) -> Result<Box<dyn SynthModel>> {
        match self.constructors.get(name) {
            Some(ctor) => Ok(ctor()),
            None => {
                let mut known: Vec<&str> = self.constructors.keys().map(|s| s.as_str()).collect();
                known.sort_unstable();
                bail!("unknown audio model '{}' (registered: {})", name, known.join(", "))
            }
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Model that only logs; useful without synthesis hardware attached
#[derive(Debug, Default)]
pub struct BypassModel;

impl SynthModel for BypassModel {
    fn name(&self) -> &str {
        "bypass"
    }

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn handle_gate(&mut self, channel: usize) -> Result<()> {
        debug!("bypass: gate {} opened", channel);
        Ok(())
    }

    fn handle_cv(&mut self, channel: usize, window: &[f32]) -> Result<()> {
        debug!("bypass: cv {} moved, window of {} samples", channel, window.len());
        Ok(())
    }
}

/// Audio consumer run-loop
pub async fn run(ctx: WorkerCtx, mut model: Box<dyn SynthModel>) -> Result<()> {
    info!("warming up model '{}'", model.name());
    ctx.shared.set_mode(Consumer::Audio, mode::STARTUP);
    model.warm_up()?;
    ctx.shared.set_mode(Consumer::Audio, mode::IDLE);
    info!("audio ready");

    loop {
        match ctx.signal.wait(&ctx.cancel).await {
            crate::signal::WakeReason::Canceled => break,
            crate::signal::WakeReason::Woken => {}
        }
        // Clear before re-reading state; a set() racing in here is kept for
        // the next wait.
        ctx.signal.clear();

        while let Some(event) = ctx.shared.consume_event(Consumer::Audio) {
            ctx.shared.set_mode(Consumer::Audio, mode::HANDLING);
            let outcome = match event {
                InputEvent::Gate(channel) => model.handle_gate(channel),
                InputEvent::Cv(channel) => {
                    let window = ctx.shared.buffer_snapshot(channel);
                    model.handle_cv(channel, &window)
                }
                other => {
                    debug!("audio worker ignoring {:?}", other);
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                warn!("model '{}' failed on {:?}: {:#}", model.name(), event, e);
            }
            ctx.shared.set_mode(Consumer::Audio, mode::IDLE);
        }
    }

    info!("audio worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelKind;
    use crate::signal::WakeSignal;
    use crate::state::SharedState;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        WarmedUp,
        Gate(usize),
        Cv(usize, Vec<f32>),
    }

    #[derive(Debug)]
    struct RecordingModel {
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl SynthModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }
        fn warm_up(&mut self) -> Result<()> {
            self.seen.lock().push(Seen::WarmedUp);
            Ok(())
        }
        fn handle_gate(&mut self, channel: usize) -> Result<()> {
            self.seen.lock().push(Seen::Gate(channel));
            Ok(())
        }
        fn handle_cv(&mut self, channel: usize, window: &[f32]) -> Result<()> {
            self.seen.lock().push(Seen::Cv(channel, window.to_vec()));
            Ok(())
        }
    }

    fn ctx() -> (WorkerCtx, CancellationToken) {
        let shared = Arc::new(SharedState::new(&[ChannelKind::Gate, ChannelKind::Cv], 4));
        let cancel = CancellationToken::new();
        (
            WorkerCtx {
                shared,
                signal: Arc::new(WakeSignal::new()),
                cancel: cancel.clone(),
            },
            cancel,
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_worker_warms_up_and_goes_idle() {
        let (ctx, cancel) = ctx();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = Box::new(RecordingModel { seen: seen.clone() });

        let worker = tokio::spawn(run(ctx.clone(), model));
        settle().await;
        assert_eq!(ctx.shared.mode(Consumer::Audio), mode::IDLE);
        assert_eq!(seen.lock().as_slice(), &[Seen::WarmedUp]);

        cancel.cancel();
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_dispatches_gate_and_cv() {
        let (ctx, cancel) = ctx();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = Box::new(RecordingModel { seen: seen.clone() });
        let worker = tokio::spawn(run(ctx.clone(), model));
        settle().await;

        ctx.shared.publish_event(Consumer::Audio, InputEvent::Gate(0));
        ctx.signal.set();
        settle().await;

        ctx.shared.push_sample(1, 0.25);
        ctx.shared.push_sample(1, 0.75);
        ctx.shared.publish_event(Consumer::Audio, InputEvent::Cv(1));
        ctx.signal.set();
        settle().await;

        cancel.cancel();
        worker.await.unwrap().unwrap();

        let seen = seen.lock();
        assert_eq!(
            seen.as_slice(),
            &[
                Seen::WarmedUp,
                Seen::Gate(0),
                Seen::Cv(1, vec![0.25, 0.75]),
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_drains_overwritten_slot_once() {
        let (ctx, cancel) = ctx();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = Box::new(RecordingModel { seen: seen.clone() });
        let worker = tokio::spawn(run(ctx.clone(), model));
        settle().await;

        // Two publishes before the worker wakes: level slot, last wins.
        ctx.shared.publish_event(Consumer::Audio, InputEvent::Gate(0));
        ctx.signal.set();
        ctx.shared.publish_event(Consumer::Audio, InputEvent::Gate(1));
        ctx.signal.set();
        settle().await;

        cancel.cancel();
        worker.await.unwrap().unwrap();

        let gates: Vec<_> = seen
            .lock()
            .iter()
            .filter(|s| matches!(s, Seen::Gate(_)))
            .cloned()
            .collect();
        assert_eq!(gates, vec![Seen::Gate(1)]);
    }

    #[test]
    fn test_registry_resolves_builtin() {
        let registry = ModelRegistry::with_builtins();
        let model = registry.resolve("bypass").unwrap();
        assert_eq!(model.name(), "bypass");
    }

    #[test]
    fn test_registry_rejects_unknown_model() {
        let registry = ModelRegistry::with_builtins();
        let err = registry.resolve("ddsp").unwrap_err();
        assert!(err.to_string().contains("unknown audio model"));
    }

    #[test]
    fn test_registry_accepts_custom_model() {
        let mut registry = ModelRegistry::with_builtins();
        registry.register("null", || Box::new(BypassModel::default()));
        assert!(registry.resolve("null").is_ok());
    }
}
