//! Supervisor - owns shared state, wake signals, and worker lifecycles
//!
//! The worker set is fixed before `start_all()`; every worker gets the same
//! shared state handle, its own wake signal, and a child of the supervisor's
//! cancellation token. `shutdown()` cancels everyone, waits up to a timeout
//! for graceful exits, then aborts stragglers.

use crate::signal::WakeSignal;
use crate::state::SharedState;
use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything a worker run-loop receives from the supervisor
#[derive(Clone)]
pub struct WorkerCtx {
    pub shared: Arc<SharedState>,
    pub signal: Arc<WakeSignal>,
    pub cancel: CancellationToken,
}

type BoxedRunLoop =
    Box<dyn FnOnce(WorkerCtx) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send>;

struct WorkerSpec {
    name: String,
    signal: Arc<WakeSignal>,
    run: BoxedRunLoop,
}

pub struct Supervisor {
    shared: Arc<SharedState>,
    cancel: CancellationToken,
    pending: Vec<WorkerSpec>,
    running: Vec<(String, JoinHandle<Result<()>>)>,
}

impl Supervisor {
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self {
            shared,
            cancel: CancellationToken::new(),
            pending: Vec::new(),
            running: Vec::new(),
        }
    }

    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a worker run-loop with its wake signal
    pub fn register_worker<F, Fut>(&mut self, name: &str, signal: Arc<WakeSignal>, run: F)
    where
        F: FnOnce(WorkerCtx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.pending.push(WorkerSpec {
            name: name.to_string(),
            signal,
            run: Box::new(move |ctx| Box::pin(run(ctx))),
        });
    }

    pub fn worker_names(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|w| w.name.clone())
            .chain(self.running.iter().map(|(n, _)| n.clone()))
            .collect()
    }

    /// Spawn every registered worker
    pub fn start_all(&mut self) {
        for spec in self.pending.drain(..) {
            let ctx = WorkerCtx {
                shared: Arc::clone(&self.shared),
                signal: spec.signal,
                cancel: self.cancel.child_token(),
            };
            info!("starting worker: {}", spec.name);
            let handle = tokio::spawn((spec.run)(ctx));
            self.running.push((spec.name, handle));
        }
    }

    /// Wait for every worker to finish on its own
    pub async fn join_all(&mut self) -> Result<()> {
        for (name, handle) in self.running.drain(..) {
            match handle.await {
                Ok(Ok(())) => info!("worker {} exited cleanly", name),
                Ok(Err(e)) => warn!("worker {} exited with error: {:#}", name, e),
                Err(e) => warn!("worker {} panicked: {}", name, e),
            }
        }
        Ok(())
    }

    /// Cancel every worker, wait up to `timeout` for graceful exits, then
    /// abort whatever is still running
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        info!("shutting down {} workers", self.running.len());
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, mut handle) in self.running.drain(..) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(Ok(()))) => info!("worker {} stopped", name),
                Ok(Ok(Err(e))) => warn!("worker {} stopped with error: {:#}", name, e),
                Ok(Err(e)) => warn!("worker {} panicked during shutdown: {}", name, e),
                Err(_) => {
                    warn!("worker {} did not stop in time, aborting", name);
                    handle.abort();
                }
            }
        }
        info!("shutdown complete");
        Ok(())
    }
}
