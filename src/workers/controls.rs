//! Button and rotary producer workers
//!
//! One polling component for both front-panel controls; each routes its
//! edges through the [`EventRouter`] like any other input source. Read
//! failures are logged and polling continues; a stuck control is never
//! fatal to the process.

use crate::config::ControlsConfig;
use crate::hardware::{ButtonReader, RotaryReader};
use crate::router::EventRouter;
use crate::state::InputEvent;
use crate::supervisor::WorkerCtx;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Poll the push button, routing one event per debounced rising edge
pub async fn run_button(
    ctx: WorkerCtx,
    reader: Arc<dyn ButtonReader>,
    router: Arc<EventRouter>,
    config: ControlsConfig,
) -> Result<()> {
    let poll = Duration::from_millis(config.poll_period_ms);
    let debounce = Duration::from_millis(config.button_debounce_ms);
    let mut was_pressed = false;
    let mut last_press: Option<Instant> = None;
    info!("button worker started");

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }
        match reader.is_pressed().await {
            Ok(pressed) => {
                let now = Instant::now();
                let debounced = last_press
                    .map(|t| now.duration_since(t) < debounce)
                    .unwrap_or(false);
                if pressed && !was_pressed && !debounced {
                    debug!("button pressed");
                    last_press = Some(now);
                    router.route(InputEvent::ButtonPress);
                }
                was_pressed = pressed;
            }
            Err(e) => warn!("button read failed: {}", e),
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = ctx.cancel.cancelled() => break,
        }
    }

    info!("button worker stopped");
    Ok(())
}

/// Poll the rotary encoder, routing accumulated detents as turn events
pub async fn run_rotary(
    ctx: WorkerCtx,
    reader: Arc<dyn RotaryReader>,
    router: Arc<EventRouter>,
    config: ControlsConfig,
) -> Result<()> {
    let poll = Duration::from_millis(config.poll_period_ms);
    info!("rotary worker started");

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }
        match reader.read_delta().await {
            Ok(0) => {}
            Ok(delta) => {
                debug!("rotary turned by {}", delta);
                router.route(InputEvent::RotaryTurn(delta));
            }
            Err(e) => warn!("rotary read failed: {}", e),
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = ctx.cancel.cancelled() => break,
        }
    }

    info!("rotary worker stopped");
    Ok(())
}
