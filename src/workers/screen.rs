//! Screen consumer worker
//!
//! Sleeps on its wake signal, re-reads shared state on wake, and pushes a
//! render to the display seam. Button presses cycle pages, rotary turns move
//! the selection on the current page. Actual panel drawing is behind the
//! [`Display`] trait.

use crate::hardware::Display;
use crate::state::{Consumer, InputEvent};
use crate::supervisor::WorkerCtx;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Number of menu pages cycled by the button
pub const NUM_PAGES: u32 = 3;

pub async fn run(ctx: WorkerCtx, display: Arc<dyn Display>) -> Result<()> {
    let mut selection: i32 = 0;
    info!("screen ready");

    loop {
        match ctx.signal.wait(&ctx.cancel).await {
            crate::signal::WakeReason::Canceled => break,
            crate::signal::WakeReason::Woken => {}
        }
        ctx.signal.clear();

        while let Some(event) = ctx.shared.consume_event(Consumer::Screen) {
            match event {
                InputEvent::ButtonPress => {
                    let page = (ctx.shared.mode(Consumer::Screen) + 1) % NUM_PAGES;
                    ctx.shared.set_mode(Consumer::Screen, page);
                    selection = 0;
                }
                InputEvent::RotaryTurn(delta) => {
                    selection += delta;
                }
                other => {
                    warn!("screen worker ignoring {:?}", other);
                }
            }
            let page = ctx.shared.mode(Consumer::Screen);
            let line = format!("page {} / sel {}", page, selection);
            if let Err(e) = display.render(page, &line).await {
                warn!("display render failed: {}", e);
            }
        }
    }

    info!("screen worker stopped");
    Ok(())
}
