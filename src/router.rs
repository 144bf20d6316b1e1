//! Event router - publishes canonical events and wakes the target consumer
//!
//! The publish-then-signal pair runs under a lock scoped to the target
//! consumer, so concurrent routes from different channels cannot interleave
//! a partial write. The pending slot is level state: last writer wins, and
//! consumers re-read full shared state on every wake.

use crate::signal::WakeSignal;
use crate::state::{Consumer, InputEvent, SharedState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

struct RouteTarget {
    signal: Arc<WakeSignal>,
    publish_lock: Mutex<()>,
}

impl RouteTarget {
    fn new(signal: Arc<WakeSignal>) -> Self {
        Self {
            signal,
            publish_lock: Mutex::new(()),
        }
    }
}

pub struct EventRouter {
    shared: Arc<SharedState>,
    audio: RouteTarget,
    screen: RouteTarget,
}

impl EventRouter {
    pub fn new(
        shared: Arc<SharedState>,
        audio_signal: Arc<WakeSignal>,
        screen_signal: Arc<WakeSignal>,
    ) -> Self {
        Self {
            shared,
            audio: RouteTarget::new(audio_signal),
            screen: RouteTarget::new(screen_signal),
        }
    }

    /// Consumer an event is addressed to
    fn target_for(event: &InputEvent) -> Consumer {
        match event {
            InputEvent::Gate(_) | InputEvent::Cv(_) => Consumer::Audio,
            InputEvent::ButtonPress | InputEvent::RotaryTurn(_) => Consumer::Screen,
        }
    }

    /// Publish the event into the target consumer's slot and wake it
    pub fn route(&self, event: InputEvent) {
        let consumer = Self::target_for(&event);
        let target = match consumer {
            Consumer::Audio => &self.audio,
            Consumer::Screen => &self.screen,
        };
        let _serialize = target.publish_lock.lock();
        trace!("route {:?} -> {}", event, consumer.name());
        self.shared.publish_event(consumer, event);
        target.signal.set();
    }
}
