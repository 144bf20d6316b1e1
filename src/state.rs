//! Shared rack state - per-channel sample state and per-consumer event slots
//!
//! One `SharedState` is built by the supervisor at startup and handed to every
//! worker. Fields are partitioned so each channel and each consumer slot sits
//! behind its own short-lived lock; unrelated channels never contend and no
//! reader ever observes a partially-written channel record.

use crate::config::ChannelKind;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Canonical event published to a consumer slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Gate channel opened (open edges only are notified)
    Gate(usize),
    /// CV channel moved; the channel's recent-sample window holds the data
    Cv(usize),
    /// Front-panel push button pressed
    ButtonPress,
    /// Rotary encoder turned by the given number of detents
    RotaryTurn(i32),
}

/// Event consumers with a mode/event slot in the shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consumer {
    Audio,
    Screen,
}

impl Consumer {
    pub fn all() -> &'static [Consumer] {
        &[Consumer::Audio, Consumer::Screen]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Consumer::Audio => "audio",
            Consumer::Screen => "screen",
        }
    }
}

/// Fixed-capacity FIFO window over the most recent samples of one channel
#[derive(Debug, Clone)]
pub struct RecentBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl RecentBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "recent buffer capacity must be >= 1");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a sample, evicting the oldest one once at capacity
    pub fn push(&mut self, sample: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the window contents in arrival order, oldest first
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
}

/// State of one physical input channel
///
/// Mutated only by the sampler loop that owns the channel; read by the
/// router and the audio consumer.
#[derive(Debug)]
pub struct ChannelState {
    pub id: usize,
    pub kind: ChannelKind,
    pub last_value: f32,
    pub active: bool,
    /// Set once hardware reads for this channel exhaust their retries;
    /// the value stays frozen from then on
    pub degraded: bool,
    pub gate_open_at: Option<Instant>,
    pub recent: RecentBuffer,
    pub inactivity: u32,
}

impl ChannelState {
    fn new(id: usize, kind: ChannelKind, buffer_capacity: usize) -> Self {
        Self {
            id,
            kind,
            last_value: 0.0,
            active: false,
            degraded: false,
            gate_open_at: None,
            recent: RecentBuffer::new(buffer_capacity),
            inactivity: 0,
        }
    }
}

#[derive(Debug, Default)]
struct ConsumerSlot {
    mode: u32,
    pending: Option<InputEvent>,
}

/// Process-wide shared state, allocated once by the supervisor
pub struct SharedState {
    channels: Vec<Mutex<ChannelState>>,
    consumers: HashMap<Consumer, Mutex<ConsumerSlot>>,
}

impl SharedState {
    /// Build the state for a fixed channel layout; ids are dense in
    /// `[0, kinds.len())` and never renumbered afterwards
    pub fn new(kinds: &[ChannelKind], buffer_capacity: usize) -> Self {
        let channels = kinds
            .iter()
            .enumerate()
            .map(|(id, kind)| Mutex::new(ChannelState::new(id, *kind, buffer_capacity)))
            .collect();
        let consumers = Consumer::all()
            .iter()
            .map(|c| (*c, Mutex::new(ConsumerSlot::default())))
            .collect();
        Self {
            channels,
            consumers,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// An out-of-range id is a construction bug, not a transient condition
    fn channel(&self, id: usize) -> &Mutex<ChannelState> {
        self.channels
            .get(id)
            .unwrap_or_else(|| panic!("channel id {} out of range (have {})", id, self.channels.len()))
    }

    fn consumer(&self, consumer: Consumer) -> &Mutex<ConsumerSlot> {
        self.consumers
            .get(&consumer)
            .unwrap_or_else(|| panic!("consumer {:?} has no slot", consumer))
    }

    /// Run a closure under the channel's lock for compound read-modify-write
    pub fn with_channel<R>(&self, id: usize, f: impl FnOnce(&mut ChannelState) -> R) -> R {
        f(&mut self.channel(id).lock())
    }

    pub fn kind(&self, id: usize) -> ChannelKind {
        self.channel(id).lock().kind
    }

    pub fn value(&self, id: usize) -> f32 {
        self.channel(id).lock().last_value
    }

    pub fn set_value(&self, id: usize, value: f32) {
        self.channel(id).lock().last_value = value;
    }

    pub fn is_active(&self, id: usize) -> bool {
        self.channel(id).lock().active
    }

    pub fn set_active(&self, id: usize, active: bool) {
        self.channel(id).lock().active = active;
    }

    pub fn is_degraded(&self, id: usize) -> bool {
        self.channel(id).lock().degraded
    }

    /// Insert a sample into the channel's recent window, evicting the oldest
    pub fn push_sample(&self, id: usize, sample: f32) {
        self.channel(id).lock().recent.push(sample);
    }

    /// Copy of the channel's recent window, oldest first
    pub fn buffer_snapshot(&self, id: usize) -> Vec<f32> {
        self.channel(id).lock().recent.snapshot()
    }

    /// Overwrite the consumer's pending event slot (level state, not a queue;
    /// last writer wins)
    pub fn publish_event(&self, consumer: Consumer, event: InputEvent) {
        self.consumer(consumer).lock().pending = Some(event);
    }

    /// Read and reset the consumer's pending event slot
    pub fn consume_event(&self, consumer: Consumer) -> Option<InputEvent> {
        self.consumer(consumer).lock().pending.take()
    }

    pub fn mode(&self, consumer: Consumer) -> u32 {
        self.consumer(consumer).lock().mode
    }

    pub fn set_mode(&self, consumer: Consumer, mode: u32) {
        self.consumer(consumer).lock().mode = mode;
    }
}
