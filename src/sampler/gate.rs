//! Gate channel state machine
//!
//! Two states, Closed and Open, with hysteresis between `high_threshold` and
//! `low_threshold` plus a minimum dwell time before a close is accepted.
//! Only the open edge is notified; closing updates state silently.

use std::time::{Duration, Instant};

/// Transition reported by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEdge {
    Opened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
}

#[derive(Debug)]
pub struct GateTracker {
    state: GateState,
    opened_at: Option<Instant>,
    high_threshold: f32,
    low_threshold: f32,
    min_gate_width: Duration,
}

impl GateTracker {
    pub fn new(high_threshold: f32, low_threshold: f32, min_gate_width: Duration) -> Self {
        Self {
            state: GateState::Closed,
            opened_at: None,
            high_threshold,
            low_threshold,
            min_gate_width,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::Open
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    /// Feed one sample taken at `now`; returns the edge to notify, if any
    pub fn step(&mut self, sample: f32, now: Instant) -> Option<GateEdge> {
        match self.state {
            GateState::Closed => {
                if sample > self.high_threshold {
                    self.state = GateState::Open;
                    self.opened_at = Some(now);
                    return Some(GateEdge::Opened);
                }
                None
            }
            GateState::Open => {
                // Close only below the low threshold and after the minimum
                // dwell time; a single dip never flaps the gate.
                let opened_at = self.opened_at.unwrap_or(now);
                if sample < self.low_threshold
                    && now.duration_since(opened_at) >= self.min_gate_width
                {
                    self.state = GateState::Closed;
                    self.opened_at = None;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> GateTracker {
        GateTracker::new(2.5, 2.0, Duration::from_millis(50))
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_open_edge_emitted_once_at_crossing() {
        let mut gate = tracker();
        let base = Instant::now();

        assert_eq!(gate.step(0.0, at(base, 0)), None);
        assert_eq!(gate.step(0.0, at(base, 10)), None);
        assert_eq!(gate.step(3.0, at(base, 20)), Some(GateEdge::Opened));
        // Staying high emits nothing further.
        assert_eq!(gate.step(3.0, at(base, 40)), None);
        assert!(gate.is_open());
    }

    #[test]
    fn test_close_requires_min_width() {
        let mut gate = tracker();
        let base = Instant::now();

        gate.step(3.0, at(base, 20));
        // Drop below low threshold too early: still open.
        gate.step(0.0, at(base, 40));
        assert!(gate.is_open());
        // 60ms elapsed >= 50ms: close accepted, silently.
        assert_eq!(gate.step(0.0, at(base, 80)), None);
        assert!(!gate.is_open());
    }

    #[test]
    fn test_hysteresis_band_keeps_gate_open() {
        let mut gate = tracker();
        let base = Instant::now();

        gate.step(3.0, at(base, 0));
        // 2.2V is below high but above low: no close, however long we dwell.
        gate.step(2.2, at(base, 200));
        assert!(gate.is_open());
    }

    #[test]
    fn test_reopen_after_close_emits_again() {
        let mut gate = tracker();
        let base = Instant::now();

        assert_eq!(gate.step(3.0, at(base, 0)), Some(GateEdge::Opened));
        gate.step(0.0, at(base, 60));
        assert!(!gate.is_open());
        assert_eq!(gate.step(3.0, at(base, 70)), Some(GateEdge::Opened));
    }

    #[test]
    fn test_value_in_band_does_not_open() {
        let mut gate = tracker();
        let base = Instant::now();
        assert_eq!(gate.step(2.2, at(base, 0)), None);
        assert!(!gate.is_open());
    }
}
