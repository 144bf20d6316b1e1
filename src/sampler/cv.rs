//! Continuous-CV channel tracker
//!
//! Classifies each sample against the last published value. Movement beyond
//! the noise threshold publishes; sustained quiet beyond the inactivity
//! limit deactivates the channel without an event.

/// What the sampler should do after feeding one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvStep {
    /// Real movement: push the sample, publish a CV event
    Publish,
    /// Quiet sample that crossed the inactivity limit: drop the active flag
    Deactivate,
    /// Quiet sample below the limit, or already inactive: nothing to do
    Quiet,
}

#[derive(Debug)]
pub struct CvTracker {
    last_published: f32,
    inactivity: u32,
    active: bool,
    noise_threshold: f32,
    inactivity_limit: u32,
}

impl CvTracker {
    pub fn new(noise_threshold: f32, inactivity_limit: u32) -> Self {
        Self {
            // Matches the shared-state initial value, so a first sample away
            // from 0V publishes immediately.
            last_published: 0.0,
            inactivity: 0,
            active: false,
            noise_threshold,
            inactivity_limit,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn inactivity(&self) -> u32 {
        self.inactivity
    }

    pub fn last_published(&self) -> f32 {
        self.last_published
    }

    /// Feed one sample and classify it
    pub fn step(&mut self, sample: f32) -> CvStep {
        let delta = (sample - self.last_published).abs();
        if delta < self.noise_threshold {
            self.inactivity += 1;
            if self.inactivity >= self.inactivity_limit && self.active {
                self.active = false;
                return CvStep::Deactivate;
            }
            CvStep::Quiet
        } else {
            self.inactivity = 0;
            self.active = true;
            self.last_published = sample;
            CvStep::Publish
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> CvTracker {
        CvTracker::new(0.05, 5)
    }

    #[test]
    fn test_first_moving_sample_publishes() {
        let mut cv = tracker();
        assert_eq!(cv.step(1.0), CvStep::Publish);
        assert!(cv.is_active());
        assert_eq!(cv.last_published(), 1.0);
    }

    #[test]
    fn test_constant_input_deactivates_exactly_once() {
        let mut cv = tracker();
        // Six consecutive samples of 1.0: one publish, then quiet until the
        // 5th unchanged sample drops the flag.
        assert_eq!(cv.step(1.0), CvStep::Publish);
        assert_eq!(cv.step(1.0), CvStep::Quiet);
        assert_eq!(cv.step(1.0), CvStep::Quiet);
        assert_eq!(cv.step(1.0), CvStep::Quiet);
        assert_eq!(cv.step(1.0), CvStep::Quiet);
        assert_eq!(cv.step(1.0), CvStep::Deactivate);
        assert!(!cv.is_active());
        // Further quiet samples stay quiet, no second deactivation.
        assert_eq!(cv.step(1.0), CvStep::Quiet);
        assert_eq!(cv.step(1.01), CvStep::Quiet);
    }

    #[test]
    fn test_movement_resets_inactivity() {
        let mut cv = tracker();
        cv.step(1.0);
        cv.step(1.0);
        cv.step(1.0);
        assert_eq!(cv.inactivity(), 2);
        assert_eq!(cv.step(2.0), CvStep::Publish);
        assert_eq!(cv.inactivity(), 0);
    }

    #[test]
    fn test_noise_below_threshold_does_not_publish() {
        let mut cv = tracker();
        cv.step(1.0);
        // Jitter around the published value stays quiet and does not move
        // the reference point.
        assert_eq!(cv.step(1.04), CvStep::Quiet);
        assert_eq!(cv.step(0.96), CvStep::Quiet);
        assert_eq!(cv.last_published(), 1.0);
    }

    #[test]
    fn test_reactivation_after_deactivate() {
        let mut cv = tracker();
        cv.step(1.0);
        for _ in 0..5 {
            cv.step(1.0);
        }
        assert!(!cv.is_active());
        assert_eq!(cv.step(2.0), CvStep::Publish);
        assert!(cv.is_active());
    }
}
