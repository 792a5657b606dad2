//! Stepped gain ramps for outputs without native gain automation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of steps in a ramp.
pub(crate) const RAMP_STEPS: u32 = 10;

/// Gain after `step` of [`RAMP_STEPS`] on a geometric ramp from `from` to
/// `target`.
pub(crate) fn ramp_gain_at(from: f32, target: f32, step: u32) -> f32 {
    if step >= RAMP_STEPS {
        return target;
    }
    from * (target / from).powf(step as f32 / RAMP_STEPS as f32)
}

/// Shared counter that invalidates older ramps when a newer one begins.
#[derive(Debug, Clone, Default)]
pub(crate) struct RampGeneration(Arc<AtomicU64>);

impl RampGeneration {
    /// Cancel any running ramp and return the token for a new one.
    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cancel any running ramp.
    pub fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.0.load(Ordering::SeqCst) == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ramp_supersedes_older() {
        let generation = RampGeneration::default();
        let first = generation.begin();
        assert!(generation.is_current(first));

        let ramp_thread_view = generation.clone();
        let second = generation.begin();
        assert!(!ramp_thread_view.is_current(first));
        assert!(ramp_thread_view.is_current(second));

        generation.cancel();
        assert!(!ramp_thread_view.is_current(second));
    }

    #[test]
    fn ramp_is_geometric_and_lands_on_target() {
        assert_eq!(ramp_gain_at(0.1, 0.9, 0), 0.1);
        assert_eq!(ramp_gain_at(0.1, 0.9, RAMP_STEPS), 0.9);
        let mid = ramp_gain_at(0.1, 0.9, RAMP_STEPS / 2);
        assert!((mid - 0.3).abs() < 1e-4);
        let falling: Vec<f32> = (0..=RAMP_STEPS).map(|i| ramp_gain_at(0.8, 0.001, i)).collect();
        assert!(falling.windows(2).all(|w| w[1] < w[0]));
    }
}
