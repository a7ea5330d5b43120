use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Match-confidence threshold shared between the UI and the recognition thread.
///
/// Stored as the bit pattern of an `f64` in an atomic. Readers may observe a
/// value that is one write stale; no ordering with other memory is implied.
#[derive(Clone, Debug)]
pub struct SharedThreshold {
    bits: Arc<AtomicU64>,
}

impl SharedThreshold {
    pub fn new(value: f64) -> Self {
        let threshold = Self {
            bits: Arc::new(AtomicU64::new(0.0f64.to_bits())),
        };
        threshold.set(value);
        threshold
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Stores `value` clamped to `[0, 1]`. NaN is ignored.
    pub fn set(&self, value: f64) {
        if value.is_nan() {
            log::warn!("Ignoring NaN match threshold");
            return;
        }
        self.bits
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Whether a match with `confidence` clears the current threshold.
    pub fn accepts(&self, confidence: f64) -> bool {
        confidence >= self.get()
    }
}

impl Default for SharedThreshold {
    fn default() -> Self {
        Self::new(crate::shared::constants::DEFAULT_MATCH_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_new_stores_value() {
        assert_relative_eq!(SharedThreshold::new(0.42).get(), 0.42);
    }

    #[test]
    fn test_default_threshold() {
        assert_relative_eq!(SharedThreshold::default().get(), 0.5);
    }

    #[rstest]
    #[case::below_range(-0.3, 0.0)]
    #[case::above_range(1.7, 1.0)]
    #[case::in_range(0.75, 0.75)]
    fn test_set_clamps(#[case] input: f64, #[case] expected: f64) {
        let t = SharedThreshold::new(0.5);
        t.set(input);
        assert_relative_eq!(t.get(), expected);
    }

    #[test]
    fn test_nan_is_ignored() {
        let t = SharedThreshold::new(0.6);
        t.set(f64::NAN);
        assert_relative_eq!(t.get(), 0.6);
    }

    #[test]
    fn test_clones_share_value() {
        let ui = SharedThreshold::new(0.5);
        let worker = ui.clone();
        ui.set(0.9);
        assert_relative_eq!(worker.get(), 0.9);
    }

    #[test]
    fn test_write_visible_from_other_thread() {
        let t = SharedThreshold::new(0.1);
        let reader = t.clone();
        std::thread::spawn(move || reader.set(0.8)).join().unwrap();
        assert_relative_eq!(t.get(), 0.8);
    }

    #[test]
    fn test_raising_threshold_only_turns_matches_unknown() {
        let confidences = [0.0, 0.2, 0.45, 0.5, 0.51, 0.8, 1.0];
        let thresholds = [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0];
        let t = SharedThreshold::new(0.0);
        for &c in &confidences {
            let mut previously_accepted = true;
            for &th in &thresholds {
                t.set(th);
                let accepted = t.accepts(c);
                assert!(
                    previously_accepted || !accepted,
                    "confidence {c} became identified when threshold rose to {th}"
                );
                previously_accepted = accepted;
            }
        }
    }
}
