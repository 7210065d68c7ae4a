// rover_core/src/state/history.rs

use crate::error::RoverError;

/// Value stored in slots that have never been written, and the `x` written
/// over a slot to invalidate it after a stuck recovery.
pub const SENTINEL: f64 = -1.0;

/// One per-second snapshot used by stuck and rounds detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub x: f64,
    pub y: f64,
    /// The steering command in force when the sample was taken, degrees.
    pub steer: f64,
}

impl HistorySample {
    const UNSET: Self = Self {
        x: SENTINEL,
        y: SENTINEL,
        steer: SENTINEL,
    };
}

/// Fixed-capacity ring of position samples bucketed by whole elapsed seconds.
///
/// The slot for a timestamp is `floor(t) mod len`, so every tick within the
/// same second overwrites the same slot, and a new second overwrites the
/// sample taken `len` seconds earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionHistory {
    slots: Vec<HistorySample>,
}

impl PositionHistory {
    pub fn new(window_seconds: usize) -> Result<Self, RoverError> {
        if window_seconds == 0 {
            return Err(RoverError::InvalidConfig(
                "position history needs at least one slot".into(),
            ));
        }
        Ok(Self {
            slots: vec![HistorySample::UNSET; window_seconds],
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index that `timestamp` (seconds) falls into.
    pub fn slot_for(&self, timestamp: f64) -> usize {
        let second = timestamp.floor() as i64;
        second.rem_euclid(self.slots.len() as i64) as usize
    }

    /// Records `sample` for `timestamp` and returns the slot written.
    pub fn push(&mut self, timestamp: f64, sample: HistorySample) -> usize {
        let slot = self.slot_for(timestamp);
        self.slots[slot] = sample;
        slot
    }

    /// Marks `slot` as not matching any real position.
    pub fn invalidate(&mut self, slot: usize) {
        if let Some(sample) = self.slots.get_mut(slot) {
            sample.x = SENTINEL;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.slots.iter()
    }

    /// True when every slot lies within `tolerance` of `(x, y)` on both axes.
    pub fn all_near(&self, x: f64, y: f64, tolerance: f64) -> bool {
        self.slots
            .iter()
            .all(|s| (s.x - x).abs() < tolerance && (s.y - y).abs() < tolerance)
    }

    /// True when every slot holds exactly `+limit`, or every slot exactly `-limit`.
    pub fn steer_saturated(&self, limit: f64) -> bool {
        let all_equal = |target: f64| self.slots.iter().all(|s| s.steer == target);
        all_equal(limit) || all_equal(-limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64, steer: f64) -> HistorySample {
        HistorySample { x, y, steer }
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(PositionHistory::new(0).is_err());
    }

    #[test]
    fn test_slot_is_whole_second_modulo_length() {
        let h = PositionHistory::new(7).unwrap();
        assert_eq!(h.slot_for(0.0), 0);
        assert_eq!(h.slot_for(6.99), 6);
        assert_eq!(h.slot_for(7.0), 0);
        assert_eq!(h.slot_for(23.5), 2);
        assert_eq!(h.slot_for(-0.5), 6);
    }

    #[test]
    fn test_push_within_a_second_overwrites() {
        let mut h = PositionHistory::new(3).unwrap();
        h.push(1.1, sample(1.0, 1.0, 0.0));
        h.push(1.9, sample(2.0, 2.0, 0.0));
        let samples: Vec<_> = h.iter().copied().collect();
        assert_eq!(samples[1], sample(2.0, 2.0, 0.0));
        assert_eq!(samples[0].x, SENTINEL);
    }

    #[test]
    fn test_fresh_history_is_not_near_the_origin() {
        let h = PositionHistory::new(7).unwrap();
        assert!(!h.all_near(0.0, 0.0, 0.05));
        assert!(!h.steer_saturated(15.0));
    }

    #[test]
    fn test_all_near_needs_every_slot() {
        let mut h = PositionHistory::new(3).unwrap();
        h.push(0.0, sample(10.0, 10.0, 0.0));
        h.push(1.0, sample(10.01, 9.99, 0.0));
        assert!(!h.all_near(10.0, 10.0, 0.05));
        h.push(2.0, sample(10.02, 10.0, 0.0));
        assert!(h.all_near(10.0, 10.0, 0.05));
        h.invalidate(2);
        assert!(!h.all_near(10.0, 10.0, 0.05));
    }

    #[test]
    fn test_steer_saturation_is_one_sided() {
        let mut h = PositionHistory::new(2).unwrap();
        h.push(0.0, sample(0.0, 0.0, 15.0));
        h.push(1.0, sample(0.0, 0.0, -15.0));
        assert!(!h.steer_saturated(15.0));
        h.push(1.0, sample(0.0, 0.0, 15.0));
        assert!(h.steer_saturated(15.0));
        h.push(0.0, sample(0.0, 0.0, -15.0));
        h.push(1.0, sample(0.0, 0.0, -15.0));
        assert!(h.steer_saturated(15.0));
        h.push(1.0, sample(0.0, 0.0, -14.9));
        assert!(!h.steer_saturated(15.0));
    }
}
