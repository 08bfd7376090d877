//! Arm-raise repetition counting.
//!
//! A two-state machine driven by the vertical distance between elbow and shoulder: raising the
//! elbow more than [`UP_MARGIN`] pixels above the shoulder completes a repetition, lowering it
//! below the shoulder re-arms the counter. The band between the two thresholds is a dead zone
//! that keeps jitter near the boundary from producing phantom repetitions.

use crate::pose::landmark::{LandmarkIdx, LandmarkResult};

/// How far (in pixels) the elbow has to rise above the shoulder to count as "arm up".
///
/// Tuned for a 1280x720 camera frame. The margin is only applied to the up-transition; the
/// down-transition compares the raw coordinates, which widens the hysteresis band.
pub const UP_MARGIN: f32 = 40.0;

/// The two-state position estimate used to detect one repetition per raise/lower cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The elbow is below the shoulder (or has not yet risen past the margin).
    #[default]
    ArmDown,
    /// The elbow was seen more than [`UP_MARGIN`] pixels above the shoulder.
    ArmUp,
}

/// Phase and repetition count, advanced by a pure transition function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    phase: Phase,
    count: u64,
}

impl CounterState {
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the number of completed repetitions.
    ///
    /// Monotonically non-decreasing: each `ArmDown -> ArmUp` transition adds exactly 1.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Advances the state machine by one observation.
    ///
    /// `shoulder_y` and `elbow_y` are pixel coordinates (Y pointing down). Evaluated in order:
    ///
    /// 1. `ArmDown` and `elbow_y + UP_MARGIN < shoulder_y` -> `ArmUp`, count += 1.
    /// 2. Otherwise, `elbow_y > shoulder_y` -> `ArmDown`.
    /// 3. Otherwise, nothing changes.
    #[must_use]
    pub fn advance(self, shoulder_y: f32, elbow_y: f32) -> CounterState {
        if self.phase == Phase::ArmDown && elbow_y + UP_MARGIN < shoulder_y {
            CounterState {
                phase: Phase::ArmUp,
                count: self.count + 1,
            }
        } else if elbow_y > shoulder_y {
            CounterState {
                phase: Phase::ArmDown,
                ..self
            }
        } else {
            self
        }
    }
}

/// The four arm landmarks consumed per frame.
///
/// Only the right pair drives the state machine; the left pair is carried along so that the
/// overlay can highlight all four.
#[derive(Debug, Clone, Copy)]
pub struct ArmLandmarks {
    pub left_shoulder: [f32; 2],
    pub right_shoulder: [f32; 2],
    pub left_elbow: [f32; 2],
    pub right_elbow: [f32; 2],
}

impl ArmLandmarks {
    /// Extracts the arm landmarks from a pose estimation result.
    pub fn from_pose(pose: &LandmarkResult) -> Self {
        let point = |idx: LandmarkIdx| {
            let lm = pose.get(idx);
            [lm.x(), lm.y()]
        };

        Self {
            left_shoulder: point(LandmarkIdx::LeftShoulder),
            right_shoulder: point(LandmarkIdx::RightShoulder),
            left_elbow: point(LandmarkIdx::LeftElbow),
            right_elbow: point(LandmarkIdx::RightElbow),
        }
    }

    /// Returns all four landmark positions, for drawing.
    pub fn points(&self) -> [[f32; 2]; 4] {
        [
            self.left_shoulder,
            self.right_shoulder,
            self.left_elbow,
            self.right_elbow,
        ]
    }
}

/// Counts arm-raise repetitions across frames.
///
/// Frames without a detected pose simply don't call [`RepCounter::update`], which leaves the
/// state untouched.
#[derive(Debug, Default)]
pub struct RepCounter {
    state: CounterState,
}

impl RepCounter {
    /// Creates a new counter, starting in [`Phase::ArmDown`] with a count of 0.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.state.count()
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Feeds one frame's arm landmarks into the state machine.
    ///
    /// Returns `true` if this observation completed a repetition.
    pub fn update(&mut self, arms: &ArmLandmarks) -> bool {
        let prev = self.state;
        self.state = prev.advance(arms.right_shoulder[1], arms.right_elbow[1]);

        if self.state.count() > prev.count() {
            log::debug!("arm up, rep #{}", self.state.count());
            true
        } else {
            if prev.phase() == Phase::ArmUp && self.state.phase() == Phase::ArmDown {
                log::debug!("arm down");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arms(shoulder_y: f32, elbow_y: f32) -> ArmLandmarks {
        // The left arm is placed at rest so that it would never trigger a count even if it were
        // (incorrectly) consulted.
        ArmLandmarks {
            left_shoulder: [900.0, shoulder_y],
            right_shoulder: [400.0, shoulder_y],
            left_elbow: [920.0, shoulder_y + 200.0],
            right_elbow: [420.0, elbow_y],
        }
    }

    #[test]
    fn starts_down_at_zero() {
        let counter = RepCounter::new();
        assert_eq!(counter.phase(), Phase::ArmDown);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn no_person_at_startup_leaves_state_unchanged() {
        // Frames without landmarks never call `update`; the state must be the initial one no
        // matter how long that takes.
        let counter = RepCounter::new();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.phase(), Phase::ArmDown);
    }

    #[test]
    fn elbow_at_shoulder_height_is_no_transition() {
        let mut counter = RepCounter::new();
        assert!(!counter.update(&arms(300.0, 300.0)));
        assert_eq!(counter.phase(), Phase::ArmDown);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn elbow_exactly_at_margin_is_no_transition() {
        // 260 + 40 == 300 fails the strict comparison.
        let mut counter = RepCounter::new();
        assert!(!counter.update(&arms(300.0, 260.0)));
        assert_eq!(counter.phase(), Phase::ArmDown);

        assert!(counter.update(&arms(300.0, 259.0)));
        assert_eq!(counter.phase(), Phase::ArmUp);
    }

    #[test]
    fn raise_crossing_margin_counts_one() {
        let mut counter = RepCounter::new();
        // Elbow travels 400 -> 250 while the shoulder stays at 300; the margin threshold (260) is
        // crossed on the last frame.
        assert!(!counter.update(&arms(300.0, 400.0)));
        assert!(!counter.update(&arms(300.0, 330.0)));
        assert!(!counter.update(&arms(300.0, 280.0)));
        assert!(counter.update(&arms(300.0, 250.0)));
        assert_eq!(counter.phase(), Phase::ArmUp);
        assert_eq!(counter.count(), 1);

        // Holding the arm up does not count again.
        assert!(!counter.update(&arms(300.0, 250.0)));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn lowering_rearms_without_counting() {
        let mut counter = RepCounter::new();
        assert!(counter.update(&arms(300.0, 250.0)));
        assert_eq!(counter.count(), 1);

        assert!(!counter.update(&arms(300.0, 310.0)));
        assert_eq!(counter.phase(), Phase::ArmDown);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn dead_zone_is_stable() {
        let mut counter = RepCounter::new();

        // From ArmDown, oscillating between the two thresholds must not transition.
        for _ in 0..10 {
            counter.update(&arms(300.0, 280.0));
            counter.update(&arms(300.0, 295.0));
        }
        assert_eq!(counter.phase(), Phase::ArmDown);
        assert_eq!(counter.count(), 0);

        // Same from ArmUp: the elbow dropping back into the dead zone does not re-arm.
        assert!(counter.update(&arms(300.0, 250.0)));
        for _ in 0..10 {
            counter.update(&arms(300.0, 280.0));
            counter.update(&arms(300.0, 295.0));
        }
        assert_eq!(counter.phase(), Phase::ArmUp);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn full_cycles_count_once_each() {
        let mut counter = RepCounter::new();
        for _ in 0..25 {
            counter.update(&arms(300.0, 400.0));
            counter.update(&arms(300.0, 250.0));
        }
        assert_eq!(counter.count(), 25);
    }

    #[test]
    fn count_matches_transitions_for_mixed_sequence() {
        // Hand-checked sequence: exactly the frames crossing the margin from ArmDown count.
        let shoulder = 300.0;
        let elbows = [
            400.0, // down (no-op)
            259.0, // up -> rep 1
            280.0, // dead zone, still up
            310.0, // down
            295.0, // dead zone, still down
            255.0, // up -> rep 2
            250.0, // still up
            301.0, // down
            259.9, // up -> rep 3
        ];

        let mut counter = RepCounter::new();
        for elbow in elbows {
            counter.update(&arms(shoulder, elbow));
        }
        assert_eq!(counter.count(), 3);
        assert_eq!(counter.phase(), Phase::ArmUp);
    }

    #[test]
    fn count_never_decreases() {
        let mut counter = RepCounter::new();
        let mut last = 0;
        for elbow in [400.0, 250.0, 400.0, 250.0, 310.0, 290.0, 250.0, 400.0] {
            counter.update(&arms(300.0, elbow));
            assert!(counter.count() >= last);
            last = counter.count();
        }
    }

    #[test]
    fn left_arm_does_not_drive_the_count() {
        let mut counter = RepCounter::new();
        // Left elbow high above the left shoulder, right arm at rest: no count.
        let arms = ArmLandmarks {
            left_shoulder: [900.0, 300.0],
            right_shoulder: [400.0, 300.0],
            left_elbow: [920.0, 100.0],
            right_elbow: [420.0, 400.0],
        };
        assert!(!counter.update(&arms));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn pure_transition_leaves_input_unchanged() {
        let initial = CounterState::default();
        let next = initial.advance(300.0, 250.0);
        assert_eq!(next.count(), 1);
        assert_eq!(next.phase(), Phase::ArmUp);
        // `initial` is untouched by value semantics.
        assert_eq!(initial.count(), 0);
        assert_eq!(initial.phase(), Phase::ArmDown);
    }
}
