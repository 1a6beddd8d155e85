//! Folds one feedback event into a user profile.
//!
//! Positive feedback pulls every dimension toward the profile that produced
//! the liked response. Negative feedback pushes away from the disliked
//! profile at half the scheduled rate. The result is always clamped to
//! `[0, 1]`; for the negative branch the clamp is what keeps values in range.

use crate::error::Result;
use crate::learning::schedule::LearningRateSchedule;
use crate::types::{Feedback, OceanVector, UserProfile};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Pure profile update: `(profile, target, feedback) -> next profile`
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdater {
    schedule: LearningRateSchedule,
}

impl ProfileUpdater {
    pub fn new(schedule: LearningRateSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &LearningRateSchedule {
        &self.schedule
    }

    /// Rate that would be applied to `profile` for this kind of feedback
    pub fn effective_rate(&self, profile: &UserProfile, feedback: Feedback) -> f64 {
        let rate = self.schedule.rate(profile.feedback_count);
        match feedback {
            Feedback::Positive => rate,
            Feedback::Negative => rate * 0.5,
        }
    }

    /// Produce the next profile, stamped with the current time
    pub fn apply(
        &self,
        profile: &UserProfile,
        target: &OceanVector,
        feedback: Feedback,
    ) -> Result<UserProfile> {
        self.apply_at(profile, target, feedback, Utc::now())
    }

    /// Produce the next profile with an explicit timestamp
    pub fn apply_at(
        &self,
        profile: &UserProfile,
        target: &OceanVector,
        feedback: Feedback,
        now: DateTime<Utc>,
    ) -> Result<UserProfile> {
        profile.current.validate()?;
        target.validate()?;

        let rate = self.effective_rate(profile, feedback);
        let direction = if feedback.is_positive() { 1.0 } else { -1.0 };

        let next = profile.current.map(|dim, current| {
            let delta = target.get(dim) - current;
            (current + direction * delta * rate).clamp(0.0, 1.0)
        });

        debug!(
            "Applied {} feedback #{} at rate {:.4}: {} -> {}",
            feedback,
            profile.feedback_count + 1,
            rate,
            profile.current,
            next
        );

        Ok(UserProfile {
            current: next,
            feedback_count: profile.feedback_count + 1,
            last_learning_rate: Some(rate),
            last_updated: Some(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimension;
    use proptest::prelude::*;

    fn unit() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    fn ocean() -> impl Strategy<Value = OceanVector> {
        (unit(), unit(), unit(), unit(), unit()).prop_map(|(o, c, e, a, n)| OceanVector {
            openness: o,
            conscientiousness: c,
            extraversion: e,
            agreeableness: a,
            neuroticism: n,
        })
    }

    #[test]
    fn test_first_positive_feedback() {
        let updater = ProfileUpdater::default();
        let profile = UserProfile::default();
        let target = OceanVector::new(0.9, 0.5, 0.7, 0.8, 0.3).unwrap();

        let next = updater.apply(&profile, &target, Feedback::Positive).unwrap();

        assert!((next.current.openness - 0.60).abs() < 1e-9);
        assert!((next.current.conscientiousness - 0.5).abs() < 1e-9);
        assert!((next.current.extraversion - 0.55).abs() < 1e-9);
        assert!((next.current.agreeableness - 0.575).abs() < 1e-9);
        assert!((next.current.neuroticism - 0.45).abs() < 1e-9);
        assert_eq!(next.feedback_count, 1);
        assert_eq!(next.last_learning_rate, Some(0.25));
        assert!(next.last_updated.is_some());
    }

    #[test]
    fn test_negative_feedback_moves_away_at_half_rate() {
        let updater = ProfileUpdater::default();
        let profile = UserProfile::default();
        let target = OceanVector::new(0.9, 0.5, 0.5, 0.5, 0.1).unwrap();

        let next = updater.apply(&profile, &target, Feedback::Negative).unwrap();

        // 0.5 - (0.9 - 0.5) * 0.125
        assert!((next.current.openness - 0.45).abs() < 1e-9);
        // 0.5 - (0.1 - 0.5) * 0.125
        assert!((next.current.neuroticism - 0.55).abs() < 1e-9);
        assert_eq!(next.last_learning_rate, Some(0.125));
    }

    #[test]
    fn test_negative_feedback_clamps_at_bounds() {
        let updater = ProfileUpdater::default();
        let profile = UserProfile {
            current: OceanVector::new(0.0, 1.0, 0.5, 0.5, 0.5).unwrap(),
            ..Default::default()
        };
        let target = OceanVector::new(1.0, 0.0, 0.5, 0.5, 0.5).unwrap();

        let next = updater.apply(&profile, &target, Feedback::Negative).unwrap();

        assert_eq!(next.current.openness, 0.0);
        assert_eq!(next.current.conscientiousness, 1.0);
    }

    #[test]
    fn test_target_equal_to_current_is_still_a_learning_event() {
        let updater = ProfileUpdater::default();
        let profile = UserProfile {
            current: OceanVector::new(0.3, 0.6, 0.2, 0.9, 0.4).unwrap(),
            feedback_count: 7,
            ..Default::default()
        };

        for feedback in [Feedback::Positive, Feedback::Negative] {
            let next = updater.apply(&profile, &profile.current, feedback).unwrap();
            assert_eq!(next.current, profile.current);
            assert_eq!(next.feedback_count, 8);
            assert_eq!(
                next.last_learning_rate,
                Some(updater.effective_rate(&profile, feedback))
            );
        }
    }

    #[test]
    fn test_rejects_invalid_target() {
        let updater = ProfileUpdater::default();
        let target = OceanVector::balanced().with(Dimension::Extraversion, 2.0);
        assert!(updater
            .apply(&UserProfile::default(), &target, Feedback::Positive)
            .is_err());
    }

    #[test]
    fn test_repeated_positive_feedback_converges() {
        let updater = ProfileUpdater::default();
        let target = OceanVector::new(0.9, 0.1, 0.7, 0.8, 0.3).unwrap();
        let mut profile = UserProfile::default();
        let mut previous_gap = profile.current.max_abs_diff(&target);

        for _ in 0..200 {
            let next = updater.apply(&profile, &target, Feedback::Positive).unwrap();
            for dim in Dimension::ALL {
                let before = profile.current.get(dim) - target.get(dim);
                let after = next.current.get(dim) - target.get(dim);
                assert!(after.abs() <= before.abs());
                // never crosses the target
                assert!(after * before >= 0.0);
            }
            let gap = next.current.max_abs_diff(&target);
            assert!(gap <= previous_gap);
            previous_gap = gap;
            profile = next;
        }

        assert!(previous_gap < 1e-3);
        assert_eq!(profile.feedback_count, 200);
    }

    proptest! {
        #[test]
        fn prop_apply_stays_in_range(
            current in ocean(),
            target in ocean(),
            positive in any::<bool>(),
            count in 0u64..10_000,
        ) {
            let updater = ProfileUpdater::default();
            let profile = UserProfile { current, feedback_count: count, ..Default::default() };
            let next = updater.apply(&profile, &target, Feedback::from_positive(positive)).unwrap();

            prop_assert!(next.current.validate().is_ok());
            prop_assert_eq!(next.feedback_count, count + 1);
        }

        #[test]
        fn prop_negative_displacement_smaller(
            current in ocean(),
            target in ocean(),
            count in 0u64..10_000,
        ) {
            let updater = ProfileUpdater::default();
            let profile = UserProfile { current, feedback_count: count, ..Default::default() };
            let pos = updater.apply(&profile, &target, Feedback::Positive).unwrap();
            let neg = updater.apply(&profile, &target, Feedback::Negative).unwrap();

            for dim in Dimension::ALL {
                let pos_step = (pos.current.get(dim) - current.get(dim)).abs();
                let neg_step = (neg.current.get(dim) - current.get(dim)).abs();
                prop_assert!(neg_step <= pos_step + 1e-12);
            }
        }
    }
}
