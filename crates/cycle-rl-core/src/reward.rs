//! Reward signals computed from deferred user feedback

use serde::{Deserialize, Serialize};

use crate::observation::{Observation, SCORE_RANGE};
use crate::{RLError, Result};

/// Reward given when the user did not act on a suggestion
pub const NO_ACTION_PENALTY: f64 = -1.0;

/// Centre of the effectiveness rating scale
pub const EFFECTIVENESS_MIDPOINT: f64 = 5.0;

/// Upper bound of the effectiveness rating scale
pub const EFFECTIVENESS_MAX: f64 = 10.0;

/// Reward signal
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reward(pub f64);

impl Reward {
    /// Create a new reward
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the reward value
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Reward {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<Reward> for f64 {
    fn from(reward: Reward) -> Self {
        reward.0
    }
}

impl std::ops::Add for Reward {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

/// Feedback on a delivered notification, usually arriving the next day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Whether the user acted on the suggestion
    pub action_taken: bool,
    /// Subjective effectiveness rating, 0..=10
    pub effectiveness: f64,
    /// Energy score reported the following day
    pub next_day_energy: u8,
    /// Mood score reported the following day
    pub next_day_mood: u8,
}

impl Feedback {
    /// Check ratings lie on their scales
    pub fn validate(&self) -> Result<()> {
        if !self.effectiveness.is_finite() || !(0.0..=EFFECTIVENESS_MAX).contains(&self.effectiveness) {
            return Err(RLError::InvalidFeedback(format!(
                "effectiveness {} outside 0..={EFFECTIVENESS_MAX}",
                self.effectiveness
            )));
        }
        for (name, value) in [("next-day energy", self.next_day_energy), ("next-day mood", self.next_day_mood)] {
            if !SCORE_RANGE.contains(&value) {
                return Err(RLError::InvalidFeedback(format!(
                    "{name} {value} outside {}..={}",
                    SCORE_RANGE.start(),
                    SCORE_RANGE.end()
                )));
            }
        }
        Ok(())
    }
}

/// Combines immediate satisfaction with next-day improvement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardCalculator {
    /// Reward when the action was not taken
    pub no_action_penalty: f64,
    /// Effectiveness value that maps to zero immediate reward
    pub effectiveness_midpoint: f64,
}

impl Default for RewardCalculator {
    fn default() -> Self {
        Self {
            no_action_penalty: NO_ACTION_PENALTY,
            effectiveness_midpoint: EFFECTIVENESS_MIDPOINT,
        }
    }
}

impl RewardCalculator {
    /// Compute the reward for `feedback`.
    ///
    /// `previous` is the observation the improvement is measured against;
    /// without one only the effectiveness term contributes.
    #[must_use]
    pub fn reward(&self, feedback: &Feedback, previous: Option<&Observation>) -> Reward {
        if !feedback.action_taken {
            return Reward(self.no_action_penalty);
        }

        let immediate = feedback.effectiveness - self.effectiveness_midpoint;
        let improvement = previous.map_or(0.0, |prev| {
            let energy = f64::from(feedback.next_day_energy) - f64::from(prev.scores.energy);
            let mood = f64::from(feedback.next_day_mood) - f64::from(prev.scores.mood);
            (energy + mood) / 2.0
        });

        Reward(immediate) + Reward(improvement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{CyclePhase, Scores};
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn previous() -> Observation {
        Observation::new(
            "u1",
            CyclePhase::Menstrual,
            Scores { sleep: 6, mood: 5, stress: 7, pain: 8, energy: 4 },
            Utc::now(),
        )
        .unwrap()
    }

    fn feedback(action_taken: bool, effectiveness: f64) -> Feedback {
        Feedback { action_taken, effectiveness, next_day_energy: 7, next_day_mood: 7 }
    }

    #[test]
    fn test_taken_action_combines_terms() {
        let reward = RewardCalculator::default().reward(&feedback(true, 8.0), Some(&previous()));
        assert_relative_eq!(reward.value(), 5.5);
    }

    #[test]
    fn test_without_previous_only_effectiveness_counts() {
        let reward = RewardCalculator::default().reward(&feedback(true, 8.0), None);
        assert_relative_eq!(reward.value(), 3.0);
    }

    #[test]
    fn test_untaken_action_is_penalised_regardless_of_fields() {
        let calc = RewardCalculator::default();
        for effectiveness in [0.0, 5.0, 10.0] {
            for prev in [None, Some(previous())] {
                let reward = calc.reward(&feedback(false, effectiveness), prev.as_ref());
                assert_eq!(reward.value(), NO_ACTION_PENALTY);
            }
        }
    }

    #[test]
    fn test_feedback_validation() {
        assert!(feedback(true, 8.0).validate().is_ok());
        assert!(feedback(true, 10.5).validate().is_err());
        assert!(feedback(true, f64::NAN).validate().is_err());
        let mut bad = feedback(true, 5.0);
        bad.next_day_mood = 0;
        assert!(matches!(bad.validate(), Err(RLError::InvalidFeedback(_))));
    }
}
