//! Physiological and contextual observations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{RLError, Result};

/// Inclusive bounds shared by every self-reported score
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Menstrual cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    /// Menstruation
    Menstrual,
    /// Follicular phase
    Follicular,
    /// Ovulation window
    Ovulation,
    /// Luteal phase
    Luteal,
}

impl CyclePhase {
    /// All phases in cycle order
    pub const ALL: [CyclePhase; 4] = [
        CyclePhase::Menstrual,
        CyclePhase::Follicular,
        CyclePhase::Ovulation,
        CyclePhase::Luteal,
    ];

    /// Wire name of the phase
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menstrual => "menstrual",
            Self::Follicular => "follicular",
            Self::Ovulation => "ovulation",
            Self::Luteal => "luteal",
        }
    }

    /// The phase that follows this one
    #[must_use]
    pub fn next(&self) -> Self {
        match self {
            Self::Menstrual => Self::Follicular,
            Self::Follicular => Self::Ovulation,
            Self::Ovulation => Self::Luteal,
            Self::Luteal => Self::Menstrual,
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CyclePhase {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "menstrual" => Ok(Self::Menstrual),
            "follicular" => Ok(Self::Follicular),
            "ovulation" => Ok(Self::Ovulation),
            "luteal" => Ok(Self::Luteal),
            other => Err(RLError::InvalidObservation(format!("unknown cycle phase '{other}'"))),
        }
    }
}

/// Self-reported scores, each on [`SCORE_RANGE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scores {
    /// Sleep quality
    pub sleep: u8,
    /// Mood
    pub mood: u8,
    /// Stress
    pub stress: u8,
    /// Pain
    pub pain: u8,
    /// Energy
    pub energy: u8,
}

impl Scores {
    /// Check every score lies on the shared scale
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("sleep", self.sleep),
            ("mood", self.mood),
            ("stress", self.stress),
            ("pain", self.pain),
            ("energy", self.energy),
        ];
        for (name, value) in fields {
            if !SCORE_RANGE.contains(&value) {
                return Err(RLError::InvalidObservation(format!(
                    "{name} score {value} outside {}..={}",
                    SCORE_RANGE.start(),
                    SCORE_RANGE.end()
                )));
            }
        }
        Ok(())
    }
}

/// A recorded snapshot for one user. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Owning user
    pub user_id: String,
    /// When the observation was recorded
    pub recorded_at: DateTime<Utc>,
    /// Cycle phase at recording time
    pub phase: CyclePhase,
    /// Self-reported scores
    pub scores: Scores,
}

impl Observation {
    /// Build a validated observation
    pub fn new(
        user_id: impl Into<String>,
        phase: CyclePhase,
        scores: Scores,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(RLError::InvalidObservation("user id must not be empty".into()));
        }
        scores.validate()?;
        Ok(Self {
            user_id,
            recorded_at,
            phase,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pain: u8) -> Scores {
        Scores { sleep: 6, mood: 5, stress: 7, pain, energy: 4 }
    }

    #[test]
    fn test_phase_parse_roundtrip() {
        for phase in CyclePhase::ALL {
            assert_eq!(phase.as_str().parse::<CyclePhase>().unwrap(), phase);
        }
        assert!("winter".parse::<CyclePhase>().is_err());
    }

    #[test]
    fn test_phase_cycle_wraps() {
        assert_eq!(CyclePhase::Luteal.next(), CyclePhase::Menstrual);
    }

    #[test]
    fn test_observation_rejects_out_of_range_scores() {
        let now = Utc::now();
        assert!(Observation::new("u1", CyclePhase::Menstrual, scores(8), now).is_ok());
        assert!(matches!(
            Observation::new("u1", CyclePhase::Menstrual, scores(11), now),
            Err(RLError::InvalidObservation(_))
        ));
        assert!(Observation::new("u1", CyclePhase::Menstrual, scores(0), now).is_err());
        assert!(Observation::new("  ", CyclePhase::Menstrual, scores(5), now).is_err());
    }
}
