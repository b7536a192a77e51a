//! State keys and the state encoder
//!
//! A state key is the canonical serialization of an observation's seven
//! fields. The time-of-day bucket is not stored on the observation: it is
//! derived from the encoder's clock at the moment the state is queried, so the
//! same stored observation maps to different keys across the day.

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::observation::{CyclePhase, Observation, Scores};
use crate::{RLError, Result};

/// Time-of-day bucket derived from a wall-clock hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// [05:00, 12:00)
    Morning,
    /// [12:00, 17:00)
    Afternoon,
    /// [17:00, 22:00)
    Evening,
    /// Everything else
    Night,
}

impl TimeOfDay {
    /// Bucket an hour of the day (0..24)
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Wire name of the bucket
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Source of the current hour used for time-of-day bucketing
pub trait Clock: Send + Sync + Debug {
    /// Current local hour (0..24)
    fn hour(&self) -> u32;
}

/// Local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Clock frozen at a fixed hour
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn hour(&self) -> u32 {
        self.0 % 24
    }
}

/// Decoded view of a state key.
///
/// Field order here is the wire order of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedState {
    /// Cycle phase
    pub cycle_phase: CyclePhase,
    /// Sleep score
    pub sleep_score: u8,
    /// Mood score
    pub mood_score: u8,
    /// Stress level
    pub stress_level: u8,
    /// Pain level
    pub pain_level: u8,
    /// Time-of-day bucket at query time
    pub time_of_day: TimeOfDay,
    /// Energy level
    pub energy_level: u8,
}

impl DecodedState {
    /// Combine an observation with a time-of-day bucket
    #[must_use]
    pub fn from_observation(observation: &Observation, time_of_day: TimeOfDay) -> Self {
        let Scores { sleep, mood, stress, pain, energy } = observation.scores;
        Self {
            cycle_phase: observation.phase,
            sleep_score: sleep,
            mood_score: mood,
            stress_level: stress,
            pain_level: pain,
            time_of_day,
            energy_level: energy,
        }
    }

    /// Canonical key for this state
    pub fn key(&self) -> Result<StateKey> {
        Ok(StateKey(serde_json::to_string(self)?))
    }

    /// High pain during menstruation
    #[must_use]
    pub fn is_high_pain_menstrual(&self, pain_threshold: u8) -> bool {
        self.cycle_phase == CyclePhase::Menstrual && self.pain_level >= pain_threshold
    }
}

/// Canonical, hashable state identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Wrap an existing serialized key, checking it decodes
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let key = Self(raw.into());
        key.decode()?;
        Ok(key)
    }

    /// Decode back into the state fields
    pub fn decode(&self) -> Result<DecodedState> {
        serde_json::from_str(&self.0)
            .map_err(|e| RLError::InvalidState(format!("undecodable state key {}: {e}", self.0)))
    }

    /// Raw key text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives state keys from observations, bucketing time at query time
#[derive(Debug, Clone)]
pub struct StateEncoder {
    clock: Arc<dyn Clock>,
}

impl Default for StateEncoder {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl StateEncoder {
    /// Create an encoder reading hours from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current time-of-day bucket
    #[must_use]
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_hour(self.clock.hour())
    }

    /// Encode an observation against the current clock
    pub fn encode(&self, observation: &Observation) -> Result<StateKey> {
        DecodedState::from_observation(observation, self.time_of_day()).key()
    }

    /// Encode the latest observation of `user`, failing when there is none
    pub fn encode_latest(&self, user: &str, latest: Option<&Observation>) -> Result<StateKey> {
        match latest {
            Some(observation) => self.encode(observation),
            None => Err(RLError::StateUnavailable { user: user.to_string() }),
        }
    }
}
