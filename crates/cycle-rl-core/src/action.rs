//! Self-care actions the agent can suggest

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{RLError, Result};

/// A suggested self-care intervention.
///
/// Declaration order is the enumeration order used for arg-max tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
    /// Gentle stretching
    StretchPrompt,
    /// Breathing or meditation
    Mindfulness,
    /// Magnesium supplement or magnesium-rich food
    MagnesiumSuggestion,
    /// Short nap
    NapSuggestion,
    /// Nutrient-dense snack
    HealthySnack,
    /// Walk or light exercise
    MovementBreak,
}

impl CareAction {
    /// Every action, in enumeration order
    pub const ALL: [CareAction; 6] = [
        CareAction::StretchPrompt,
        CareAction::Mindfulness,
        CareAction::MagnesiumSuggestion,
        CareAction::NapSuggestion,
        CareAction::HealthySnack,
        CareAction::MovementBreak,
    ];

    /// Actions favoured during high-pain menstrual states
    pub const PAIN_MANAGEMENT: [CareAction; 2] =
        [CareAction::MagnesiumSuggestion, CareAction::StretchPrompt];

    /// Wire name of the action
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StretchPrompt => "stretch_prompt",
            Self::Mindfulness => "mindfulness",
            Self::MagnesiumSuggestion => "magnesium_suggestion",
            Self::NapSuggestion => "nap_suggestion",
            Self::HealthySnack => "healthy_snack",
            Self::MovementBreak => "movement_break",
        }
    }

    /// Whether this is one of the pain-management actions
    #[must_use]
    pub fn is_pain_management(&self) -> bool {
        Self::PAIN_MANAGEMENT.contains(self)
    }
}

impl fmt::Display for CareAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CareAction {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim())
            .ok_or_else(|| RLError::InvalidAction(s.to_string()))
    }
}
