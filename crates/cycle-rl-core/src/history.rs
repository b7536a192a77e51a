//! Append-only learning history and the analytics derived from it

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::action::CareAction;
use crate::state::StateKey;

/// Number of actions reported as top performers
pub const TOP_ACTIONS: usize = 3;

/// Immutable record of one learning update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Owning user
    pub user_id: String,
    /// State the action was proposed in
    pub state: StateKey,
    /// Proposed action
    pub action: CareAction,
    /// Q-value after the update
    pub q_value: f64,
    /// Whether the user acted on the suggestion
    pub action_taken: bool,
    /// Reward fed into the update
    pub reward: f64,
    /// Next-day energy, when feedback carried one
    pub next_day_energy: Option<u8>,
    /// Next-day mood, when feedback carried one
    pub next_day_mood: Option<u8>,
    /// When the update was applied
    pub timestamp: DateTime<Utc>,
}

/// Reward totals for one action
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionEffectiveness {
    /// Sum of rewards
    pub total_reward: f64,
    /// Number of updates
    pub count: usize,
    /// Mean reward
    pub average: f64,
}

/// Per-user reward analytics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    /// Best actions by average reward, best first
    pub top_actions: Vec<CareAction>,
    /// Totals per action, in order of first appearance
    pub action_effectiveness: IndexMap<CareAction, ActionEffectiveness>,
}

/// Aggregate history records into per-action effectiveness
#[must_use]
pub fn summarize(records: &[HistoryRecord]) -> Analytics {
    let mut action_effectiveness: IndexMap<CareAction, ActionEffectiveness> = IndexMap::new();
    for record in records {
        let entry = action_effectiveness.entry(record.action).or_default();
        entry.total_reward += record.reward;
        entry.count += 1;
    }
    for entry in action_effectiveness.values_mut() {
        if entry.count > 0 {
            entry.average = entry.total_reward / entry.count as f64;
        }
    }

    let mut ranked: Vec<_> = action_effectiveness.iter().collect();
    // stable: equal averages keep first-appearance order
    ranked.sort_by(|(_, a), (_, b)| b.average.total_cmp(&a.average));
    let top_actions = ranked.into_iter().take(TOP_ACTIONS).map(|(a, _)| *a).collect();

    Analytics {
        top_actions,
        action_effectiveness,
    }
}
