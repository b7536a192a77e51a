//! Epsilon-greedy action selection with a high-pain menstrual prior

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::action::CareAction;
use crate::state::DecodedState;

/// Outcome of the exploration draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Exploration picked this action
    Explore(CareAction),
    /// Exploit: pick the arg-max over Q-values
    Exploit,
}

/// Policy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Exploration rate
    pub epsilon: f64,
    /// Pain level at or above which a menstrual state counts as high-pain
    pub pain_threshold: u8,
    /// Probability that exploration in a high-pain state is restricted to pain management
    pub pain_explore_probability: f64,
    /// Decision-only bonus added to pain-management values when exploiting
    pub pain_boost: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            pain_threshold: 6,
            pain_explore_probability: 0.6,
            pain_boost: 0.5,
        }
    }
}

/// Stateless epsilon-greedy policy.
///
/// Holds configuration only; randomness is passed in per decision.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    /// Create a policy, clamping probabilities to [0, 1]
    #[must_use]
    pub fn new(mut config: PolicyConfig) -> Self {
        config.epsilon = sanitize_probability(config.epsilon);
        config.pain_explore_probability = sanitize_probability(config.pain_explore_probability);
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Set the exploration rate
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.config.epsilon = sanitize_probability(epsilon);
    }

    /// Draw whether to explore and, if so, which action
    pub fn decide(&self, state: &DecodedState, rng: &mut dyn RngCore) -> Decision {
        if rng.gen::<f64>() < self.config.epsilon {
            Decision::Explore(self.explore(state, rng))
        } else {
            Decision::Exploit
        }
    }

    /// Exploration choice: biased toward pain management in high-pain
    /// menstrual states, uniform otherwise
    pub fn explore(&self, state: &DecodedState, rng: &mut dyn RngCore) -> CareAction {
        if state.is_high_pain_menstrual(self.config.pain_threshold)
            && rng.gen::<f64>() < self.config.pain_explore_probability
        {
            if let Some(action) = CareAction::PAIN_MANAGEMENT.choose(rng) {
                return *action;
            }
        }
        *CareAction::ALL.choose(rng).unwrap_or(&CareAction::ALL[0])
    }

    /// Arg-max over `q_values`, first entry wins ties.
    ///
    /// In high-pain menstrual states pain-management actions get
    /// `pain_boost` added for this decision only.
    #[must_use]
    pub fn exploit(&self, state: &DecodedState, q_values: &[(CareAction, f64)]) -> CareAction {
        let boost = state.is_high_pain_menstrual(self.config.pain_threshold);
        let mut best: Option<(CareAction, f64)> = None;
        for &(action, q) in q_values {
            let value = if boost && action.is_pain_management() {
                q + self.config.pain_boost
            } else {
                q
            };
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((action, value)),
            }
        }
        best.map_or(CareAction::ALL[0], |(action, _)| action)
    }
}

fn sanitize_probability(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::CyclePhase;
    use crate::state::TimeOfDay;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state(phase: CyclePhase, pain: u8) -> DecodedState {
        DecodedState {
            cycle_phase: phase,
            sleep_score: 6,
            mood_score: 5,
            stress_level: 7,
            pain_level: pain,
            time_of_day: TimeOfDay::Morning,
            energy_level: 4,
        }
    }

    fn seeded_q() -> Vec<(CareAction, f64)> {
        CareAction::ALL
            .iter()
            .map(|&a| {
                let q = match a {
                    CareAction::MagnesiumSuggestion => 0.9,
                    CareAction::StretchPrompt => 0.85,
                    _ => 0.1,
                };
                (a, q)
            })
            .collect()
    }

    #[test]
    fn test_high_pain_exploit_prefers_boosted_magnesium() {
        let policy = PolicyEngine::new(PolicyConfig { epsilon: 0.0, ..Default::default() });
        let action = policy.exploit(&state(CyclePhase::Menstrual, 8), &seeded_q());
        assert_eq!(action, CareAction::MagnesiumSuggestion);
    }

    #[test]
    fn test_boost_only_applies_in_high_pain_menstrual_states() {
        let policy = PolicyEngine::default();
        let mut q = vec![(CareAction::StretchPrompt, 0.2), (CareAction::NapSuggestion, 0.6)];
        q.extend(CareAction::ALL[2..].iter().filter(|a| **a != CareAction::NapSuggestion).map(|&a| (a, 0.0)));

        assert_eq!(policy.exploit(&state(CyclePhase::Menstrual, 6), &q), CareAction::StretchPrompt);
        assert_eq!(policy.exploit(&state(CyclePhase::Menstrual, 5), &q), CareAction::NapSuggestion);
        assert_eq!(policy.exploit(&state(CyclePhase::Luteal, 9), &q), CareAction::NapSuggestion);
    }

    #[test]
    fn test_ties_break_by_enumeration_order() {
        let policy = PolicyEngine::default();
        let q: Vec<_> = CareAction::ALL.iter().map(|&a| (a, 0.5)).collect();
        assert_eq!(policy.exploit(&state(CyclePhase::Follicular, 2), &q), CareAction::StretchPrompt);
    }

    #[test]
    fn test_zero_epsilon_never_explores() {
        let policy = PolicyEngine::new(PolicyConfig { epsilon: 0.0, ..Default::default() });
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            assert_eq!(policy.decide(&state(CyclePhase::Menstrual, 8), &mut rng), Decision::Exploit);
        }
    }

    #[test]
    fn test_high_pain_exploration_bias() {
        const N: usize = 10_000;
        let policy = PolicyEngine::new(PolicyConfig { epsilon: 1.0, ..Default::default() });
        let mut rng = StdRng::seed_from_u64(2024);
        let high_pain = state(CyclePhase::Menstrual, 8);

        let hits = (0..N)
            .filter(|_| match policy.decide(&high_pain, &mut rng) {
                Decision::Explore(a) => a.is_pain_management(),
                Decision::Exploit => false,
            })
            .count();

        // 0.6 restricted + 0.4 * uniform share of the two pain actions
        let expected = 0.6 + 0.4 * (2.0 / 6.0);
        let observed = hits as f64 / N as f64;
        assert!((observed - expected).abs() < 0.02, "observed {observed}, expected {expected}");
    }

    #[test]
    fn test_normal_exploration_is_uniform() {
        const N: usize = 12_000;
        let policy = PolicyEngine::new(PolicyConfig { epsilon: 1.0, ..Default::default() });
        let mut rng = StdRng::seed_from_u64(99);
        let calm = state(CyclePhase::Ovulation, 2);
        let mut counts = [0usize; 6];
        for _ in 0..N {
            let action = policy.explore(&calm, &mut rng);
            let idx = CareAction::ALL.iter().position(|a| *a == action).unwrap();
            counts[idx] += 1;
        }
        for count in counts {
            let share = count as f64 / N as f64;
            assert!((share - 1.0 / 6.0).abs() < 0.02, "share {share}");
        }
    }

    #[test]
    fn test_probabilities_are_clamped() {
        let policy = PolicyEngine::new(PolicyConfig { epsilon: 3.0, pain_explore_probability: -1.0, ..Default::default() });
        assert_eq!(policy.config().epsilon, 1.0);
        assert_eq!(policy.config().pain_explore_probability, 0.0);
    }
}
