//! Q-learning agent and notification engine for cycle-aware self-care
//!
//! This crate provides:
//! - [`QLearningAgent`]: epsilon-greedy tabular Q-learning with per-user
//!   serialized updates
//! - [`NotificationEngine`]: proposals, deferred feedback and analytics on
//!   top of any store implementing the core collaborator traits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod qlearning;

pub use engine::{FeedbackOutcome, NotificationEngine, Proposal};
pub use qlearning::QLearningAgent;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{FeedbackOutcome, NotificationEngine, Proposal, QLearningAgent};
    pub use cycle_rl_core::prelude::*;
}
