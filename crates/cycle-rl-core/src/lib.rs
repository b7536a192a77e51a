//! Core reinforcement learning types for cycle-aware self-care notifications
//!
//! This crate holds the learning core: observations and their canonical
//! state keys, the action set, the reward calculator, the lazily
//! initialized Q-value table, the epsilon-greedy policy and the
//! temporal-difference update. Persistence is reached only through the
//! traits in [`store`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod agent;
pub mod error;
pub mod history;
pub mod message;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod rng;
pub mod state;
pub mod store;
pub mod value;

// Re-export core traits and types
pub use action::CareAction;
pub use agent::{temporal_difference, Agent, AgentConfig, UpdateContext};
pub use error::{RLError, Result};
pub use history::{summarize, ActionEffectiveness, Analytics, HistoryRecord};
pub use observation::{CyclePhase, Observation, Scores};
pub use policy::{Decision, PolicyConfig, PolicyEngine};
pub use reward::{Feedback, Reward, RewardCalculator};
pub use rng::SharedRng;
pub use state::{Clock, DecodedState, FixedClock, StateEncoder, StateKey, SystemClock, TimeOfDay};
pub use store::{
    FeedbackMark, NewNotification, Notification, NotificationId, NotificationStore, ObservationStore,
    QValueEntry, QValueStore,
};
pub use value::QTable;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Agent, AgentConfig, CareAction, CyclePhase, Feedback, Observation, ObservationStore,
        NotificationStore, QValueStore, Result, Reward, Scores, StateKey,
    };
}
