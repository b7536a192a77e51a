// Sample data for demos and manual testing

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::Serialize;
use tracing::info;

use cycle_memory::MemoryStore;
use cycle_rl_core::{
    CareAction, CyclePhase, DecodedState, Feedback, NewNotification, Observation, QValueEntry,
    Scores, SharedRng, TimeOfDay,
};

/// Notifications generated per user
const SAMPLE_NOTIFICATIONS: usize = 3;

/// Days spent in each phase before moving on
fn phase_duration(phase: CyclePhase) -> u32 {
    match phase {
        CyclePhase::Menstrual => 5,
        CyclePhase::Follicular => 7,
        CyclePhase::Ovulation => 2,
        CyclePhase::Luteal => 14,
    }
}

/// Typical scores of a phase: sleep, mood, stress, pain, energy
fn base_scores(phase: CyclePhase) -> Scores {
    let (sleep, mood, stress, pain, energy) = match phase {
        CyclePhase::Menstrual => (6, 5, 7, 7, 4),
        CyclePhase::Follicular => (7, 7, 5, 3, 7),
        CyclePhase::Ovulation => (8, 8, 4, 2, 8),
        CyclePhase::Luteal => (6, 6, 6, 4, 6),
    };
    Scores { sleep, mood, stress, pain, energy }
}

/// Prior Q-values of a phase, in `CareAction::ALL` order
fn prior_q_values(phase: CyclePhase) -> [f64; 6] {
    match phase {
        CyclePhase::Menstrual => [0.3, 0.4, 0.6, 0.5, 0.4, 0.2],
        CyclePhase::Follicular => [0.4, 0.3, 0.2, 0.3, 0.5, 0.6],
        CyclePhase::Ovulation => [0.5, 0.4, 0.2, 0.2, 0.4, 0.6],
        CyclePhase::Luteal => [0.3, 0.5, 0.4, 0.4, 0.5, 0.3],
    }
}

fn jitter(score: u8, rng: &mut dyn RngCore) -> u8 {
    (i16::from(score) + rng.gen_range(-2_i16..=2)).clamp(1, 10) as u8
}

fn noisy_scores(phase: CyclePhase, rng: &mut dyn RngCore) -> Scores {
    let base = base_scores(phase);
    Scores {
        sleep: jitter(base.sleep, rng),
        mood: jitter(base.mood, rng),
        stress: jitter(base.stress, rng),
        pain: jitter(base.pain, rng),
        energy: jitter(base.energy, rng),
    }
}

/// Canonical morning state used for the prior Q-table of `phase`
fn canonical_state(phase: CyclePhase) -> DecodedState {
    DecodedState {
        cycle_phase: phase,
        sleep_score: 7,
        mood_score: 7,
        stress_level: 5,
        pain_level: 4,
        time_of_day: TimeOfDay::Morning,
        energy_level: 6,
    }
}

/// What a seeding run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedSummary {
    pub users: Vec<String>,
    pub observations: usize,
    pub q_values: usize,
    pub notifications: usize,
}

/// `days` of observations walking the phase cycle from a random phase,
/// oldest first
fn cycle_observations(user: &str, days: u32, rng: &SharedRng) -> Result<Vec<Observation>> {
    let start = Utc::now() - Duration::days(i64::from(days));
    let mut phase = rng.with(|r| *CyclePhase::ALL.choose(r).unwrap_or(&CyclePhase::Menstrual))?;
    let mut days_in_phase = 0;

    let mut observations = Vec::with_capacity(days as usize);
    for day in 0..days {
        let scores = rng.with(|r| noisy_scores(phase, r))?;
        let recorded_at = start + Duration::days(i64::from(day));
        observations.push(Observation::new(user, phase, scores, recorded_at)?);

        days_in_phase += 1;
        if days_in_phase >= phase_duration(phase) {
            phase = phase.next();
            days_in_phase = 0;
        }
    }
    Ok(observations)
}

fn prior_q_table(rng: &SharedRng) -> Result<Vec<QValueEntry>> {
    let mut entries = Vec::new();
    for phase in CyclePhase::ALL {
        let state = canonical_state(phase).key()?;
        for (action, base) in CareAction::ALL.into_iter().zip(prior_q_values(phase)) {
            let q_value = base + rng.with(|r| r.gen_range(-0.1_f64..=0.1))?;
            entries.push(QValueEntry { state: state.clone(), action, q_value });
        }
    }
    Ok(entries)
}

/// Answered sample notifications built from the user's latest observation
fn sample_notifications(latest: &Observation, rng: &SharedRng) -> Result<Vec<(NewNotification, Option<Feedback>)>> {
    let state = DecodedState::from_observation(latest, TimeOfDay::Morning).key()?;
    let mut notifications = Vec::with_capacity(SAMPLE_NOTIFICATIONS);
    for _ in 0..SAMPLE_NOTIFICATIONS {
        let (action, action_taken, effectiveness) = rng.with(|r| {
            let action = *CareAction::ALL.choose(r).unwrap_or(&CareAction::Mindfulness);
            (action, r.gen_bool(0.5), r.gen_range(5.0_f64..=9.0))
        })?;
        let feedback = Feedback {
            action_taken,
            effectiveness,
            next_day_energy: latest.scores.energy,
            next_day_mood: latest.scores.mood,
        };
        notifications.push((
            NewNotification {
                user_id: latest.user_id.clone(),
                message: format!("Sample notification for {action}"),
                action,
                state: state.clone(),
            },
            Some(feedback),
        ));
    }
    Ok(notifications)
}

/// Populate `store` with `users` sample users and `days` of data each
pub async fn seed(store: &MemoryStore, users: usize, days: u32, rng: &SharedRng) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for i in 1..=users {
        let user = format!("user_{i}");

        let observations = cycle_observations(&user, days, rng)?;
        let latest = observations.last().cloned();
        summary.observations += observations.len();
        store.import_observations(observations).await?;

        let q_table = prior_q_table(rng)?;
        summary.q_values += q_table.len();
        store.import_q_values(&user, &q_table).await?;

        if let Some(latest) = latest {
            let notifications = sample_notifications(&latest, rng)?;
            summary.notifications += store.import_notifications(notifications).await?.len();
        }

        info!(user = %user, days, "seeded sample user");
        summary.users.push(user);
    }

    Ok(summary)
}
