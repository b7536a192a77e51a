// Command implementations for cyclectl

use anyhow::Result;
use serde::Serialize;

use cycle_rl_core::{CareAction, Feedback, Scores};

use crate::{populate, App, Commands};

pub(crate) async fn handle_command(app: &App, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Observe { user, phase, sleep, mood, stress, pain, energy } => {
            let scores = Scores { sleep, mood, stress, pain, energy };
            let observation = app.engine.record_observation(&user, phase, scores).await?;
            if app.json {
                return print_json(&observation);
            }
            println!("📝 Observation recorded for {}", user);
            println!("   Phase: {}", observation.phase);
            println!(
                "   Sleep {} | Mood {} | Stress {} | Pain {} | Energy {}",
                sleep, mood, stress, pain, energy
            );
        }

        Commands::Propose { user } => {
            let proposal = app.engine.propose_action(&user).await?;
            if app.json {
                return print_json(&proposal);
            }
            println!("🔔 Notification #{} for {}", proposal.notification_id, user);
            println!("   Action: {}", proposal.action);
            println!();
            println!("{}", proposal.message);
        }

        Commands::Feedback { id, skipped, effectiveness, energy, mood } => {
            let feedback = Feedback {
                action_taken: !skipped,
                effectiveness,
                next_day_energy: energy,
                next_day_mood: mood,
            };
            let outcome = app.engine.record_feedback(id, feedback).await?;
            if app.json {
                return print_json(&outcome);
            }
            println!("✅ Feedback recorded for notification #{}", id);
            println!("   Reward: {:+.3}", outcome.reward);
            println!("   New Q-value: {:.4}", outcome.q_value);
        }

        Commands::Analytics { user } => {
            let analytics = app.engine.analytics(&user).await?;
            if app.json {
                return print_json(&analytics);
            }
            println!("📊 Action effectiveness for {}\n", user);
            if analytics.action_effectiveness.is_empty() {
                println!("No feedback recorded yet.");
                return Ok(());
            }
            for (action, stats) in &analytics.action_effectiveness {
                println!(
                    "{:<22} avg {:+.3}  total {:+.3}  ({} updates)",
                    action, stats.average, stats.total_reward, stats.count
                );
            }
            let top: Vec<String> = analytics.top_actions.iter().map(CareAction::to_string).collect();
            println!("\n🏆 Top actions: {}", top.join(", "));
        }

        Commands::Qtable { user } => {
            let entries = app.engine.q_table(&user).await?;
            if app.json {
                return print_json(&entries);
            }
            println!("🧠 Q-table for {} ({} entries)\n", user, entries.len());
            let mut current = None;
            for entry in &entries {
                if current != Some(&entry.state) {
                    println!("{}", entry.state);
                    current = Some(&entry.state);
                }
                println!("   {:<22} {:+.4}", entry.action, entry.q_value);
            }
        }

        Commands::History { user, limit } => {
            let history = app.engine.history(&user).await?;
            let skip = history.len().saturating_sub(limit);
            let recent = &history[skip..];
            if app.json {
                return print_json(&recent);
            }
            println!("📜 Learning history for {} (last {} of {})\n", user, recent.len(), history.len());
            for record in recent {
                println!(
                    "{}  {:<22} reward {:+.3}  q {:.4}{}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.action,
                    record.reward,
                    record.q_value,
                    if record.action_taken { "" } else { "  (skipped)" }
                );
            }
        }

        Commands::Seed { users, days } => {
            if !app.json {
                println!("🌱 Seeding {} users with {} days of data...", users, days);
            }
            let summary = populate::seed(app.engine.store(), users, days, &app.rng).await?;
            if app.json {
                return print_json(&summary);
            }
            println!("   Observations: {}", summary.observations);
            println!("   Q-values: {}", summary.q_values);
            println!("   Notifications: {}", summary.notifications);
            println!("\n✅ Sample data created for {}", summary.users.join(", "));
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
