//! Phase-aware notification text

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::action::CareAction;
use crate::observation::CyclePhase;
use crate::state::DecodedState;

/// Appended during menstruation when pain is at least [`GENTLE_PAIN_LEVEL`]
pub const PAIN_CAVEAT: &str = "Remember to be gentle with yourself and listen to your body's needs.";

/// Appended when energy is at most [`LOW_ENERGY_LEVEL`]
pub const LOW_ENERGY_CAVEAT: &str = "Keep it gentle and rest if needed.";

/// Pain level that triggers [`PAIN_CAVEAT`]
pub const GENTLE_PAIN_LEVEL: u8 = 7;

/// Energy level that triggers [`LOW_ENERGY_CAVEAT`]
pub const LOW_ENERGY_LEVEL: u8 = 3;

fn stretch_type(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Menstrual => "hip-opening and gentle yoga",
        CyclePhase::Follicular => "dynamic stretches and flow movements",
        CyclePhase::Ovulation => "energetic and full-range stretches",
        CyclePhase::Luteal => "calming and restorative stretches",
    }
}

fn snack_suggestion(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Menstrual => "iron-rich foods and dark chocolate",
        CyclePhase::Follicular => "light, nutrient-dense foods",
        CyclePhase::Ovulation => "fresh fruits and vegetables",
        CyclePhase::Luteal => "complex carbs and protein-rich foods",
    }
}

fn movement_type(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Menstrual => "gentle walking or stretching",
        CyclePhase::Follicular => "moderate cardio or strength training",
        CyclePhase::Ovulation => "high-intensity activities or dance",
        CyclePhase::Luteal => "yoga or light cardio",
    }
}

/// Candidate messages for `action` in `phase`
#[must_use]
pub fn templates(action: CareAction, phase: CyclePhase) -> [String; 3] {
    match action {
        CareAction::StretchPrompt => [
            format!("Time for some gentle stretching! During {phase} phase, focus on {}", stretch_type(phase)),
            format!("Your body could use some movement. Try these {phase}-friendly stretches"),
            "Quick stretch break! Listen to your body and move gently".to_string(),
        ],
        CareAction::Mindfulness => [
            format!("Take a moment to check in with yourself. During {phase}, practice deep breathing"),
            "Time for a mindful moment. Close your eyes and breathe deeply".to_string(),
            "Pause for peace. A short meditation can help balance your energy".to_string(),
        ],
        CareAction::MagnesiumSuggestion => [
            format!("During {phase}, magnesium can help with comfort. Consider taking a supplement"),
            "Magnesium-rich foods like dark chocolate or nuts could help with symptoms".to_string(),
            "Remember your magnesium supplement to support your body's needs".to_string(),
        ],
        CareAction::NapSuggestion => [
            format!("Your energy seems low. A short nap could help during {phase} phase"),
            "Listen to your body - a 20-minute power nap might be just what you need".to_string(),
            "Rest is important! Consider a short nap to recharge".to_string(),
        ],
        CareAction::HealthySnack => [
            format!("Time for a {phase}-supporting snack! Focus on {}", snack_suggestion(phase)),
            "Nourish your body with a balanced snack".to_string(),
            "Hungry? Choose a nutrient-rich snack to support your energy".to_string(),
        ],
        CareAction::MovementBreak => [
            format!("Time to move! During {phase}, try {}", movement_type(phase)),
            "A short walk or gentle movement can help with energy and mood".to_string(),
            "Your body needs movement - choose an activity that feels good".to_string(),
        ],
    }
}

/// Render the notification text for `action` in `state`
pub fn render(action: CareAction, state: &DecodedState, rng: &mut dyn RngCore) -> String {
    let mut message = templates(action, state.cycle_phase)
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| "Time to take care of yourself!".to_string());

    if state.cycle_phase == CyclePhase::Menstrual && state.pain_level >= GENTLE_PAIN_LEVEL {
        message.push('\n');
        message.push_str(PAIN_CAVEAT);
    }
    if state.energy_level <= LOW_ENERGY_LEVEL {
        message.push('\n');
        message.push_str(LOW_ENERGY_CAVEAT);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimeOfDay;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state(phase: CyclePhase, pain: u8, energy: u8) -> DecodedState {
        DecodedState {
            cycle_phase: phase,
            sleep_score: 7,
            mood_score: 7,
            stress_level: 5,
            pain_level: pain,
            time_of_day: TimeOfDay::Afternoon,
            energy_level: energy,
        }
    }

    #[test]
    fn test_phase_vocabulary() {
        let [first, second, _] = templates(CareAction::StretchPrompt, CyclePhase::Luteal);
        assert!(first.contains("calming and restorative stretches"));
        assert!(second.contains("luteal-friendly"));
        let [snack, _, _] = templates(CareAction::HealthySnack, CyclePhase::Menstrual);
        assert!(snack.contains("iron-rich foods"));
    }

    #[test]
    fn test_rendered_text_is_a_template() {
        let mut rng = StdRng::seed_from_u64(5);
        let s = state(CyclePhase::Follicular, 2, 7);
        for action in CareAction::ALL {
            let message = render(action, &s, &mut rng);
            assert!(templates(action, s.cycle_phase).contains(&message));
        }
    }

    #[test]
    fn test_caveats() {
        let mut rng = StdRng::seed_from_u64(5);
        let message = render(CareAction::NapSuggestion, &state(CyclePhase::Menstrual, 7, 3), &mut rng);
        let lines: Vec<_> = message.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], PAIN_CAVEAT);
        assert_eq!(lines[2], LOW_ENERGY_CAVEAT);

        let message = render(CareAction::NapSuggestion, &state(CyclePhase::Menstrual, 6, 4), &mut rng);
        assert_eq!(message.lines().count(), 1);

        let message = render(CareAction::NapSuggestion, &state(CyclePhase::Luteal, 9, 5), &mut rng);
        assert!(!message.contains(PAIN_CAVEAT));
    }
}
