//! Probability calculation utilities for match simulation.
//!
//! All functions are pure - they take ratings as input and return per-minute
//! probabilities. This allows unit testing without a full `MatchEngine`.

use super::params::{
    BASE_GOAL_RATE, BASE_SAVE_RATE, GOAL_PROB_MAX, GOAL_PROB_MIN, SNITCH_BASE_RATE,
    SNITCH_MIN_MINUTE, SNITCH_PROB_MAX,
};

fn rating(value: u8) -> f64 {
    // Floor of 1 keeps the ratios defined for pathological 0-rated teams.
    f64::from(value.max(1))
}

/// Per-minute chance that an attack beats the opposing defense for a goal.
/// Higher attack against lower defense raises it; clamped to keep even the
/// worst mismatch from degenerating.
pub fn goal_probability(attack: u8, opposing_defense: u8) -> f64 {
    let ratio = rating(attack) / (rating(attack) + rating(opposing_defense));
    (BASE_GOAL_RATE * ratio).clamp(GOAL_PROB_MIN, GOAL_PROB_MAX)
}

/// Per-minute chance of a notable save by the defending side's keeper.
pub fn save_probability(opposing_attack: u8, defense: u8) -> f64 {
    let ratio = rating(defense) / (rating(defense) + rating(opposing_attack));
    BASE_SAVE_RATE * ratio
}

/// Per-minute chance that a seeker catches the snitch at `minute`.
///
/// Zero before [`SNITCH_MIN_MINUTE`]; afterwards it scales with seeker skill
/// and ramps up as the match approaches the duration cap, so drawn-out
/// matches still tend to end by catch rather than by cap.
pub fn snitch_probability(seeker_skill: u8, minute: u32, duration_cap: u32) -> f64 {
    if minute < SNITCH_MIN_MINUTE {
        return 0.0;
    }
    let skill = rating(seeker_skill) / 100.0;
    let ramp = 1.0 + f64::from(minute) / f64::from(duration_cap.max(1));
    (SNITCH_BASE_RATE * skill * ramp).min(SNITCH_PROB_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_probability_scales_with_matchup() {
        let strong_vs_weak = goal_probability(95, 30);
        let even = goal_probability(70, 70);
        let weak_vs_strong = goal_probability(30, 95);
        assert!(strong_vs_weak > even);
        assert!(even > weak_vs_strong);
        assert!((GOAL_PROB_MIN..=GOAL_PROB_MAX).contains(&strong_vs_weak));
        assert!((GOAL_PROB_MIN..=GOAL_PROB_MAX).contains(&weak_vs_strong));
    }

    #[test]
    fn test_goal_probability_defined_for_zero_ratings() {
        let p = goal_probability(0, 0);
        assert!(p.is_finite());
        assert!(p >= GOAL_PROB_MIN);
    }

    #[test]
    fn test_snitch_probability_zero_before_minimum() {
        assert_eq!(snitch_probability(100, SNITCH_MIN_MINUTE - 1, 120), 0.0);
        assert!(snitch_probability(100, SNITCH_MIN_MINUTE, 120) > 0.0);
    }

    #[test]
    fn test_snitch_probability_ramps_and_clamps() {
        let early = snitch_probability(80, 20, 120);
        let late = snitch_probability(80, 110, 120);
        assert!(late > early);
        assert!(snitch_probability(100, 500, 120) <= SNITCH_PROB_MAX);
    }

    #[test]
    fn test_save_probability_favours_defense() {
        assert!(save_probability(40, 90) > save_probability(90, 40));
    }
}
