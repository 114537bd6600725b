//! Simulation tunables.
//!
//! Calibrated so two evenly rated teams land around 8-12 goals a side over a
//! full-cap match and the snitch usually falls between minute 30 and 90.

/// Points for a quaffle goal.
pub const QUAFFLE_GOAL_POINTS: u32 = 10;

/// Bonus points for catching the snitch. Ends the match immediately.
pub const SNITCH_BONUS_POINTS: u32 = 150;

/// Default upper bound on match length in minutes.
pub const DEFAULT_DURATION_CAP_MIN: u32 = 120;

/// No snitch sighting before this minute.
pub const SNITCH_MIN_MINUTE: u32 = 15;

/// Per-minute goal chance scale before the attack/defense ratio is applied.
pub const BASE_GOAL_RATE: f64 = 0.16;

/// Clamp bounds for the per-minute goal probability.
pub const GOAL_PROB_MIN: f64 = 0.02;
pub const GOAL_PROB_MAX: f64 = 0.30;

/// Per-minute chance scale for a notable keeper save.
pub const BASE_SAVE_RATE: f64 = 0.10;

/// Per-minute snitch-catch chance scale per seeker.
pub const SNITCH_BASE_RATE: f64 = 0.012;

/// Clamp bound for the per-minute snitch-catch probability.
pub const SNITCH_PROB_MAX: f64 = 0.08;
