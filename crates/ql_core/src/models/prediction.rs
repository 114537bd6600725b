use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, MatchId, UserId};

/// Free (no-stake) match outcome pick: home win, draw, or away win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictedOutcome {
    Home,
    Draw,
    Away,
}

impl PredictedOutcome {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" => Some(PredictedOutcome::Home),
            "draw" => Some(PredictedOutcome::Draw),
            "away" => Some(PredictedOutcome::Away),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PredictedOutcome::Home => "home",
            PredictedOutcome::Draw => "draw",
            PredictedOutcome::Away => "away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Correct,
    Incorrect,
}

/// Same at-most-once settlement invariant as `Bet`; `resolved_at` is stamped
/// with virtual time, never wall-clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub user_id: UserId,
    pub match_id: MatchId,
    pub outcome: PredictedOutcome,
    /// 1..=100 self-reported confidence, display only.
    pub confidence: u8,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Prediction {
    pub fn new(user_id: UserId, match_id: MatchId, outcome: PredictedOutcome, confidence: u8) -> Self {
        Self {
            id: new_id(),
            user_id,
            match_id,
            outcome,
            confidence: confidence.clamp(1, 100),
            status: PredictionStatus::Pending,
            resolved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_wire() {
        assert_eq!(PredictedOutcome::from_wire("home"), Some(PredictedOutcome::Home));
        assert_eq!(PredictedOutcome::from_wire(" AWAY "), Some(PredictedOutcome::Away));
        assert_eq!(PredictedOutcome::from_wire("tie"), None);
    }

    #[test]
    fn test_confidence_clamped() {
        let p = Prediction::new("u1".into(), "m1".into(), PredictedOutcome::Draw, 0);
        assert_eq!(p.confidence, 1);
        assert_eq!(p.status, PredictionStatus::Pending);
        assert!(p.resolved_at.is_none());
    }
}
