use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::prediction::PredictedOutcome;
use super::{new_id, MatchId, SeasonId, TeamId};

/// Match lifecycle. Transitions are strictly forward:
/// `Scheduled -> Live -> Finished`, enforced by the store's conditional
/// transition primitive, never by read-then-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// A fixture between two teams at a virtual-time slot.
///
/// Score, duration and snitch fields live inside `outcome` so they are absent
/// until the match is finished and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub season_id: SeasonId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub scheduled_at: DateTime<Utc>,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
}

impl Match {
    pub fn new(
        season_id: SeasonId,
        home_team_id: TeamId,
        away_team_id: TeamId,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            season_id,
            home_team_id,
            away_team_id,
            scheduled_at,
            status: MatchStatus::Scheduled,
            outcome: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }
}

/// Final result fields, written exactly once when the match finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub home_score: u32,
    pub away_score: u32,
    pub duration_minutes: u32,
    pub snitch_caught: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snitch_caught_by: Option<TeamId>,
}

impl MatchOutcome {
    /// Winner/draw judgement shared by `winner` bets and predictions.
    pub fn result_outcome(&self) -> PredictedOutcome {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => PredictedOutcome::Home,
            std::cmp::Ordering::Less => PredictedOutcome::Away,
            std::cmp::Ordering::Equal => PredictedOutcome::Draw,
        }
    }

    /// Canonical `"<home>-<away>"` score line used by exact-score bets.
    pub fn score_line(&self) -> String {
        format!("{}-{}", self.home_score, self.away_score)
    }
}
