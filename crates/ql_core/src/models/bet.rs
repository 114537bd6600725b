use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, MatchId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetKind {
    Winner,
    Score,
    Snitch,
    Time,
    Combined,
}

impl BetKind {
    /// Fixed decimal odds per kind. Combined bets multiply their legs' odds
    /// instead of using this table directly.
    pub fn odds(&self) -> f64 {
        match self {
            BetKind::Winner => 1.8,
            BetKind::Score => 8.0,
            BetKind::Snitch => 1.9,
            BetKind::Time => 3.0,
            BetKind::Combined => 1.0,
        }
    }
}

impl std::fmt::Display for BetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetKind::Winner => "winner",
            BetKind::Score => "score",
            BetKind::Snitch => "snitch",
            BetKind::Time => "time",
            BetKind::Combined => "combined",
        };
        f.write_str(s)
    }
}

/// `Pending -> Won | Lost`, exactly once, only via settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

/// A wager on one match.
///
/// `prediction` keeps the wire encoding (`"home"`, `"190-50"`,
/// `"winner:home,score:180-70,..."`). The typed form lives in
/// `settlement::rules::BetSelection`; placement parses the payload once and
/// rejects garbage up front, but settlement still treats an unparseable stored
/// payload as a lost bet rather than a crash (legacy rows exist).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub user_id: UserId,
    pub match_id: MatchId,
    pub kind: BetKind,
    pub prediction: String,
    /// Stake in knuts (integer money, no floats in balances).
    pub stake: i64,
    pub potential_payout: i64,
    pub status: BetStatus,
    pub placed_at: DateTime<Utc>,
}

impl Bet {
    pub fn new(
        user_id: UserId,
        match_id: MatchId,
        kind: BetKind,
        prediction: impl Into<String>,
        stake: i64,
        potential_payout: i64,
        placed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            user_id,
            match_id,
            kind,
            prediction: prediction.into(),
            stake,
            potential_payout,
            status: BetStatus::Pending,
            placed_at,
        }
    }
}
