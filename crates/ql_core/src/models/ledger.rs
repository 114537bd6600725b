use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    StakeDebit,
    PayoutCredit,
}

/// Append-only money movement, one row per balance change.
///
/// The ledger is the duplication tripwire: a bet with two payout rows is a
/// settlement bug by definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: UserId,
    pub kind: LedgerKind,
    /// Signed amount in knuts: negative for debits, positive for credits.
    pub amount: i64,
    pub bet_id: String,
    /// Virtual time of the movement.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn stake_debit(user_id: UserId, bet_id: String, stake: i64, at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            user_id,
            kind: LedgerKind::StakeDebit,
            amount: -stake.abs(),
            bet_id,
            created_at: at,
        }
    }

    pub fn payout_credit(user_id: UserId, bet_id: String, payout: i64, at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            user_id,
            kind: LedgerKind::PayoutCredit,
            amount: payout.abs(),
            bet_id,
            created_at: at,
        }
    }
}
