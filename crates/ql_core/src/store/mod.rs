//! Persistence gateway.
//!
//! Everything above this boundary (clock, schedule, settlement, league
//! manager) talks to storage through the [`Store`] trait and nothing else.
//! The in-tree engine is [`MemoryStore`]; a SQL-backed implementation lives
//! behind the same trait in the web application.
//!
//! Three primitives here carry correctness weight and must be honoured by any
//! implementation:
//!
//! - [`Store::transition_match_status`] is a compare-and-swap. Duplicate
//!   "finish this match" calls race through it and exactly one wins; the
//!   loser sees `false` and must not mutate anything.
//! - [`Store::advance_clock`] is the same compare-and-swap for the clock
//!   date. Writers that lost the race see `false` and must re-read instead
//!   of overwriting, so the persisted date never moves backward.
//! - [`Store::apply_team_result`], [`Store::credit`] and [`Store::try_debit`]
//!   are atomic increments, never read-modify-write round-trips.

pub mod memory;
pub mod snapshot;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clock::ClockState;
use crate::models::{
    Bet, BetStatus, LedgerEntry, Match, MatchEvent, MatchOutcome, MatchStatus, PredictionStatus,
    RecordDelta, Season, SeasonArchive, SeasonStatus, Team, UserAccount,
};
use crate::models::{MatchId, Prediction, SeasonId, TeamId, UserId};

pub use memory::MemoryStore;
pub use snapshot::{load_snapshot, save_snapshot, LeagueSnapshot, SnapshotError, SNAPSHOT_VERSION};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for crate::error::CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => crate::error::CoreError::NotFound(what),
            other => crate::error::CoreError::Storage(other.to_string()),
        }
    }
}

pub trait Store: Send + Sync {
    // --- virtual clock (single record) ---
    fn load_clock(&self) -> StoreResult<Option<ClockState>>;
    /// Whole-record write. Only for first boot and snapshot import; running
    /// code moves the date through [`Store::advance_clock`].
    fn save_clock(&self, state: &ClockState) -> StoreResult<()>;
    /// Conditional date advance; mutates only the date and returns `false`
    /// when the persisted date no longer matches `from`.
    fn advance_clock(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<bool>;
    /// Targeted field write; leaves the date untouched.
    fn set_clock_speed(&self, multiplier: f64) -> StoreResult<()>;
    /// Targeted field write; leaves the date untouched.
    fn set_clock_auto_advance(&self, enabled: bool) -> StoreResult<()>;

    // --- teams ---
    fn insert_team(&self, team: &Team) -> StoreResult<()>;
    fn team(&self, id: &TeamId) -> StoreResult<Option<Team>>;
    fn teams(&self) -> StoreResult<Vec<Team>>;
    /// Apply one match's contribution to a team record as a single increment.
    fn apply_team_result(&self, team_id: &TeamId, delta: &RecordDelta) -> StoreResult<()>;
    fn grant_title(&self, team_id: &TeamId) -> StoreResult<()>;

    // --- seasons ---
    fn insert_season(&self, season: &Season) -> StoreResult<()>;
    fn season(&self, id: &SeasonId) -> StoreResult<Option<Season>>;
    fn active_season(&self) -> StoreResult<Option<Season>>;
    /// Conditional status transition; `false` means the from-status no longer
    /// matched and the caller lost the race.
    fn transition_season_status(
        &self,
        id: &SeasonId,
        from: SeasonStatus,
        to: SeasonStatus,
    ) -> StoreResult<bool>;
    fn insert_archive(&self, archive: &SeasonArchive) -> StoreResult<()>;
    fn archive_for_season(&self, season_id: &SeasonId) -> StoreResult<Option<SeasonArchive>>;

    // --- matches ---
    fn insert_match(&self, m: &Match) -> StoreResult<()>;
    fn match_by_id(&self, id: &MatchId) -> StoreResult<Option<Match>>;
    fn matches_for_season(&self, season_id: &SeasonId) -> StoreResult<Vec<Match>>;
    /// Unfinished matches whose slot has arrived at `now`, soonest first.
    /// Includes matches already moved to `Live` so an externally started
    /// match is still picked up by the autonomous paths.
    fn due_matches(&self, now: DateTime<Utc>) -> StoreResult<Vec<Match>>;
    /// Earliest match not yet finished, if any.
    fn next_unfinished_match(&self) -> StoreResult<Option<Match>>;
    /// The duplicate-finish guard. Compare-and-swap on match status.
    fn transition_match_status(
        &self,
        id: &MatchId,
        from: MatchStatus,
        to: MatchStatus,
    ) -> StoreResult<bool>;
    /// Write final result fields. Only valid on a match the caller just
    /// transitioned to `Finished`.
    fn record_outcome(&self, id: &MatchId, outcome: &MatchOutcome) -> StoreResult<()>;

    // --- match events (append-only log) ---
    fn append_events(&self, events: &[MatchEvent]) -> StoreResult<()>;
    fn events_for_match(&self, match_id: &MatchId) -> StoreResult<Vec<MatchEvent>>;

    // --- users & money ---
    fn insert_user(&self, user: &UserAccount) -> StoreResult<()>;
    fn user(&self, id: &UserId) -> StoreResult<Option<UserAccount>>;
    /// Atomic conditional debit; `false` if the balance is insufficient.
    fn try_debit(&self, user_id: &UserId, amount: i64) -> StoreResult<bool>;
    /// Atomic unconditional credit.
    fn credit(&self, user_id: &UserId, amount: i64) -> StoreResult<()>;

    // --- bets ---
    fn insert_bet(&self, bet: &Bet) -> StoreResult<()>;
    fn bet(&self, id: &str) -> StoreResult<Option<Bet>>;
    fn pending_bets_for_match(&self, match_id: &MatchId) -> StoreResult<Vec<Bet>>;
    fn set_bet_status(&self, bet_id: &str, status: BetStatus) -> StoreResult<()>;

    // --- predictions ---
    fn insert_prediction(&self, prediction: &Prediction) -> StoreResult<()>;
    fn pending_predictions_for_match(&self, match_id: &MatchId) -> StoreResult<Vec<Prediction>>;
    fn resolve_prediction(
        &self,
        prediction_id: &str,
        status: PredictionStatus,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // --- ledger ---
    fn append_ledger(&self, entry: &LedgerEntry) -> StoreResult<()>;
    fn ledger_for_bet(&self, bet_id: &str) -> StoreResult<Vec<LedgerEntry>>;
    fn ledger_for_user(&self, user_id: &UserId) -> StoreResult<Vec<LedgerEntry>>;

    // --- snapshot support ---
    fn export(&self) -> StoreResult<LeagueSnapshot>;
    fn import(&self, snapshot: LeagueSnapshot) -> StoreResult<()>;
}
