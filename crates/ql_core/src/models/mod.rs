pub mod bet;
pub mod events;
pub mod ledger;
pub mod matches;
pub mod prediction;
pub mod season;
pub mod team;
pub mod user;

pub use bet::{Bet, BetKind, BetStatus};
pub use events::{EventType, MatchEvent};
pub use ledger::{LedgerEntry, LedgerKind};
pub use matches::{Match, MatchOutcome, MatchStatus};
pub use prediction::{PredictedOutcome, Prediction, PredictionStatus};
pub use season::{Season, SeasonArchive, SeasonStatus, StandingRow};
pub use team::{RecordDelta, Team, TeamRecord};
pub use user::UserAccount;

/// String ids throughout (UUID v4 at creation time).
pub type TeamId = String;
pub type SeasonId = String;
pub type MatchId = String;
pub type UserId = String;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
