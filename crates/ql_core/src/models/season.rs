use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, SeasonId, TeamId};

/// At most one season is `Active` at any time. `Active -> Finished` happens
/// exactly when every owned match is finished (see `schedule`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Scheduled,
    Active,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub name: String,
    pub status: SeasonStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Teams competing this season; fixtures reference these ids.
    pub team_ids: Vec<TeamId>,
}

impl Season {
    pub fn new(
        name: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        team_ids: Vec<TeamId>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            status: SeasonStatus::Active,
            starts_at,
            ends_at,
            team_ids,
        }
    }
}

/// One row of the final table stored at archival time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingRow {
    pub team_id: TeamId,
    pub team_name: String,
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points_for: u64,
    pub points_against: u64,
    pub table_points: u32,
}

/// Written exactly once per season, when the completion check first observes
/// every match finished. Duplicate checks find the season already `Finished`
/// and do not re-archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonArchive {
    pub season_id: SeasonId,
    pub champion_team_id: TeamId,
    pub standings: Vec<StandingRow>,
    /// Virtual time of archival, not wall-clock.
    pub archived_at: DateTime<Utc>,
}
