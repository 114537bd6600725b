//! In-memory store engine.
//!
//! All tables live behind one `RwLock`, so the conditional transitions and
//! balance/record increments are atomic with respect to each other, matching
//! what a SQL backend provides with conditional UPDATEs.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::clock::ClockState;
use crate::models::{
    Bet, BetStatus, LedgerEntry, Match, MatchEvent, MatchOutcome, MatchId, MatchStatus, Prediction,
    PredictionStatus, RecordDelta, Season, SeasonArchive, SeasonId, SeasonStatus, Team, TeamId,
    UserAccount, UserId,
};

use super::{LeagueSnapshot, Store, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    clock: Option<ClockState>,
    teams: HashMap<TeamId, Team>,
    seasons: HashMap<SeasonId, Season>,
    matches: HashMap<MatchId, Match>,
    events: HashMap<MatchId, Vec<MatchEvent>>,
    bets: HashMap<String, Bet>,
    predictions: HashMap<String, Prediction>,
    users: HashMap<UserId, UserAccount>,
    ledger: Vec<LedgerEntry>,
    archives: HashMap<SeasonId, SeasonArchive>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn load_clock(&self) -> StoreResult<Option<ClockState>> {
        Ok(self.read().clock.clone())
    }

    fn save_clock(&self, state: &ClockState) -> StoreResult<()> {
        self.write().clock = Some(state.clone());
        Ok(())
    }

    fn advance_clock(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.write();
        let clock =
            tables.clock.as_mut().ok_or_else(|| StoreError::NotFound("clock".into()))?;
        if clock.current_date != from {
            return Ok(false);
        }
        clock.current_date = to;
        Ok(true)
    }

    fn set_clock_speed(&self, multiplier: f64) -> StoreResult<()> {
        let mut tables = self.write();
        let clock =
            tables.clock.as_mut().ok_or_else(|| StoreError::NotFound("clock".into()))?;
        clock.speed_multiplier = multiplier;
        Ok(())
    }

    fn set_clock_auto_advance(&self, enabled: bool) -> StoreResult<()> {
        let mut tables = self.write();
        let clock =
            tables.clock.as_mut().ok_or_else(|| StoreError::NotFound("clock".into()))?;
        clock.auto_advance = enabled;
        Ok(())
    }

    fn insert_team(&self, team: &Team) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.teams.contains_key(&team.id) {
            return Err(StoreError::Duplicate(format!("team {}", team.id)));
        }
        tables.teams.insert(team.id.clone(), team.clone());
        Ok(())
    }

    fn team(&self, id: &TeamId) -> StoreResult<Option<Team>> {
        Ok(self.read().teams.get(id).cloned())
    }

    fn teams(&self) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self.read().teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    fn apply_team_result(&self, team_id: &TeamId, delta: &RecordDelta) -> StoreResult<()> {
        let mut tables = self.write();
        let team = tables
            .teams
            .get_mut(team_id)
            .ok_or_else(|| StoreError::NotFound(format!("team {team_id}")))?;
        team.record.apply(delta);
        Ok(())
    }

    fn grant_title(&self, team_id: &TeamId) -> StoreResult<()> {
        let mut tables = self.write();
        let team = tables
            .teams
            .get_mut(team_id)
            .ok_or_else(|| StoreError::NotFound(format!("team {team_id}")))?;
        team.record.titles += 1;
        Ok(())
    }

    fn insert_season(&self, season: &Season) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.seasons.contains_key(&season.id) {
            return Err(StoreError::Duplicate(format!("season {}", season.id)));
        }
        tables.seasons.insert(season.id.clone(), season.clone());
        Ok(())
    }

    fn season(&self, id: &SeasonId) -> StoreResult<Option<Season>> {
        Ok(self.read().seasons.get(id).cloned())
    }

    fn active_season(&self) -> StoreResult<Option<Season>> {
        Ok(self.read().seasons.values().find(|s| s.status == SeasonStatus::Active).cloned())
    }

    fn transition_season_status(
        &self,
        id: &SeasonId,
        from: SeasonStatus,
        to: SeasonStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.write();
        let season = tables
            .seasons
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("season {id}")))?;
        if season.status != from {
            return Ok(false);
        }
        season.status = to;
        Ok(true)
    }

    fn insert_archive(&self, archive: &SeasonArchive) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.archives.contains_key(&archive.season_id) {
            return Err(StoreError::Duplicate(format!("archive for season {}", archive.season_id)));
        }
        tables.archives.insert(archive.season_id.clone(), archive.clone());
        Ok(())
    }

    fn archive_for_season(&self, season_id: &SeasonId) -> StoreResult<Option<SeasonArchive>> {
        Ok(self.read().archives.get(season_id).cloned())
    }

    fn insert_match(&self, m: &Match) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.matches.contains_key(&m.id) {
            return Err(StoreError::Duplicate(format!("match {}", m.id)));
        }
        tables.matches.insert(m.id.clone(), m.clone());
        Ok(())
    }

    fn match_by_id(&self, id: &MatchId) -> StoreResult<Option<Match>> {
        Ok(self.read().matches.get(id).cloned())
    }

    fn matches_for_season(&self, season_id: &SeasonId) -> StoreResult<Vec<Match>> {
        let mut matches: Vec<Match> = self
            .read()
            .matches
            .values()
            .filter(|m| &m.season_id == season_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.scheduled_at);
        Ok(matches)
    }

    fn due_matches(&self, now: DateTime<Utc>) -> StoreResult<Vec<Match>> {
        let mut due: Vec<Match> = self
            .read()
            .matches
            .values()
            .filter(|m| m.status != MatchStatus::Finished && m.scheduled_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|m| m.scheduled_at);
        Ok(due)
    }

    fn next_unfinished_match(&self) -> StoreResult<Option<Match>> {
        Ok(self
            .read()
            .matches
            .values()
            .filter(|m| m.status != MatchStatus::Finished)
            .min_by_key(|m| m.scheduled_at)
            .cloned())
    }

    fn transition_match_status(
        &self,
        id: &MatchId,
        from: MatchStatus,
        to: MatchStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.write();
        let m = tables
            .matches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))?;
        if m.status != from {
            return Ok(false);
        }
        m.status = to;
        Ok(true)
    }

    fn record_outcome(&self, id: &MatchId, outcome: &MatchOutcome) -> StoreResult<()> {
        let mut tables = self.write();
        let m = tables
            .matches
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))?;
        if m.outcome.is_some() {
            return Err(StoreError::Duplicate(format!("outcome for match {id}")));
        }
        m.outcome = Some(outcome.clone());
        Ok(())
    }

    fn append_events(&self, events: &[MatchEvent]) -> StoreResult<()> {
        let mut tables = self.write();
        for event in events {
            tables.events.entry(event.match_id.clone()).or_default().push(event.clone());
        }
        Ok(())
    }

    fn events_for_match(&self, match_id: &MatchId) -> StoreResult<Vec<MatchEvent>> {
        Ok(self.read().events.get(match_id).cloned().unwrap_or_default())
    }

    fn insert_user(&self, user: &UserAccount) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn user(&self, id: &UserId) -> StoreResult<Option<UserAccount>> {
        Ok(self.read().users.get(id).cloned())
    }

    fn try_debit(&self, user_id: &UserId, amount: i64) -> StoreResult<bool> {
        let mut tables = self.write();
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        if user.balance < amount {
            return Ok(false);
        }
        user.balance -= amount;
        Ok(true)
    }

    fn credit(&self, user_id: &UserId, amount: i64) -> StoreResult<()> {
        let mut tables = self.write();
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        user.balance += amount;
        Ok(())
    }

    fn insert_bet(&self, bet: &Bet) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.bets.contains_key(&bet.id) {
            return Err(StoreError::Duplicate(format!("bet {}", bet.id)));
        }
        tables.bets.insert(bet.id.clone(), bet.clone());
        Ok(())
    }

    fn bet(&self, id: &str) -> StoreResult<Option<Bet>> {
        Ok(self.read().bets.get(id).cloned())
    }

    fn pending_bets_for_match(&self, match_id: &MatchId) -> StoreResult<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .read()
            .bets
            .values()
            .filter(|b| &b.match_id == match_id && b.status == BetStatus::Pending)
            .cloned()
            .collect();
        bets.sort_by_key(|b| b.placed_at);
        Ok(bets)
    }

    fn set_bet_status(&self, bet_id: &str, status: BetStatus) -> StoreResult<()> {
        let mut tables = self.write();
        let bet = tables
            .bets
            .get_mut(bet_id)
            .ok_or_else(|| StoreError::NotFound(format!("bet {bet_id}")))?;
        if bet.status != BetStatus::Pending {
            return Err(StoreError::Duplicate(format!("bet {bet_id} already settled")));
        }
        bet.status = status;
        Ok(())
    }

    fn insert_prediction(&self, prediction: &Prediction) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.predictions.contains_key(&prediction.id) {
            return Err(StoreError::Duplicate(format!("prediction {}", prediction.id)));
        }
        tables.predictions.insert(prediction.id.clone(), prediction.clone());
        Ok(())
    }

    fn pending_predictions_for_match(&self, match_id: &MatchId) -> StoreResult<Vec<Prediction>> {
        Ok(self
            .read()
            .predictions
            .values()
            .filter(|p| &p.match_id == match_id && p.status == PredictionStatus::Pending)
            .cloned()
            .collect())
    }

    fn resolve_prediction(
        &self,
        prediction_id: &str,
        status: PredictionStatus,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.write();
        let prediction = tables
            .predictions
            .get_mut(prediction_id)
            .ok_or_else(|| StoreError::NotFound(format!("prediction {prediction_id}")))?;
        if prediction.status != PredictionStatus::Pending {
            return Err(StoreError::Duplicate(format!("prediction {prediction_id} already resolved")));
        }
        prediction.status = status;
        prediction.resolved_at = Some(resolved_at);
        Ok(())
    }

    fn append_ledger(&self, entry: &LedgerEntry) -> StoreResult<()> {
        self.write().ledger.push(entry.clone());
        Ok(())
    }

    fn ledger_for_bet(&self, bet_id: &str) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.read().ledger.iter().filter(|e| e.bet_id == bet_id).cloned().collect())
    }

    fn ledger_for_user(&self, user_id: &UserId) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.read().ledger.iter().filter(|e| &e.user_id == user_id).cloned().collect())
    }

    fn export(&self) -> StoreResult<LeagueSnapshot> {
        let tables = self.read();
        Ok(LeagueSnapshot {
            clock: tables.clock.clone(),
            teams: tables.teams.values().cloned().collect(),
            seasons: tables.seasons.values().cloned().collect(),
            matches: tables.matches.values().cloned().collect(),
            events: tables.events.values().flatten().cloned().collect(),
            bets: tables.bets.values().cloned().collect(),
            predictions: tables.predictions.values().cloned().collect(),
            users: tables.users.values().cloned().collect(),
            ledger: tables.ledger.clone(),
            archives: tables.archives.values().cloned().collect(),
        })
    }

    fn import(&self, snapshot: LeagueSnapshot) -> StoreResult<()> {
        let mut tables = self.write();
        *tables = Tables::default();
        tables.clock = snapshot.clock;
        for team in snapshot.teams {
            tables.teams.insert(team.id.clone(), team);
        }
        for season in snapshot.seasons {
            tables.seasons.insert(season.id.clone(), season);
        }
        for m in snapshot.matches {
            tables.matches.insert(m.id.clone(), m);
        }
        let mut events = snapshot.events;
        events.sort_by_key(|e| e.minute);
        for event in events {
            tables.events.entry(event.match_id.clone()).or_default().push(event);
        }
        for bet in snapshot.bets {
            tables.bets.insert(bet.id.clone(), bet);
        }
        for prediction in snapshot.predictions {
            tables.predictions.insert(prediction.id.clone(), prediction);
        }
        for user in snapshot.users {
            tables.users.insert(user.id.clone(), user);
        }
        tables.ledger = snapshot.ledger;
        for archive in snapshot.archives {
            tables.archives.insert(archive.season_id.clone(), archive);
        }
        Ok(())
    }
}
