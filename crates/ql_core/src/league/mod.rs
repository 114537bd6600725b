//! League orchestration.
//!
//! [`LeagueManager`] wires the clock, simulation engine, schedule and
//! settlement together behind one entry point. Time only moves through it,
//! and every mutation ends with a [`ChangeEvent`] on the bus.
//!
//! Simulation is pure and runs in parallel across due matches; settlement
//! for each match then runs sequentially because it mutates shared balances
//! and team records.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::clock::{TimeUnit, VirtualClock};
use crate::engine::{derive_match_seed, MatchEngine, MatchPlan, SimulatedMatch};
use crate::error::{CoreError, Result};
use crate::models::{
    Bet, BetKind, LedgerEntry, Match, MatchId, MatchStatus, PredictedOutcome, Prediction, Season,
    StandingRow, Team, UserAccount, UserId,
};
use crate::notify::{ChangeBus, ChangeEvent};
use crate::schedule::{self, ScheduleSettings};
use crate::settlement::{parse_selection, potential_payout, SettlementEngine, SettlementSummary};
use crate::store::{load_snapshot, save_snapshot, Store};

/// Starting roster for a fresh installation.
const DEFAULT_TEAMS: &[(&str, u8, u8, u8)] = &[
    ("Holyhead Harpies", 85, 74, 88),
    ("Puddlemere United", 80, 82, 75),
    ("Montrose Magpies", 78, 80, 82),
    ("Appleby Arrows", 72, 70, 77),
    ("Wimbourne Wasps", 70, 75, 68),
    ("Chudley Cannons", 55, 52, 48),
];

pub struct LeagueManager {
    store: Arc<dyn Store>,
    clock: VirtualClock,
    settlement: SettlementEngine,
    bus: ChangeBus,
    league_seed: u64,
    schedule_settings: ScheduleSettings,
}

impl LeagueManager {
    pub fn open(store: Arc<dyn Store>, league_seed: u64) -> Result<Self> {
        let clock = VirtualClock::open(store.clone())?;
        let settlement = SettlementEngine::new(store.clone());
        Ok(Self {
            store,
            clock,
            settlement,
            bus: ChangeBus::new(),
            league_seed,
            schedule_settings: ScheduleSettings::default(),
        })
    }

    pub fn with_schedule_settings(mut self, settings: ScheduleSettings) -> Self {
        self.schedule_settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn subscribe(&self) -> std::sync::mpsc::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }

    /// Seed a fresh installation: default teams if none exist, and an active
    /// season over whatever teams are present. Safe to call on every boot.
    pub fn bootstrap(&self) -> Result<()> {
        if self.store.teams()?.is_empty() {
            for (name, attack, defense, seeker) in DEFAULT_TEAMS {
                self.store.insert_team(&Team::new(*name, *attack, *defense, *seeker))?;
            }
            log::info!("seeded {} default teams", DEFAULT_TEAMS.len());
        }
        if self.store.active_season()?.is_none() {
            self.start_new_season("Season 1")?;
        }
        Ok(())
    }

    fn start_new_season(&self, name: &str) -> Result<Season> {
        let teams = self.store.teams()?;
        let start = self.clock.current_date()?;
        let (season, matches) =
            schedule::generate_season(name, &teams, start, &self.schedule_settings)?;
        self.store.insert_season(&season)?;
        for m in &matches {
            self.store.insert_match(m)?;
        }
        self.bus.publish(ChangeEvent::ScheduleChanged { season_id: season.id.clone() });
        Ok(season)
    }

    // --- time control ---

    /// Advance the clock and play everything that became due.
    pub fn advance_time(&self, amount: i64, unit: TimeUnit) -> Result<Vec<SettlementSummary>> {
        let now = self.clock.advance(amount, unit)?;
        self.bus.publish(ChangeEvent::ClockAdvanced { current_date: now });
        self.play_due_matches(now)
    }

    /// Jump to the next unfinished match's slot and play it (plus anything
    /// else due at that instant). Errors with `NotFound` when the schedule
    /// is exhausted and no season rollover is possible.
    pub fn advance_to_next_match(&self) -> Result<Vec<SettlementSummary>> {
        let next = self
            .store
            .next_unfinished_match()?
            .ok_or_else(|| CoreError::NotFound("no unfinished matches".into()))?;
        let current = self.clock.current_date()?;
        let now = if next.scheduled_at > current {
            let advanced = self.clock.advance_to(next.scheduled_at)?;
            self.bus.publish(ChangeEvent::ClockAdvanced { current_date: advanced });
            advanced
        } else {
            current
        };
        self.play_due_matches(now)
    }

    /// Autonomous tick while auto-advance is on.
    pub fn tick(&self, real_elapsed: StdDuration) -> Result<Vec<SettlementSummary>> {
        match self.clock.tick(real_elapsed)? {
            Some(now) => {
                self.bus.publish(ChangeEvent::ClockAdvanced { current_date: now });
                self.play_due_matches(now)
            }
            None => Ok(Vec::new()),
        }
    }

    // --- match lifecycle ---

    /// Move one match to `Live` ahead of simulating it. Conflict when the
    /// match is not in `Scheduled` status.
    pub fn start_live_match(&self, match_id: &MatchId) -> Result<()> {
        let m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        if !self.store.transition_match_status(
            match_id,
            MatchStatus::Scheduled,
            MatchStatus::Live,
        )? {
            return Err(CoreError::InvalidStatus {
                match_id: match_id.clone(),
                expected: MatchStatus::Scheduled,
                actual: m.status,
            });
        }
        self.bus.publish(ChangeEvent::MatchStarted { match_id: match_id.clone() });
        Ok(())
    }

    /// Simulate and settle every unfinished match whose slot has arrived.
    ///
    /// Scheduled matches are first claimed with a `Scheduled -> Live` swap so
    /// a concurrent caller processing the same backlog skips them; matches
    /// already live (started via [`LeagueManager::start_live_match`]) are
    /// picked up as-is and the duplicate-finish guard in settlement decides
    /// who wins. One unplayable match never aborts the batch: its failure is
    /// logged and the rest settles.
    pub fn play_due_matches(&self, now: DateTime<Utc>) -> Result<Vec<SettlementSummary>> {
        let mut plans = Vec::new();
        for m in self.store.due_matches(now)? {
            if m.status == MatchStatus::Scheduled {
                if !self.store.transition_match_status(
                    &m.id,
                    MatchStatus::Scheduled,
                    MatchStatus::Live,
                )? {
                    continue;
                }
                self.bus.publish(ChangeEvent::MatchStarted { match_id: m.id.clone() });
            }
            match self.plan_for(&m) {
                Ok(plan) => plans.push(plan),
                Err(err) => log::error!("match {} cannot be simulated: {err}", m.id),
            }
        }
        if plans.is_empty() {
            return Ok(Vec::new());
        }

        let simulated: Vec<(MatchId, Result<SimulatedMatch>)> = plans
            .into_par_iter()
            .map(|plan| {
                let id = plan.match_id.clone();
                let sim = MatchEngine::new(plan).map(MatchEngine::simulate);
                (id, sim)
            })
            .collect();

        let mut summaries = Vec::with_capacity(simulated.len());
        for (match_id, sim) in simulated {
            let sim = match sim {
                Ok(sim) => sim,
                Err(err) => {
                    log::error!("match {match_id} cannot be simulated: {err}");
                    continue;
                }
            };
            match self.settle_simulated(&match_id, &sim, now) {
                Ok(summary) => summaries.push(summary),
                // a lost finish race or a per-match fault leaves the rest of
                // the batch to settle normally
                Err(err) => log::warn!("match {match_id} was not settled: {err}"),
            }
        }
        Ok(summaries)
    }

    /// Simulate and settle one match regardless of its scheduled slot.
    pub fn finish_match(&self, match_id: &MatchId) -> Result<SettlementSummary> {
        let m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        if m.status == MatchStatus::Finished {
            return Err(CoreError::AlreadyFinished { match_id: match_id.clone() });
        }
        let sim = MatchEngine::new(self.plan_for(&m)?)?.simulate();
        let now = self.clock.current_date()?;
        self.settle_simulated(match_id, &sim, now)
    }

    fn plan_for(&self, m: &Match) -> Result<MatchPlan> {
        let home = self
            .store
            .team(&m.home_team_id)?
            .ok_or_else(|| CoreError::NotFound(format!("team {}", m.home_team_id)))?;
        let away = self
            .store
            .team(&m.away_team_id)?
            .ok_or_else(|| CoreError::NotFound(format!("team {}", m.away_team_id)))?;
        let season = self
            .store
            .season(&m.season_id)?
            .ok_or_else(|| CoreError::NotFound(format!("season {}", m.season_id)))?;
        // seed from the stable identity, not the row id, so two leagues
        // bootstrapped with the same seed replay the same results
        let key = format!("{}|{}|{}", season.name, home.name, away.name);
        Ok(MatchPlan::new(m.id.clone(), home, away, derive_match_seed(self.league_seed, &key)))
    }

    fn settle_simulated(
        &self,
        match_id: &MatchId,
        sim: &SimulatedMatch,
        now: DateTime<Utc>,
    ) -> Result<SettlementSummary> {
        let summary =
            self.settlement.finish_match(match_id, &sim.outcome(), &sim.events, now)?;
        self.bus.publish(ChangeEvent::MatchFinished { match_id: match_id.clone() });
        if summary.bets_won + summary.bets_lost > 0 {
            self.bus.publish(ChangeEvent::BalancesChanged);
        }
        self.check_rollover(match_id, now)?;
        Ok(summary)
    }

    /// After a finish, archive the season if it just completed and roll a
    /// fresh fixture list so the league never runs dry.
    fn check_rollover(&self, match_id: &MatchId, now: DateTime<Utc>) -> Result<()> {
        let Some(m) = self.store.match_by_id(match_id)? else { return Ok(()) };
        let Some(season) = self.store.season(&m.season_id)? else { return Ok(()) };
        let already_archived = self.store.archive_for_season(&season.id)?.is_some();
        if !schedule::check_season_completion(self.store.as_ref(), &season.id, now)? {
            return Ok(());
        }
        if !already_archived {
            self.bus.publish(ChangeEvent::SeasonArchived { season_id: season.id.clone() });
            let next = self.start_new_season(&next_season_name(&season.name))?;
            log::info!("rolled over from {} to {}", season.name, next.name);
        }
        Ok(())
    }

    // --- betting and predictions ---

    /// Validate, debit the stake, and record the bet. The stake leaves the
    /// balance at placement time via the conditional debit; a bounced debit
    /// never records a bet.
    pub fn place_bet(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
        kind: BetKind,
        prediction: &str,
        stake: i64,
    ) -> Result<Bet> {
        if stake <= 0 {
            return Err(CoreError::Validation(format!("stake must be positive, got {stake}")));
        }
        let m = self.open_match_for_wagers(match_id)?;
        let selection = parse_selection(kind, prediction)
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        let payout = potential_payout(stake, &selection);

        if !self.store.try_debit(user_id, stake)? {
            let balance = self
                .store
                .user(user_id)?
                .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))?
                .balance;
            return Err(CoreError::InsufficientFunds {
                user_id: user_id.clone(),
                balance,
                required: stake,
            });
        }

        let placed_at = self.clock.current_date()?;
        let bet = Bet::new(
            user_id.clone(),
            m.id.clone(),
            kind,
            prediction,
            stake,
            payout,
            placed_at,
        );
        self.store.insert_bet(&bet)?;
        self.store.append_ledger(&LedgerEntry::stake_debit(
            user_id.clone(),
            bet.id.clone(),
            stake,
            placed_at,
        ))?;
        self.bus.publish(ChangeEvent::BalancesChanged);
        log::debug!("bet {} placed: {kind} {prediction} for {stake}", bet.id);
        Ok(bet)
    }

    /// Free outcome prediction, no stake.
    pub fn place_prediction(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
        outcome: &str,
        confidence: u8,
    ) -> Result<Prediction> {
        let m = self.open_match_for_wagers(match_id)?;
        let outcome = PredictedOutcome::from_wire(outcome).ok_or_else(|| {
            CoreError::Validation(format!("unknown predicted outcome: {outcome}"))
        })?;
        if self.store.user(user_id)?.is_none() {
            return Err(CoreError::NotFound(format!("user {user_id}")));
        }
        let prediction = Prediction::new(user_id.clone(), m.id.clone(), outcome, confidence);
        self.store.insert_prediction(&prediction)?;
        Ok(prediction)
    }

    /// Wagers close the moment a match leaves `Scheduled`.
    fn open_match_for_wagers(&self, match_id: &MatchId) -> Result<Match> {
        let m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        if m.status != MatchStatus::Scheduled {
            return Err(CoreError::InvalidStatus {
                match_id: match_id.clone(),
                expected: MatchStatus::Scheduled,
                actual: m.status,
            });
        }
        Ok(m)
    }

    pub fn register_user(&self, name: &str, starting_balance: i64) -> Result<UserAccount> {
        if starting_balance < 0 {
            return Err(CoreError::Validation("starting balance cannot be negative".into()));
        }
        let user = UserAccount::new(name, starting_balance);
        self.store.insert_user(&user)?;
        self.bus.publish(ChangeEvent::BalancesChanged);
        Ok(user)
    }

    // --- views ---

    pub fn standings(&self) -> Result<Vec<StandingRow>> {
        let season = self
            .store
            .active_season()?
            .ok_or_else(|| CoreError::NotFound("no active season".into()))?;
        schedule::build_standings(self.store.as_ref(), &season)
    }

    // --- snapshots ---

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let snapshot = self.store.export()?;
        save_snapshot(path, &snapshot).map_err(|e| CoreError::Storage(e.to_string()))?;
        log::info!("league snapshot written to {}", path.display());
        Ok(())
    }

    pub fn load_from(&self, path: &Path) -> Result<()> {
        let snapshot = load_snapshot(path).map_err(|e| CoreError::Storage(e.to_string()))?;
        self.store.import(snapshot)?;
        self.bus.publish(ChangeEvent::ClockAdvanced {
            current_date: self.clock.current_date()?,
        });
        if let Some(season) = self.store.active_season()? {
            self.bus.publish(ChangeEvent::ScheduleChanged { season_id: season.id });
        }
        self.bus.publish(ChangeEvent::BalancesChanged);
        log::info!("league snapshot restored from {}", path.display());
        Ok(())
    }
}

/// "Season 3" -> "Season 4"; anything unnumbered gets " II" appended.
fn next_season_name(current: &str) -> String {
    match current.rsplit_once(' ') {
        Some((prefix, number)) => match number.parse::<u64>() {
            Ok(n) => format!("{prefix} {}", n + 1),
            Err(_) => format!("{current} II"),
        },
        None => format!("{current} II"),
    }
}
