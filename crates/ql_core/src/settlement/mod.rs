//! Bet and prediction settlement.
//!
//! `finish_match` is the single critical section per match. The conditional
//! status transition at the store is the duplicate-finish guard: of two
//! concurrent callers exactly one wins the swap, the other gets
//! `AlreadyFinished` and must observe zero mutations.
//!
//! Per-item failures (one bet failing to settle) are isolated into the
//! summary and never abort the rest; only the match transition and the
//! result/event persist are must-succeed.

pub mod rules;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{
    Bet, BetStatus, LedgerEntry, Match, MatchEvent, MatchId, MatchOutcome, MatchStatus,
    PredictionStatus, RecordDelta,
};
use crate::store::Store;

pub use rules::{
    evaluate, parse_selection, potential_payout, BetSelection, Evaluation, MatchFacts,
    SelectionError, Side,
};

/// What one `finish_match` call did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub match_id: MatchId,
    pub outcome: MatchOutcome,
    pub bets_won: u32,
    pub bets_lost: u32,
    pub predictions_correct: u32,
    pub predictions_incorrect: u32,
    /// Total credited to winners, in knuts.
    pub total_paid_out: i64,
    /// Items that could not be settled; kept for manual reconciliation.
    pub failures: Vec<SettlementFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementFailure {
    pub item_id: String,
    pub reason: String,
}

pub struct SettlementEngine {
    store: Arc<dyn Store>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Finish a match and settle everything that references it.
    ///
    /// `now` is the virtual date; all resolution timestamps use it.
    pub fn finish_match(
        &self,
        match_id: &MatchId,
        outcome: &MatchOutcome,
        events: &[MatchEvent],
        now: DateTime<Utc>,
    ) -> Result<SettlementSummary> {
        let m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;

        let prior = self.claim_finish(&m)?;

        // must-succeed persistence of the result itself; when it fails the
        // claim is released so a retry is not turned away as a duplicate
        let persisted = self
            .store
            .record_outcome(match_id, outcome)
            .and_then(|()| self.store.append_events(events));
        if let Err(err) = persisted {
            if let Err(rollback) =
                self.store.transition_match_status(match_id, MatchStatus::Finished, prior)
            {
                log::error!("match {match_id}: finish claim could not be released: {rollback}");
            }
            return Err(err.into());
        }

        let mut summary = SettlementSummary {
            match_id: match_id.clone(),
            outcome: outcome.clone(),
            bets_won: 0,
            bets_lost: 0,
            predictions_correct: 0,
            predictions_incorrect: 0,
            total_paid_out: 0,
            failures: Vec::new(),
        };

        let facts = MatchFacts {
            outcome,
            home_team_id: &m.home_team_id,
            away_team_id: &m.away_team_id,
        };

        for bet in self.store.pending_bets_for_match(match_id)? {
            if let Err(err) = self.settle_bet(&bet, &facts, now, &mut summary) {
                log::warn!("bet {} could not be settled: {err}", bet.id);
                summary
                    .failures
                    .push(SettlementFailure { item_id: bet.id.clone(), reason: err.to_string() });
            }
        }

        for prediction in self.store.pending_predictions_for_match(match_id)? {
            let correct = prediction.outcome == outcome.result_outcome();
            let status =
                if correct { PredictionStatus::Correct } else { PredictionStatus::Incorrect };
            match self.store.resolve_prediction(&prediction.id, status, now) {
                Ok(()) if correct => summary.predictions_correct += 1,
                Ok(()) => summary.predictions_incorrect += 1,
                Err(err) => {
                    log::warn!("prediction {} could not be resolved: {err}", prediction.id);
                    summary.failures.push(SettlementFailure {
                        item_id: prediction.id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        // one increment per team for exactly this match
        self.store.apply_team_result(
            &m.home_team_id,
            &RecordDelta::from_scores(outcome.home_score, outcome.away_score),
        )?;
        self.store.apply_team_result(
            &m.away_team_id,
            &RecordDelta::from_scores(outcome.away_score, outcome.home_score),
        )?;

        log::info!(
            "settled match {match_id}: {} bets won, {} lost, {} paid out, {} failures",
            summary.bets_won,
            summary.bets_lost,
            summary.total_paid_out,
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Win the status race or report `AlreadyFinished` without side effects.
    /// Returns the status the winning swap started from.
    fn claim_finish(&self, m: &Match) -> Result<MatchStatus> {
        match m.status {
            MatchStatus::Finished => {
                Err(CoreError::AlreadyFinished { match_id: m.id.clone() })
            }
            MatchStatus::Live | MatchStatus::Scheduled => {
                // try from the status we observed; on a lost race, try the
                // other unfinished status before giving up (a concurrent
                // start_live_match may have moved Scheduled -> Live under us)
                if self.store.transition_match_status(&m.id, m.status, MatchStatus::Finished)? {
                    return Ok(m.status);
                }
                let other = match m.status {
                    MatchStatus::Scheduled => MatchStatus::Live,
                    _ => MatchStatus::Scheduled,
                };
                if self.store.transition_match_status(&m.id, other, MatchStatus::Finished)? {
                    return Ok(other);
                }
                Err(CoreError::AlreadyFinished { match_id: m.id.clone() })
            }
        }
    }

    fn settle_bet(
        &self,
        bet: &Bet,
        facts: &MatchFacts<'_>,
        now: DateTime<Utc>,
        summary: &mut SettlementSummary,
    ) -> Result<()> {
        let verdict = match parse_selection(bet.kind, &bet.prediction) {
            Ok(selection) => evaluate(&selection, facts),
            // legacy/garbage payloads lose with a reason instead of crashing
            Err(err) => Evaluation { won: false, reason: format!("unreadable prediction: {err}") },
        };

        if verdict.won {
            self.store.set_bet_status(&bet.id, BetStatus::Won)?;
            self.store.credit(&bet.user_id, bet.potential_payout)?;
            self.store.append_ledger(&LedgerEntry::payout_credit(
                bet.user_id.clone(),
                bet.id.clone(),
                bet.potential_payout,
                now,
            ))?;
            summary.bets_won += 1;
            summary.total_paid_out += bet.potential_payout;
            log::debug!("bet {} won ({}): paid {}", bet.id, verdict.reason, bet.potential_payout);
        } else {
            self.store.set_bet_status(&bet.id, BetStatus::Lost)?;
            summary.bets_lost += 1;
            log::debug!("bet {} lost: {}", bet.id, verdict.reason);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BetKind, Match, PredictedOutcome, Prediction, Team, UserAccount};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: SettlementEngine,
        home: Team,
        away: Team,
        m: Match,
        user: UserAccount,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let home = Team::new("Holyhead Harpies", 85, 70, 88);
        let away = Team::new("Chudley Cannons", 55, 50, 45);
        store.insert_team(&home).unwrap();
        store.insert_team(&away).unwrap();
        let m = Match::new("season-1".into(), home.id.clone(), away.id.clone(), Utc::now());
        store.insert_match(&m).unwrap();
        let user = UserAccount::new("Seamus", 1_000);
        store.insert_user(&user).unwrap();
        let engine = SettlementEngine::new(store.clone() as Arc<dyn Store>);
        Fixture { store, engine, home, away, m, user }
    }

    fn outcome_snitch_home(fx: &Fixture) -> MatchOutcome {
        MatchOutcome {
            home_score: 190,
            away_score: 50,
            duration_minutes: 45,
            snitch_caught: true,
            snitch_caught_by: Some(fx.home.id.clone()),
        }
    }

    fn place(fx: &Fixture, kind: BetKind, prediction: &str, stake: i64, payout: i64) -> Bet {
        let bet = Bet::new(
            fx.user.id.clone(),
            fx.m.id.clone(),
            kind,
            prediction,
            stake,
            payout,
            Utc::now(),
        );
        fx.store.insert_bet(&bet).unwrap();
        bet
    }

    #[test]
    fn test_winning_bet_paid_exactly_once_with_ledger_row() {
        let fx = fixture();
        let bet = place(&fx, BetKind::Winner, "home", 100, 180);

        let summary =
            fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap();
        assert_eq!(summary.bets_won, 1);
        assert_eq!(summary.total_paid_out, 180);
        assert!(summary.failures.is_empty());

        assert_eq!(fx.store.bet(&bet.id).unwrap().unwrap().status, BetStatus::Won);
        assert_eq!(fx.store.user(&fx.user.id).unwrap().unwrap().balance, 1_180);
        let rows = fx.store.ledger_for_bet(&bet.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 180);
    }

    #[test]
    fn test_duplicate_finish_fails_with_zero_mutations() {
        let fx = fixture();
        place(&fx, BetKind::Winner, "home", 100, 180);
        let outcome = outcome_snitch_home(&fx);

        fx.engine.finish_match(&fx.m.id, &outcome, &[], Utc::now()).unwrap();
        let balance_after_first = fx.store.user(&fx.user.id).unwrap().unwrap().balance;
        let record_after_first = fx.store.team(&fx.home.id).unwrap().unwrap().record;

        let err = fx.engine.finish_match(&fx.m.id, &outcome, &[], Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinished { .. }));

        assert_eq!(fx.store.user(&fx.user.id).unwrap().unwrap().balance, balance_after_first);
        assert_eq!(fx.store.team(&fx.home.id).unwrap().unwrap().record, record_after_first);
        assert_eq!(fx.store.ledger_for_user(&fx.user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_score_bet_round_trip() {
        let fx = fixture();
        let exact = place(&fx, BetKind::Score, "190-50", 10, 80);
        let off_by_one = place(&fx, BetKind::Score, "190-51", 10, 80);

        fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap();
        assert_eq!(fx.store.bet(&exact.id).unwrap().unwrap().status, BetStatus::Won);
        assert_eq!(fx.store.bet(&off_by_one.id).unwrap().unwrap().status, BetStatus::Lost);
    }

    #[test]
    fn test_garbage_payload_loses_instead_of_crashing() {
        let fx = fixture();
        let legacy = place(&fx, BetKind::Score, "N/A", 10, 80);

        let summary =
            fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap();
        assert_eq!(summary.bets_lost, 1);
        assert!(summary.failures.is_empty(), "a lost bet is not a failure");
        assert_eq!(fx.store.bet(&legacy.id).unwrap().unwrap().status, BetStatus::Lost);
        // no money moved
        assert_eq!(fx.store.user(&fx.user.id).unwrap().unwrap().balance, 1_000);
    }

    #[test]
    fn test_combined_bet_settles_as_and() {
        let fx = fixture();
        let all_legs = place(&fx, BetKind::Combined, "winner:home,score:190-50,snitch:home,time:30-60", 10, 205);
        let one_bad_leg = place(&fx, BetKind::Combined, "winner:home,time:50-60", 10, 54);

        fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap();
        assert_eq!(fx.store.bet(&all_legs.id).unwrap().unwrap().status, BetStatus::Won);
        assert_eq!(fx.store.bet(&one_bad_leg.id).unwrap().unwrap().status, BetStatus::Lost);
    }

    #[test]
    fn test_predictions_resolved_with_virtual_time() {
        let fx = fixture();
        let correct = Prediction::new(fx.user.id.clone(), fx.m.id.clone(), PredictedOutcome::Home, 80);
        let wrong = Prediction::new(fx.user.id.clone(), fx.m.id.clone(), PredictedOutcome::Away, 30);
        fx.store.insert_prediction(&correct).unwrap();
        fx.store.insert_prediction(&wrong).unwrap();

        let virtual_now = Utc::now() - chrono::Duration::days(300);
        let summary =
            fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], virtual_now).unwrap();
        assert_eq!(summary.predictions_correct, 1);
        assert_eq!(summary.predictions_incorrect, 1);

        let resolved = fx.store.pending_predictions_for_match(&fx.m.id).unwrap();
        assert!(resolved.is_empty());
        // resolved_at is the virtual date we passed, not wall-clock
        let snapshot = fx.store.export().unwrap();
        for p in snapshot.predictions {
            assert_eq!(p.resolved_at, Some(virtual_now));
        }
    }

    #[test]
    fn test_team_aggregates_incremented_once() {
        let fx = fixture();
        fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap();

        let home = fx.store.team(&fx.home.id).unwrap().unwrap();
        assert_eq!(home.record.matches_played, 1);
        assert_eq!(home.record.wins, 1);
        assert_eq!(home.record.points_for, 190);
        assert_eq!(home.record.points_against, 50);

        let away = fx.store.team(&fx.away.id).unwrap().unwrap();
        assert_eq!(away.record.matches_played, 1);
        assert_eq!(away.record.losses, 1);
    }

    #[test]
    fn test_events_persisted_with_result() {
        let fx = fixture();
        let events = vec![MatchEvent::new(
            fx.m.id.clone(),
            12,
            crate::models::EventType::Goal,
            Some(fx.home.id.clone()),
            "goal",
            10,
        )];
        fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &events, Utc::now()).unwrap();
        assert_eq!(fx.store.events_for_match(&fx.m.id).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_result_persist_releases_the_finish_claim() {
        let fx = fixture();
        place(&fx, BetKind::Winner, "home", 100, 180);
        // a stray result row makes the outcome write collide
        fx.store.record_outcome(&fx.m.id, &outcome_snitch_home(&fx)).unwrap();

        let err =
            fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));

        // the claim was rolled back, not left stuck on Finished with the
        // bets stranded Pending
        let m = fx.store.match_by_id(&fx.m.id).unwrap().unwrap();
        assert_eq!(m.status, MatchStatus::Scheduled);
        assert_eq!(fx.store.pending_bets_for_match(&fx.m.id).unwrap().len(), 1);
        assert_eq!(fx.store.team(&fx.home.id).unwrap().unwrap().record.matches_played, 0);
    }

    #[test]
    fn test_finish_from_live_status() {
        let fx = fixture();
        assert!(fx
            .store
            .transition_match_status(&fx.m.id, MatchStatus::Scheduled, MatchStatus::Live)
            .unwrap());
        let summary =
            fx.engine.finish_match(&fx.m.id, &outcome_snitch_home(&fx), &[], Utc::now()).unwrap();
        assert_eq!(summary.match_id, fx.m.id);
        assert_eq!(
            fx.store.match_by_id(&fx.m.id).unwrap().unwrap().status,
            MatchStatus::Finished
        );
    }
}
