use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{CoreError, Result};
use crate::models::{EventType, MatchEvent, MatchId, MatchOutcome, Team, TeamId};

use super::params::{DEFAULT_DURATION_CAP_MIN, QUAFFLE_GOAL_POINTS, SNITCH_BONUS_POINTS};
use super::probability::{goal_probability, save_probability, snitch_probability};

/// Everything the engine needs to run one match.
#[derive(Debug, Clone)]
pub struct MatchPlan {
    pub match_id: MatchId,
    pub home_team: Team,
    pub away_team: Team,
    pub duration_cap_minutes: u32,
    pub seed: u64,
}

impl MatchPlan {
    pub fn new(match_id: MatchId, home_team: Team, away_team: Team, seed: u64) -> Self {
        Self {
            match_id,
            home_team,
            away_team,
            duration_cap_minutes: DEFAULT_DURATION_CAP_MIN,
            seed,
        }
    }
}

/// Engine output: final figures plus the full event log.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMatch {
    pub home_score: u32,
    pub away_score: u32,
    pub duration_minutes: u32,
    pub snitch_caught: bool,
    pub snitch_caught_by: Option<TeamId>,
    pub events: Vec<MatchEvent>,
}

impl SimulatedMatch {
    pub fn outcome(&self) -> MatchOutcome {
        MatchOutcome {
            home_score: self.home_score,
            away_score: self.away_score,
            duration_minutes: self.duration_minutes,
            snitch_caught: self.snitch_caught,
            snitch_caught_by: self.snitch_caught_by.clone(),
        }
    }
}

/// Minute-tick match simulator.
///
/// Draw order within a minute is fixed (home goal, away goal, home save,
/// away save, home snitch, away snitch) - reordering the draws changes every
/// replay, so it is part of the determinism contract.
pub struct MatchEngine {
    plan: MatchPlan,
    rng: ChaCha8Rng,
}

impl MatchEngine {
    pub fn new(plan: MatchPlan) -> Result<Self> {
        if plan.duration_cap_minutes == 0 {
            return Err(CoreError::Validation("duration cap must be at least 1 minute".into()));
        }
        if plan.home_team.id == plan.away_team.id {
            return Err(CoreError::Validation(format!(
                "a team cannot play itself: {}",
                plan.home_team.id
            )));
        }
        let rng = ChaCha8Rng::seed_from_u64(plan.seed);
        Ok(Self { plan, rng })
    }

    pub fn simulate(mut self) -> SimulatedMatch {
        let cap = self.plan.duration_cap_minutes;
        let home = self.plan.home_team.clone();
        let away = self.plan.away_team.clone();

        let mut home_score: u32 = 0;
        let mut away_score: u32 = 0;
        let mut events: Vec<MatchEvent> = Vec::new();

        events.push(self.event(
            0,
            EventType::MatchStart,
            None,
            format!("{} vs {}", home.name, away.name),
            0,
        ));

        let home_goal_p = goal_probability(home.attack_strength, away.defense_strength);
        let away_goal_p = goal_probability(away.attack_strength, home.defense_strength);
        let home_save_p = save_probability(away.attack_strength, home.defense_strength);
        let away_save_p = save_probability(home.attack_strength, away.defense_strength);

        let mut duration = cap;
        let mut snitch_caught_by: Option<TeamId> = None;

        for minute in 1..=cap {
            if self.rng.gen_bool(home_goal_p) {
                home_score += QUAFFLE_GOAL_POINTS;
                events.push(self.event(
                    minute,
                    EventType::Goal,
                    Some(home.id.clone()),
                    format!("{} score through the hoops", home.name),
                    QUAFFLE_GOAL_POINTS,
                ));
            }
            if self.rng.gen_bool(away_goal_p) {
                away_score += QUAFFLE_GOAL_POINTS;
                events.push(self.event(
                    minute,
                    EventType::Goal,
                    Some(away.id.clone()),
                    format!("{} score through the hoops", away.name),
                    QUAFFLE_GOAL_POINTS,
                ));
            }
            if self.rng.gen_bool(home_save_p) {
                events.push(self.event(
                    minute,
                    EventType::Save,
                    Some(home.id.clone()),
                    format!("{} keeper turns the quaffle away", home.name),
                    0,
                ));
            }
            if self.rng.gen_bool(away_save_p) {
                events.push(self.event(
                    minute,
                    EventType::Save,
                    Some(away.id.clone()),
                    format!("{} keeper turns the quaffle away", away.name),
                    0,
                ));
            }

            let home_snitch_p = snitch_probability(home.seeker_skill, minute, cap);
            let away_snitch_p = snitch_probability(away.seeker_skill, minute, cap);
            let catcher = if self.rng.gen_bool(home_snitch_p) {
                Some(&home)
            } else if self.rng.gen_bool(away_snitch_p) {
                Some(&away)
            } else {
                None
            };

            if let Some(team) = catcher {
                if team.id == home.id {
                    home_score += SNITCH_BONUS_POINTS;
                } else {
                    away_score += SNITCH_BONUS_POINTS;
                }
                events.push(self.event(
                    minute,
                    EventType::SnitchCatch,
                    Some(team.id.clone()),
                    format!("{} seeker catches the golden snitch!", team.name),
                    SNITCH_BONUS_POINTS,
                ));
                snitch_caught_by = Some(team.id.clone());
                duration = minute;
                break;
            }
        }

        events.push(self.event(
            duration,
            EventType::MatchEnd,
            None,
            format!("final score {home_score}-{away_score}"),
            0,
        ));

        log::debug!(
            "simulated match {}: {} {home_score} - {away_score} {} in {duration}min (snitch: {})",
            self.plan.match_id,
            home.name,
            away.name,
            snitch_caught_by.as_deref().unwrap_or("not caught"),
        );

        SimulatedMatch {
            home_score,
            away_score,
            duration_minutes: duration,
            snitch_caught: snitch_caught_by.is_some(),
            snitch_caught_by,
            events,
        }
    }

    fn event(
        &self,
        minute: u32,
        event_type: EventType,
        team_id: Option<TeamId>,
        description: String,
        points: u32,
    ) -> MatchEvent {
        MatchEvent::new(self.plan.match_id.clone(), minute, event_type, team_id, description, points)
    }
}
