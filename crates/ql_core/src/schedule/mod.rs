//! Fixture generation and season completion.
//!
//! Seasons are double round-robin by default, anchored to the virtual clock's
//! date at generation time so a new season always starts "now" in virtual
//! time, regardless of wall-clock.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, Result};
use crate::models::{
    Match, Season, SeasonArchive, SeasonId, SeasonStatus, StandingRow, Team, TeamId,
};
use crate::store::Store;

/// Minimum number of teams for a meaningful fixture list.
pub const MIN_TEAMS: usize = 2;

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// Virtual days between consecutive rounds.
    pub days_between_rounds: i64,
    /// Hours between matches inside the same round.
    pub hours_between_matches: i64,
    /// Mirror the fixture list with home/away swapped.
    pub double_round_robin: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self { days_between_rounds: 7, hours_between_matches: 3, double_round_robin: true }
    }
}

/// Generate a season and its fixture list. Pure: the caller persists both.
pub fn generate_season(
    name: impl Into<String>,
    teams: &[Team],
    start_date: DateTime<Utc>,
    settings: &ScheduleSettings,
) -> Result<(Season, Vec<Match>)> {
    if teams.len() < MIN_TEAMS {
        return Err(CoreError::InsufficientTeams { minimum: MIN_TEAMS, found: teams.len() });
    }

    let rounds = round_robin_rounds(&teams.iter().map(|t| t.id.clone()).collect::<Vec<_>>());
    let mut pairings: Vec<(TeamId, TeamId)> = Vec::new();
    let mut round_of: Vec<usize> = Vec::new();
    for (round_index, round) in rounds.iter().enumerate() {
        for pair in round {
            pairings.push(pair.clone());
            round_of.push(round_index);
        }
    }
    let first_leg_rounds = rounds.len();
    if settings.double_round_robin {
        for (round_index, round) in rounds.iter().enumerate() {
            for (home, away) in round {
                pairings.push((away.clone(), home.clone()));
                round_of.push(first_leg_rounds + round_index);
            }
        }
    }

    let total_rounds = round_of.last().copied().unwrap_or(0) + 1;
    let ends_at = start_date + Duration::days(settings.days_between_rounds * total_rounds as i64);
    let season = Season::new(
        name,
        start_date,
        ends_at,
        teams.iter().map(|t| t.id.clone()).collect(),
    );

    let mut matches = Vec::with_capacity(pairings.len());
    let mut slot_in_round = vec![0i64; total_rounds];
    for ((home, away), round_index) in pairings.into_iter().zip(round_of) {
        let slot = slot_in_round[round_index];
        slot_in_round[round_index] += 1;
        let scheduled_at = start_date
            + Duration::days(settings.days_between_rounds * round_index as i64)
            + Duration::hours(settings.hours_between_matches * slot);
        matches.push(Match::new(season.id.clone(), home, away, scheduled_at));
    }

    log::info!(
        "generated season {} with {} matches across {} rounds",
        season.id,
        matches.len(),
        total_rounds
    );
    Ok((season, matches))
}

/// Circle-method round robin. With an odd team count one side sits out each
/// round (the bye slot is simply dropped).
fn round_robin_rounds(team_ids: &[TeamId]) -> Vec<Vec<(TeamId, TeamId)>> {
    let mut slots: Vec<Option<TeamId>> = team_ids.iter().cloned().map(Some).collect();
    if slots.len() % 2 != 0 {
        slots.push(None);
    }
    let n = slots.len();
    let rounds_count = n - 1;
    let mut rounds = Vec::with_capacity(rounds_count);

    for round_index in 0..rounds_count {
        let mut round = Vec::with_capacity(n / 2);
        for pair_index in 0..n / 2 {
            let a = &slots[pair_index];
            let b = &slots[n - 1 - pair_index];
            if let (Some(a), Some(b)) = (a, b) {
                // alternate home sides between rounds so nobody hosts everything
                if round_index % 2 == 0 {
                    round.push((a.clone(), b.clone()));
                } else {
                    round.push((b.clone(), a.clone()));
                }
            }
        }
        rounds.push(round);
        // rotate all but the first slot
        let last = slots.pop().unwrap_or(None);
        slots.insert(1, last);
    }
    rounds
}

/// Final table for one season, recomputed from its match outcomes.
///
/// Standings are season-scoped; the cumulative `TeamRecord` on `Team` spans
/// seasons and is maintained incrementally by settlement instead.
pub fn build_standings(store: &dyn Store, season: &Season) -> Result<Vec<StandingRow>> {
    let matches = store.matches_for_season(&season.id)?;
    let mut rows: Vec<StandingRow> = Vec::with_capacity(season.team_ids.len());

    for team_id in &season.team_ids {
        let team = store
            .team(team_id)?
            .ok_or_else(|| CoreError::NotFound(format!("team {team_id}")))?;
        let mut row = StandingRow {
            team_id: team_id.clone(),
            team_name: team.name,
            matches_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            points_for: 0,
            points_against: 0,
            table_points: 0,
        };
        for m in matches.iter().filter(|m| m.is_finished()) {
            let Some(outcome) = &m.outcome else { continue };
            let (own, opponent) = if &m.home_team_id == team_id {
                (outcome.home_score, outcome.away_score)
            } else if &m.away_team_id == team_id {
                (outcome.away_score, outcome.home_score)
            } else {
                continue;
            };
            row.matches_played += 1;
            row.points_for += own as u64;
            row.points_against += opponent as u64;
            match own.cmp(&opponent) {
                std::cmp::Ordering::Greater => row.wins += 1,
                std::cmp::Ordering::Less => row.losses += 1,
                std::cmp::Ordering::Equal => row.draws += 1,
            }
        }
        row.table_points = row.wins * 3 + row.draws;
        rows.push(row);
    }

    rows.sort_by(|a, b| {
        b.table_points.cmp(&a.table_points).then_with(|| {
            let diff_a = a.points_for as i64 - a.points_against as i64;
            let diff_b = b.points_for as i64 - b.points_against as i64;
            diff_b.cmp(&diff_a).then_with(|| a.team_name.cmp(&b.team_name))
        })
    });
    Ok(rows)
}

/// True iff every match of the season is finished. The first caller to
/// observe completion wins the `Active -> Finished` transition and archives
/// the standings exactly once; later calls are no-ops that still return true.
pub fn check_season_completion(
    store: &dyn Store,
    season_id: &SeasonId,
    now: DateTime<Utc>,
) -> Result<bool> {
    let season = store
        .season(season_id)?
        .ok_or_else(|| CoreError::NotFound(format!("season {season_id}")))?;

    if season.status == SeasonStatus::Finished {
        return Ok(true);
    }

    let matches = store.matches_for_season(season_id)?;
    if matches.is_empty() || !matches.iter().all(Match::is_finished) {
        return Ok(false);
    }

    // CAS guard: only the winner of this transition archives
    if !store.transition_season_status(season_id, season.status, SeasonStatus::Finished)? {
        return Ok(true);
    }

    let standings = build_standings(store, &season)?;
    let champion_team_id = standings
        .first()
        .map(|row| row.team_id.clone())
        .ok_or_else(|| CoreError::Storage(format!("season {season_id} finished with no standings")))?;
    store.grant_title(&champion_team_id)?;
    store.insert_archive(&SeasonArchive {
        season_id: season_id.clone(),
        champion_team_id: champion_team_id.clone(),
        standings,
        archived_at: now,
    })?;

    log::info!("season {season_id} finished, archived with champion {champion_team_id}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchOutcome, MatchStatus};
    use crate::store::MemoryStore;

    fn teams(n: usize) -> Vec<Team> {
        (0..n).map(|i| Team::new(format!("Team {i}"), 70, 70, 70)).collect()
    }

    #[test]
    fn test_insufficient_teams_is_fatal() {
        let err =
            generate_season("S1", &teams(1), Utc::now(), &ScheduleSettings::default()).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientTeams { minimum: 2, found: 1 }));
    }

    #[test]
    fn test_double_round_robin_fixture_count() {
        for n in [2usize, 3, 4, 5, 6] {
            let (_, matches) =
                generate_season("S", &teams(n), Utc::now(), &ScheduleSettings::default()).unwrap();
            // each ordered pair meets exactly once
            assert_eq!(matches.len(), n * (n - 1), "team count {n}");
        }
    }

    #[test]
    fn test_every_pairing_unique_and_dated_within_window() {
        let start = Utc::now();
        let (season, matches) =
            generate_season("S", &teams(4), start, &ScheduleSettings::default()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for m in &matches {
            assert!(seen.insert((m.home_team_id.clone(), m.away_team_id.clone())));
            assert_ne!(m.home_team_id, m.away_team_id);
            assert!(m.scheduled_at >= start);
            assert!(m.scheduled_at <= season.ends_at);
            assert_eq!(m.status, MatchStatus::Scheduled);
        }
    }

    #[test]
    fn test_single_round_robin() {
        let settings = ScheduleSettings { double_round_robin: false, ..Default::default() };
        let (_, matches) = generate_season("S", &teams(4), Utc::now(), &settings).unwrap();
        assert_eq!(matches.len(), 6);
    }

    fn finish(store: &MemoryStore, m: &Match, home: u32, away: u32) {
        assert!(store
            .transition_match_status(&m.id, MatchStatus::Scheduled, MatchStatus::Live)
            .unwrap());
        assert!(store
            .transition_match_status(&m.id, MatchStatus::Live, MatchStatus::Finished)
            .unwrap());
        store
            .record_outcome(
                &m.id,
                &MatchOutcome {
                    home_score: home,
                    away_score: away,
                    duration_minutes: 60,
                    snitch_caught: false,
                    snitch_caught_by: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_completion_archives_exactly_once() {
        let store = MemoryStore::new();
        let league = teams(2);
        for t in &league {
            store.insert_team(t).unwrap();
        }
        let (season, matches) =
            generate_season("S", &league, Utc::now(), &ScheduleSettings::default()).unwrap();
        store.insert_season(&season).unwrap();
        for m in &matches {
            store.insert_match(m).unwrap();
        }

        let now = Utc::now();
        assert!(!check_season_completion(&store, &season.id, now).unwrap());

        // first team wins both legs
        finish(&store, &matches[0], 200, 50);
        assert!(!check_season_completion(&store, &season.id, now).unwrap());
        finish(&store, &matches[1], 40, 180);

        assert!(check_season_completion(&store, &season.id, now).unwrap());
        let archive = store.archive_for_season(&season.id).unwrap().unwrap();
        assert_eq!(archive.standings.len(), 2);
        let champion_id = archive.champion_team_id.clone();
        assert_eq!(store.team(&champion_id).unwrap().unwrap().record.titles, 1);

        // idempotent: a second check neither re-archives nor re-grants
        assert!(check_season_completion(&store, &season.id, now).unwrap());
        assert_eq!(store.team(&champion_id).unwrap().unwrap().record.titles, 1);
        assert_eq!(
            store.archive_for_season(&season.id).unwrap().unwrap().archived_at,
            archive.archived_at
        );
    }

    #[test]
    fn test_standings_order_by_points_then_difference() {
        let store = MemoryStore::new();
        let league = teams(3);
        for t in &league {
            store.insert_team(t).unwrap();
        }
        let settings = ScheduleSettings { double_round_robin: false, ..Default::default() };
        let (season, matches) = generate_season("S", &league, Utc::now(), &settings).unwrap();
        store.insert_season(&season).unwrap();
        for m in &matches {
            store.insert_match(m).unwrap();
        }
        for m in &matches {
            finish(&store, m, 100, 100);
        }

        let standings = build_standings(&store, &season).unwrap();
        assert_eq!(standings.len(), 3);
        // all drawn: equal points, tie broken by name
        assert!(standings.windows(2).all(|w| w[0].table_points == w[1].table_points));
        assert!(standings.windows(2).all(|w| w[0].team_name <= w[1].team_name));
    }
}
