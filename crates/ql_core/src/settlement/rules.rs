//! Bet prediction grammar and evaluation rules.
//!
//! Wire payloads (`"home"`, `"190-50"`, `"winner:home,score:180-70,..."`) are
//! parsed once into a typed [`BetSelection`] and evaluated against a match
//! outcome. Evaluation never panics: a payload that does not parse is a lost
//! bet with a reason, because legacy rows with sentinel values exist.

use thiserror::Error;

use crate::models::{BetKind, MatchOutcome, PredictedOutcome};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("empty prediction payload")]
    Empty,

    #[error("invalid {kind} payload {payload:?}: {reason}")]
    Invalid { kind: BetKind, payload: String, reason: String },

    #[error("combined bets cannot nest combined legs")]
    NestedCombined,

    #[error("unknown leg type {0:?}")]
    UnknownLegKind(String),
}

/// Side of the pitch; snitch bets cannot pick a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" => Some(Side::Home),
            "away" => Some(Side::Away),
            _ => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

/// The typed form of a bet's prediction payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BetSelection {
    Winner(PredictedOutcome),
    ExactScore { home: u32, away: u32 },
    Snitch(Side),
    Duration { min: u32, max: u32 },
    Combined(Vec<BetSelection>),
}

impl BetSelection {
    pub fn kind(&self) -> BetKind {
        match self {
            BetSelection::Winner(_) => BetKind::Winner,
            BetSelection::ExactScore { .. } => BetKind::Score,
            BetSelection::Snitch(_) => BetKind::Snitch,
            BetSelection::Duration { .. } => BetKind::Time,
            BetSelection::Combined(_) => BetKind::Combined,
        }
    }

    /// Decimal odds; combined legs multiply.
    pub fn odds(&self) -> f64 {
        match self {
            BetSelection::Combined(legs) => legs.iter().map(BetSelection::odds).product(),
            other => other.kind().odds(),
        }
    }
}

/// Payout for a winning bet, rounded to whole knuts.
pub fn potential_payout(stake: i64, selection: &BetSelection) -> i64 {
    (stake as f64 * selection.odds()).round() as i64
}

fn invalid(kind: BetKind, payload: &str, reason: impl Into<String>) -> SelectionError {
    SelectionError::Invalid { kind, payload: payload.to_string(), reason: reason.into() }
}

/// Parse a range payload like `"30-60"` or a score payload like `"190-50"`.
fn parse_pair(kind: BetKind, payload: &str) -> Result<(u32, u32), SelectionError> {
    let (left, right) = payload
        .split_once('-')
        .ok_or_else(|| invalid(kind, payload, "expected \"<a>-<b>\""))?;
    let a = left
        .trim()
        .parse::<u32>()
        .map_err(|e| invalid(kind, payload, format!("left side: {e}")))?;
    let b = right
        .trim()
        .parse::<u32>()
        .map_err(|e| invalid(kind, payload, format!("right side: {e}")))?;
    Ok((a, b))
}

/// Parse a payload for the given bet kind.
pub fn parse_selection(kind: BetKind, payload: &str) -> Result<BetSelection, SelectionError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(SelectionError::Empty);
    }
    match kind {
        BetKind::Winner => PredictedOutcome::from_wire(payload)
            .map(BetSelection::Winner)
            .ok_or_else(|| invalid(kind, payload, "expected home, draw or away")),
        BetKind::Score => {
            let (home, away) = parse_pair(kind, payload)?;
            Ok(BetSelection::ExactScore { home, away })
        }
        BetKind::Snitch => Side::from_wire(payload)
            .map(BetSelection::Snitch)
            .ok_or_else(|| invalid(kind, payload, "expected home or away")),
        BetKind::Time => {
            let (min, max) = parse_pair(kind, payload)?;
            if min > max {
                return Err(invalid(kind, payload, "range minimum exceeds maximum"));
            }
            Ok(BetSelection::Duration { min, max })
        }
        BetKind::Combined => parse_combined(payload),
    }
}

fn parse_combined(payload: &str) -> Result<BetSelection, SelectionError> {
    let mut legs = Vec::new();
    for raw_leg in payload.split(',') {
        let raw_leg = raw_leg.trim();
        if raw_leg.is_empty() {
            continue;
        }
        let (leg_kind, leg_payload) = raw_leg
            .split_once(':')
            .ok_or_else(|| invalid(BetKind::Combined, raw_leg, "expected \"type:value\""))?;
        let leg_kind = match leg_kind.trim().to_ascii_lowercase().as_str() {
            "winner" => BetKind::Winner,
            "score" => BetKind::Score,
            "snitch" => BetKind::Snitch,
            "time" => BetKind::Time,
            "combined" => return Err(SelectionError::NestedCombined),
            other => return Err(SelectionError::UnknownLegKind(other.to_string())),
        };
        legs.push(parse_selection(leg_kind, leg_payload)?);
    }
    if legs.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(BetSelection::Combined(legs))
}

/// What evaluation needs to know about a finished match: the result fields
/// plus which team id is which side.
#[derive(Debug, Clone, Copy)]
pub struct MatchFacts<'a> {
    pub outcome: &'a MatchOutcome,
    pub home_team_id: &'a str,
    pub away_team_id: &'a str,
}

impl<'a> MatchFacts<'a> {
    fn snitch_side(&self) -> Option<Side> {
        let catcher = self.outcome.snitch_caught_by.as_deref()?;
        if catcher == self.home_team_id {
            Some(Side::Home)
        } else if catcher == self.away_team_id {
            Some(Side::Away)
        } else {
            None
        }
    }
}

/// Outcome of evaluating one selection against a finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub won: bool,
    pub reason: String,
}

impl Evaluation {
    fn won(reason: impl Into<String>) -> Self {
        Self { won: true, reason: reason.into() }
    }

    fn lost(reason: impl Into<String>) -> Self {
        Self { won: false, reason: reason.into() }
    }
}

/// Evaluate a selection. Total function: always a verdict, never an error.
pub fn evaluate(selection: &BetSelection, facts: &MatchFacts<'_>) -> Evaluation {
    let outcome = facts.outcome;
    match selection {
        BetSelection::Winner(predicted) => {
            let actual = outcome.result_outcome();
            if *predicted == actual {
                Evaluation::won(format!("winner {} as predicted", actual.code()))
            } else {
                Evaluation::lost(format!(
                    "predicted winner {}, actual {}",
                    predicted.code(),
                    actual.code()
                ))
            }
        }
        BetSelection::ExactScore { home, away } => {
            if *home == outcome.home_score && *away == outcome.away_score {
                Evaluation::won(format!("exact score {}", outcome.score_line()))
            } else {
                Evaluation::lost(format!(
                    "predicted score {home}-{away}, actual {}",
                    outcome.score_line()
                ))
            }
        }
        BetSelection::Snitch(side) => match facts.snitch_side() {
            None => Evaluation::lost("snitch was not caught".to_string()),
            Some(actual) if actual == *side => {
                Evaluation::won(format!("snitch caught by {}", side.code()))
            }
            Some(actual) => Evaluation::lost(format!(
                "predicted snitch {}, caught by {}",
                side.code(),
                actual.code()
            )),
        },
        BetSelection::Duration { min, max } => {
            let duration = outcome.duration_minutes;
            if (*min..=*max).contains(&duration) {
                Evaluation::won(format!("duration {duration}min within {min}-{max}"))
            } else {
                Evaluation::lost(format!("duration {duration}min outside {min}-{max}"))
            }
        }
        BetSelection::Combined(legs) => {
            let mut failed: Vec<String> = Vec::new();
            for leg in legs {
                let leg_eval = evaluate(leg, facts);
                if !leg_eval.won {
                    failed.push(leg_eval.reason);
                }
            }
            if failed.is_empty() {
                Evaluation::won(format!("all {} legs won", legs.len()))
            } else {
                Evaluation::lost(format!("failed legs: {}", failed.join("; ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(home: u32, away: u32, duration: u32, snitch: Option<&str>) -> MatchOutcome {
        MatchOutcome {
            home_score: home,
            away_score: away,
            duration_minutes: duration,
            snitch_caught: snitch.is_some(),
            snitch_caught_by: snitch.map(|s| s.to_string()),
        }
    }

    fn facts<'a>(outcome: &'a MatchOutcome) -> MatchFacts<'a> {
        MatchFacts { outcome, home_team_id: "team-h", away_team_id: "team-a" }
    }

    #[test]
    fn test_winner_parse_and_evaluate() {
        let selection = parse_selection(BetKind::Winner, "home").unwrap();
        let result = outcome(190, 40, 55, Some("team-h"));
        assert!(evaluate(&selection, &facts(&result)).won);

        let drawn = outcome(70, 70, 120, None);
        let eval = evaluate(&selection, &facts(&drawn));
        assert!(!eval.won);
        assert!(eval.reason.contains("draw"));

        let draw_pick = parse_selection(BetKind::Winner, "draw").unwrap();
        assert!(evaluate(&draw_pick, &facts(&drawn)).won);
    }

    #[test]
    fn test_score_is_literal_match() {
        let selection = parse_selection(BetKind::Score, "190-50").unwrap();
        assert!(evaluate(&selection, &facts(&outcome(190, 50, 60, None))).won);
        assert!(!evaluate(&selection, &facts(&outcome(190, 51, 60, None))).won);
    }

    #[test]
    fn test_score_garbage_payload_rejected_at_parse() {
        for payload in ["", "190", "190:50", "a-b", "unknown"] {
            assert!(parse_selection(BetKind::Score, payload).is_err(), "{payload:?}");
        }
    }

    #[test]
    fn test_snitch_rules() {
        let selection = parse_selection(BetKind::Snitch, "home").unwrap();
        assert!(evaluate(&selection, &facts(&outcome(200, 30, 47, Some("team-h")))).won);
        assert!(!evaluate(&selection, &facts(&outcome(30, 200, 47, Some("team-a")))).won);

        let uncaught = evaluate(&selection, &facts(&outcome(100, 90, 120, None)));
        assert!(!uncaught.won);
        assert_eq!(uncaught.reason, "snitch was not caught");

        assert!(parse_selection(BetKind::Snitch, "draw").is_err());
    }

    #[test]
    fn test_time_range_inclusive() {
        let selection = parse_selection(BetKind::Time, "30-60").unwrap();
        for duration in [30, 45, 60] {
            assert!(evaluate(&selection, &facts(&outcome(0, 0, duration, None))).won);
        }
        for duration in [29, 61] {
            assert!(!evaluate(&selection, &facts(&outcome(0, 0, duration, None))).won);
        }
        assert!(parse_selection(BetKind::Time, "60-30").is_err());
    }

    #[test]
    fn test_combined_and_semantics() {
        let selection =
            parse_selection(BetKind::Combined, "winner:home,score:180-70,snitch:home,time:30-60")
                .unwrap();
        let all_true = outcome(180, 70, 45, Some("team-h"));
        assert!(evaluate(&selection, &facts(&all_true)).won);

        // one false leg loses the whole bet and names the leg
        let late = outcome(180, 70, 65, Some("team-h"));
        let eval = evaluate(&selection, &facts(&late));
        assert!(!eval.won);
        assert!(eval.reason.contains("duration 65min outside 30-60"));
    }

    #[test]
    fn test_combined_parse_errors() {
        assert_eq!(parse_selection(BetKind::Combined, "").unwrap_err(), SelectionError::Empty);
        assert!(matches!(
            parse_selection(BetKind::Combined, "combined:winner:home"),
            Err(SelectionError::NestedCombined)
        ));
        assert!(matches!(
            parse_selection(BetKind::Combined, "quaffle:home"),
            Err(SelectionError::UnknownLegKind(_))
        ));
        assert!(parse_selection(BetKind::Combined, "winner home").is_err());
    }

    #[test]
    fn test_combined_odds_multiply() {
        let selection = parse_selection(BetKind::Combined, "winner:home,snitch:away").unwrap();
        let expected = BetKind::Winner.odds() * BetKind::Snitch.odds();
        assert!((selection.odds() - expected).abs() < 1e-9);
        assert_eq!(potential_payout(100, &selection), (100.0 * expected).round() as i64);
    }

    #[test]
    fn test_payout_rounding() {
        let selection = parse_selection(BetKind::Winner, "away").unwrap();
        assert_eq!(potential_payout(50, &selection), 90);
    }
}
