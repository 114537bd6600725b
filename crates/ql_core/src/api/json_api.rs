//! JSON boundary for HTTP/automation callers.
//!
//! Every entry point takes a request JSON string and returns a response JSON
//! string, never an Err and never a panic. Failures serialize as
//! `{"ok": false, "kind": "...", "reason": "..."}` so callers can tell
//! "already handled" conflicts from genuine faults without string matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::TimeUnit;
use crate::error::{CoreError, ErrorKind};
use crate::league::LeagueManager;
use crate::models::{BetKind, StandingRow};
use crate::settlement::SettlementSummary;

pub const API_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Deserialize)]
pub struct AdvanceTimeRequest {
    pub schema_version: u8,
    pub amount: i64,
    /// "minutes" | "hours" | "days"
    pub unit: String,
}

#[derive(Debug, Deserialize)]
pub struct StartLiveMatchRequest {
    pub schema_version: u8,
    pub match_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FinishMatchRequest {
    pub schema_version: u8,
    pub match_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub schema_version: u8,
    pub user_id: String,
    pub match_id: String,
    pub kind: BetKind,
    pub prediction: String,
    pub stake: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlacePredictionRequest {
    pub schema_version: u8,
    pub user_id: String,
    pub match_id: String,
    /// "home" | "draw" | "away"
    pub outcome: String,
    pub confidence: u8,
}

#[derive(Debug, Serialize)]
struct Failure {
    ok: bool,
    kind: &'static str,
    reason: String,
}

fn failure(kind: &'static str, reason: impl std::fmt::Display) -> String {
    let body = Failure { ok: false, kind, reason: reason.to_string() };
    // a struct of two strings and a bool cannot fail to serialize
    serde_json::to_string(&body).unwrap_or_else(|_| {
        r#"{"ok":false,"kind":"storage","reason":"response serialization failed"}"#.into()
    })
}

fn failure_from(err: &CoreError) -> String {
    let kind = match err.kind() {
        ErrorKind::Validation => "validation",
        ErrorKind::Conflict => "conflict",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Storage => "storage",
    };
    failure(kind, err)
}

fn success<T: Serialize>(body: &T) -> String {
    match serde_json::to_string(body) {
        Ok(json) => json,
        Err(e) => failure("storage", format!("response serialization failed: {e}")),
    }
}

fn parse_request<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, String> {
    serde_json::from_str(raw).map_err(|e| failure("validation", format!("invalid request: {e}")))
}

fn check_schema(version: u8) -> Result<(), String> {
    if version == API_SCHEMA_VERSION {
        Ok(())
    } else {
        Err(failure("validation", format!("unsupported schema version: {version}")))
    }
}

#[derive(Debug, Serialize)]
struct ClockResponse {
    ok: bool,
    current_date: DateTime<Utc>,
    matches_played: usize,
    summaries: Vec<SettlementSummary>,
}

fn clock_response(manager: &LeagueManager, summaries: Vec<SettlementSummary>) -> String {
    match manager.clock().current_date() {
        Ok(current_date) => success(&ClockResponse {
            ok: true,
            current_date,
            matches_played: summaries.len(),
            summaries,
        }),
        Err(e) => failure_from(&e),
    }
}

pub fn current_date_json(manager: &LeagueManager) -> String {
    match manager.clock().current_date() {
        Ok(current_date) => {
            #[derive(Serialize)]
            struct Body {
                ok: bool,
                current_date: DateTime<Utc>,
            }
            success(&Body { ok: true, current_date })
        }
        Err(e) => failure_from(&e),
    }
}

pub fn advance_time_json(manager: &LeagueManager, request_json: &str) -> String {
    let request: AdvanceTimeRequest = match parse_request(request_json) {
        Ok(r) => r,
        Err(body) => return body,
    };
    if let Err(body) = check_schema(request.schema_version) {
        return body;
    }
    let Some(unit) = TimeUnit::from_wire(&request.unit) else {
        return failure("validation", format!("unknown time unit: {}", request.unit));
    };
    match manager.advance_time(request.amount, unit) {
        Ok(summaries) => clock_response(manager, summaries),
        Err(e) => failure_from(&e),
    }
}

pub fn advance_to_next_match_json(manager: &LeagueManager) -> String {
    match manager.advance_to_next_match() {
        Ok(summaries) => clock_response(manager, summaries),
        Err(e) => failure_from(&e),
    }
}

pub fn start_live_match_json(manager: &LeagueManager, request_json: &str) -> String {
    let request: StartLiveMatchRequest = match parse_request(request_json) {
        Ok(r) => r,
        Err(body) => return body,
    };
    if let Err(body) = check_schema(request.schema_version) {
        return body;
    }
    match manager.start_live_match(&request.match_id) {
        Ok(()) => {
            #[derive(Serialize)]
            struct Body {
                ok: bool,
                match_id: String,
            }
            success(&Body { ok: true, match_id: request.match_id })
        }
        Err(e) => failure_from(&e),
    }
}

pub fn finish_match_json(manager: &LeagueManager, request_json: &str) -> String {
    let request: FinishMatchRequest = match parse_request(request_json) {
        Ok(r) => r,
        Err(body) => return body,
    };
    if let Err(body) = check_schema(request.schema_version) {
        return body;
    }
    match manager.finish_match(&request.match_id) {
        Ok(summary) => {
            #[derive(Serialize)]
            struct Body {
                ok: bool,
                summary: SettlementSummary,
            }
            success(&Body { ok: true, summary })
        }
        Err(e) => failure_from(&e),
    }
}

pub fn place_bet_json(manager: &LeagueManager, request_json: &str) -> String {
    let request: PlaceBetRequest = match parse_request(request_json) {
        Ok(r) => r,
        Err(body) => return body,
    };
    if let Err(body) = check_schema(request.schema_version) {
        return body;
    }
    match manager.place_bet(
        &request.user_id,
        &request.match_id,
        request.kind,
        &request.prediction,
        request.stake,
    ) {
        Ok(bet) => {
            #[derive(Serialize)]
            struct Body {
                ok: bool,
                bet_id: String,
                potential_payout: i64,
            }
            success(&Body { ok: true, bet_id: bet.id, potential_payout: bet.potential_payout })
        }
        Err(e) => failure_from(&e),
    }
}

pub fn place_prediction_json(manager: &LeagueManager, request_json: &str) -> String {
    let request: PlacePredictionRequest = match parse_request(request_json) {
        Ok(r) => r,
        Err(body) => return body,
    };
    if let Err(body) = check_schema(request.schema_version) {
        return body;
    }
    match manager.place_prediction(
        &request.user_id,
        &request.match_id,
        &request.outcome,
        request.confidence,
    ) {
        Ok(prediction) => {
            #[derive(Serialize)]
            struct Body {
                ok: bool,
                prediction_id: String,
            }
            success(&Body { ok: true, prediction_id: prediction.id })
        }
        Err(e) => failure_from(&e),
    }
}

pub fn standings_json(manager: &LeagueManager) -> String {
    match manager.standings() {
        Ok(rows) => {
            #[derive(Serialize)]
            struct Body {
                ok: bool,
                standings: Vec<StandingRow>,
            }
            success(&Body { ok: true, standings: rows })
        }
        Err(e) => failure_from(&e),
    }
}
