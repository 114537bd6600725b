use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{new_id, MatchId, TeamId};

/// Closed event vocabulary.
///
/// The original data set carried several spellings for the same event
/// (`QUAFFLE_GOAL` / `goal`, `SNITCH_CAUGHT` / `SNITCH_CATCH`). Those are
/// accepted only at ingestion via [`EventType::from_wire`]; everything past
/// the model boundary uses this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MatchStart,
    Goal,
    Save,
    SnitchCatch,
    MatchEnd,
}

static LEGACY_ALIASES: Lazy<HashMap<&'static str, EventType>> = Lazy::new(|| {
    HashMap::from([
        ("QUAFFLE_GOAL", EventType::Goal),
        ("GOAL", EventType::Goal),
        ("KEEPER_SAVE", EventType::Save),
        ("SAVE", EventType::Save),
        ("SNITCH_CAUGHT", EventType::SnitchCatch),
        ("SNITCH_CATCH", EventType::SnitchCatch),
        ("MATCH_START", EventType::MatchStart),
        ("MATCH_END", EventType::MatchEnd),
    ])
});

impl EventType {
    /// Canonical wire name (matches the serde representation).
    pub fn code(&self) -> &'static str {
        match self {
            EventType::MatchStart => "match_start",
            EventType::Goal => "goal",
            EventType::Save => "save",
            EventType::SnitchCatch => "snitch_catch",
            EventType::MatchEnd => "match_end",
        }
    }

    /// Parse a wire name, including the legacy spellings found in old rows.
    pub fn from_wire(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed {
            "match_start" => Some(EventType::MatchStart),
            "goal" => Some(EventType::Goal),
            "save" => Some(EventType::Save),
            "snitch_catch" => Some(EventType::SnitchCatch),
            "match_end" => Some(EventType::MatchEnd),
            _ => LEGACY_ALIASES.get(trimmed.to_ascii_uppercase().as_str()).copied(),
        }
    }
}

/// One entry of a match's append-only event log.
///
/// `minute` values are non-decreasing within a match; the log is immutable
/// once the match finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: String,
    pub match_id: MatchId,
    pub minute: u32,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Team the event belongs to; absent for whole-match markers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub description: String,
    /// Points this event contributed to the team's score (0 for non-scoring).
    pub points: u32,
}

impl MatchEvent {
    pub fn new(
        match_id: MatchId,
        minute: u32,
        event_type: EventType,
        team_id: Option<TeamId>,
        description: impl Into<String>,
        points: u32,
    ) -> Self {
        Self { id: new_id(), match_id, minute, event_type, team_id, description: description.into(), points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_wire_round_trip_all_variants() {
        for event_type in EventType::iter() {
            assert_eq!(EventType::from_wire(event_type.code()), Some(event_type));
        }
    }

    #[test]
    fn test_legacy_spellings_normalize() {
        assert_eq!(EventType::from_wire("SNITCH_CAUGHT"), Some(EventType::SnitchCatch));
        assert_eq!(EventType::from_wire("SNITCH_CATCH"), Some(EventType::SnitchCatch));
        assert_eq!(EventType::from_wire("QUAFFLE_GOAL"), Some(EventType::Goal));
        assert_eq!(EventType::from_wire(" goal "), Some(EventType::Goal));
        assert_eq!(EventType::from_wire("bludger_to_the_face"), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&EventType::SnitchCatch).unwrap();
        assert_eq!(json, "\"snitch_catch\"");
    }
}
