pub mod json_api;

pub use json_api::{
    advance_time_json, advance_to_next_match_json, current_date_json, finish_match_json,
    place_bet_json, place_prediction_json, standings_json, start_live_match_json,
    AdvanceTimeRequest, FinishMatchRequest, PlaceBetRequest, PlacePredictionRequest,
    StartLiveMatchRequest, API_SCHEMA_VERSION,
};
