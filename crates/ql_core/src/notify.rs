//! Change notification fan-out.
//!
//! The league manager publishes a coarse event after each state change so
//! front ends can refresh the affected views. Delivery is best effort: a
//! subscriber whose receiver was dropped is pruned on the next publish,
//! and publishing never blocks on a slow consumer.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MatchId, SeasonId};

/// What changed, at view granularity. Carries enough payload for a listener
/// to refresh the affected view without polling full state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeEvent {
    ClockAdvanced { current_date: DateTime<Utc> },
    MatchStarted { match_id: MatchId },
    MatchFinished { match_id: MatchId },
    ScheduleChanged { season_id: SeasonId },
    SeasonArchived { season_id: SeasonId },
    BalancesChanged,
}

#[derive(Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<Sender<ChangeEvent>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = channel();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    pub fn publish(&self, event: ChangeEvent) {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
