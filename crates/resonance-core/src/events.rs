use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerState;

/// Every state change in a session produces an Event.
/// The UI renders from them; the controller records sessions from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Full countdown snapshot after a start, tick, pause, resume, stop or
    /// drift correction.
    TimerUpdate {
        state: TimerState,
        at: DateTime<Utc>,
    },
    /// Breathing prompt, `offset_secs` into the session.
    BreathingCue {
        offset_secs: u64,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero. Sole trigger for recording a finished session.
    SessionCompleted {
        total_duration_secs: u64,
        protocol_id: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// A finished or stopped session was persisted.
    SessionRecorded {
        record_id: String,
        completed: bool,
        at: DateTime<Utc>,
    },
    /// The tone could not be played; the session continues silently.
    AudioUnavailable {
        reason: String,
        at: DateTime<Utc>,
    },
    /// Persisting the session outcome failed.
    StorageFailed {
        message: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Timer snapshot carried by a `TimerUpdate`.
    pub fn timer_state(&self) -> Option<&TimerState> {
        match self {
            Event::TimerUpdate { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Event::SessionCompleted { .. })
    }
}
