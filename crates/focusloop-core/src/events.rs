use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Phase, SessionSettings, SessionState};

/// Every session-machine operation that changes state produces an Event.
/// The CLI prints them; integrations subscribe to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    SessionPaused {
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    SessionReset {
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: SessionSettings,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero (or was skipped into completion).
    PhaseCompleted {
        phase: Phase,
        next_phase: Phase,
        completed_count: u32,
        /// Attached for Focus completions; absent for Break.
        attention_score: Option<u8>,
        at: DateTime<Utc>,
    },
    /// The machine restarted itself after a natural completion.
    AutoResumed {
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: SessionState,
        settings: SessionSettings,
        manual_pause: bool,
        at: DateTime<Utc>,
    },
}
