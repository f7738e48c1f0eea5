use serde::{Deserialize, Serialize};

use super::settings::SessionSettings;

/// The two countdown modes of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Focus,
    Break,
}

impl Phase {
    /// Label used for notifications and session records.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::Break => "break",
        }
    }
}

/// Live session state, mutated every tick and by user actions.
///
/// Invariants: `time_left_secs` stays within `[0, phase duration]`;
/// `completed_count` increments only on a Focus -> Break completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub running: bool,
    pub time_left_secs: u64,
    pub completed_count: u32,
}

impl SessionState {
    /// Fresh state for the given settings: a full Focus phase, not running.
    pub fn initial(settings: &SessionSettings) -> Self {
        Self {
            phase: Phase::Focus,
            running: false,
            time_left_secs: settings.focus_minutes as u64 * 60,
            completed_count: 0,
        }
    }
}

/// Durable form of the session, written on every mutation while running.
///
/// `saved_at_epoch_ms` is present only while the countdown is running --
/// its absence signals "not counting" to the recovery path. The markers
/// record whether the last stop was user-initiated and whether the host
/// went hidden mid-countdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub state: SessionState,
    pub settings: SessionSettings,
    #[serde(default)]
    pub saved_at_epoch_ms: Option<u64>,
    #[serde(default)]
    pub manual_pause: bool,
    #[serde(default)]
    pub hidden_at_epoch_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_full_focus() {
        let state = SessionState::initial(&SessionSettings::default());
        assert_eq!(state.phase, Phase::Focus);
        assert!(!state.running);
        assert_eq!(state.time_left_secs, 25 * 60);
        assert_eq!(state.completed_count, 0);
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snap = PersistedSnapshot {
            state: SessionState::initial(&SessionSettings::default()),
            settings: SessionSettings::default(),
            saved_at_epoch_ms: Some(1_700_000_000_000),
            manual_pause: true,
            hidden_at_epoch_ms: None,
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: PersistedSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn phase_labels() {
        assert_eq!(Phase::Focus.label(), "focus");
        assert_eq!(Phase::Break.label(), "break");
    }
}
