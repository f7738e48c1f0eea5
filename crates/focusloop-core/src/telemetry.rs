//! Telemetry sink collaborator.
//!
//! The sink records focus metrics and completed sessions for the analytics
//! surface. Sink failures must never block or corrupt the core -- callers
//! log the error and move on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::Phase;

/// Heuristic posture bucket derived from the attention score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Good,
    Fair,
    Poor,
}

impl Posture {
    pub fn of(score: u8) -> Self {
        if score > 80 {
            Posture::Good
        } else if score > 50 {
            Posture::Fair
        } else {
            Posture::Poor
        }
    }
}

/// One scoring-tick observation. Created once per tick while tracking is
/// active; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusMetric {
    pub id: Uuid,
    pub session_id: Option<String>,
    pub timestamp_ms: u64,
    /// 0..=100.
    pub attention_score: u8,
    pub eye_contact_approx: bool,
    pub posture_approx: Posture,
    pub distraction_count: u32,
}

/// Record of a finished countdown phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub phase: Phase,
    pub duration_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Live attention score at completion time, 0 when not tracked.
    pub attention_score: u8,
}

/// History/analytics collaborator. Both hooks default to no-ops so
/// implementations only override what they consume.
pub trait TelemetrySink: Send {
    fn record_focus_metric(&self, _metric: &FocusMetric) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn record_completed_session(
        &self,
        _session: &CompletedSession,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {}
