//! Shared test doubles for the integration suite.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use focusloop_core::attention::ScoreBand;
use focusloop_core::error::StorageError;
use focusloop_core::notify::Notifier;
use focusloop_core::session::{PersistedSnapshot, Phase};
use focusloop_core::store::{MemorySnapshotStore, SnapshotStore};
use focusloop_core::telemetry::{CompletedSession, FocusMetric, TelemetrySink};

/// Snapshot store that can outlive a machine, for restart scenarios.
#[derive(Clone, Default)]
pub struct SharedStore(pub Arc<MemorySnapshotStore>);

impl SnapshotStore for SharedStore {
    fn load_snapshot(&self) -> Result<Option<PersistedSnapshot>, StorageError> {
        self.0.load_snapshot()
    }

    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), StorageError> {
        self.0.save_snapshot(snapshot)
    }

    fn clear_snapshot(&self) -> Result<(), StorageError> {
        self.0.clear_snapshot()
    }
}

/// Notifier that appends readable markers to a shared log.
#[derive(Clone, Default)]
pub struct RecordingNotifier(pub Arc<Mutex<Vec<String>>>);

impl RecordingNotifier {
    pub fn log(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn phase_started(&self, phase: Phase) -> Result<(), Box<dyn std::error::Error>> {
        self.0.lock().unwrap().push(format!("started:{}", phase.label()));
        Ok(())
    }

    fn phase_completed(&self, phase: Phase) -> Result<(), Box<dyn std::error::Error>> {
        self.0
            .lock()
            .unwrap()
            .push(format!("completed:{}", phase.label()));
        Ok(())
    }

    fn score_band_changed(
        &self,
        band: ScoreBand,
        score: u8,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.0
            .lock()
            .unwrap()
            .push(format!("band:{band:?}:{score}"));
        Ok(())
    }
}

/// Telemetry sink that records everything it receives.
#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    pub sessions: Arc<Mutex<Vec<CompletedSession>>>,
    pub metrics: Arc<Mutex<Vec<FocusMetric>>>,
}

impl TelemetrySink for RecordingTelemetry {
    fn record_focus_metric(&self, metric: &FocusMetric) -> Result<(), Box<dyn std::error::Error>> {
        self.metrics.lock().unwrap().push(metric.clone());
        Ok(())
    }

    fn record_completed_session(
        &self,
        session: &CompletedSession,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }
}

/// Telemetry sink that always fails. Failures must be swallowed.
#[derive(Clone, Copy, Default)]
pub struct FailingTelemetry;

impl TelemetrySink for FailingTelemetry {
    fn record_focus_metric(&self, _: &FocusMetric) -> Result<(), Box<dyn std::error::Error>> {
        Err("sink unavailable".into())
    }

    fn record_completed_session(
        &self,
        _: &CompletedSession,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Err("sink unavailable".into())
    }
}
