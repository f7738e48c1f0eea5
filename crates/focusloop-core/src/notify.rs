//! Notification collaborator.
//!
//! Notified on phase-start and phase-complete transitions and when the
//! attention score crosses a qualitative band boundary. Failures are logged
//! and swallowed by the caller.

use crate::attention::ScoreBand;
use crate::session::Phase;

pub trait Notifier: Send {
    fn phase_started(&self, _phase: Phase) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn phase_completed(&self, _phase: Phase) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn score_band_changed(
        &self,
        _band: ScoreBand,
        _score: u8,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Notifier that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}
