use std::sync::Arc;

use focusloop_core::attention::ScoreBand;
use focusloop_core::clock::SystemClock;
use focusloop_core::notify::{Notifier, NoopNotifier};
use focusloop_core::session::{Phase, SessionMachine};
use focusloop_core::storage::{Config, Database};

/// Notifier that prints transitions to the terminal.
pub struct TermNotifier;

impl Notifier for TermNotifier {
    fn phase_started(&self, phase: Phase) -> Result<(), Box<dyn std::error::Error>> {
        println!(">> {} started", phase.label());
        Ok(())
    }

    fn phase_completed(&self, phase: Phase) -> Result<(), Box<dyn std::error::Error>> {
        println!("== {} complete", phase.label());
        Ok(())
    }

    fn score_band_changed(
        &self,
        band: ScoreBand,
        score: u8,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("attention {band:?}: {score}");
        Ok(())
    }
}

/// Build the session machine against the on-disk database, honoring the
/// notifications config. Uses separate connections for the snapshot store
/// and the telemetry sink.
pub fn open_machine() -> Result<SessionMachine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = Database::open()?;
    let telemetry = Database::open()?;
    let notifier: Box<dyn Notifier> = if config.notifications.enabled {
        Box::new(TermNotifier)
    } else {
        Box::new(NoopNotifier)
    };
    Ok(SessionMachine::new(
        Arc::new(SystemClock),
        Box::new(store),
        notifier,
        Box::new(telemetry),
        config.session.to_settings(),
    ))
}

/// Build the machine without terminal output, for JSON-only commands.
pub fn open_machine_quiet() -> Result<SessionMachine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = Database::open()?;
    let telemetry = Database::open()?;
    Ok(SessionMachine::new(
        Arc::new(SystemClock),
        Box::new(store),
        Box::new(NoopNotifier),
        Box::new(telemetry),
        config.session.to_settings(),
    ))
}
