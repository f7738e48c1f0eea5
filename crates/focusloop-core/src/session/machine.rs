//! Session state machine.
//!
//! The machine is wall-clock based. It does not own a thread or a timer --
//! the caller invokes `tick()` periodically (about once a second) and the
//! machine reconciles against epoch milliseconds, so an arbitrarily large
//! gap between ticks (backgrounded tab, device sleep, process restart)
//! resolves to the same state as an uninterrupted countdown.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> FocusRunning <-> FocusPaused -> BreakRunning <-> BreakPaused -> ...
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut machine = SessionMachine::new(clock, store, notifier, telemetry, defaults);
//! machine.start();
//! // In a loop:
//! machine.tick(); // Returns Some(Event) on transitions
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::settings::{SessionSettings, SettingsUpdate};
use super::state::{PersistedSnapshot, Phase, SessionState};
use crate::clock::Clock;
use crate::events::Event;
use crate::notify::Notifier;
use crate::store::SnapshotStore;
use crate::telemetry::{CompletedSession, TelemetrySink};

/// Grace window between a natural completion and the automatic start of the
/// next phase. Any explicit user action inside the window cancels the resume.
pub const AUTO_RESUME_DELAY_MS: u64 = 3_000;

/// A scheduled auto-resume. The generation token ties it to the moment it
/// was scheduled: every user action bumps the machine's generation, so a
/// stale pending resume can never fire.
#[derive(Debug, Clone, Copy)]
struct PendingResume {
    due_at_ms: u64,
    generation: u64,
}

pub struct SessionMachine {
    state: SessionState,
    settings: SessionSettings,
    clock: Arc<dyn Clock>,
    store: Box<dyn SnapshotStore>,
    notifier: Box<dyn Notifier>,
    telemetry: Box<dyn TelemetrySink>,
    /// Last stop was user-initiated; suppresses auto-resume until `start()`.
    manual_pause: bool,
    hidden_at_ms: Option<u64>,
    /// Last wall-clock instant already accounted into `time_left_secs`.
    /// `Some` exactly while running.
    last_tick_ms: Option<u64>,
    /// First start of the current phase, for the completed-session record.
    phase_started_at_ms: Option<u64>,
    pending_resume: Option<PendingResume>,
    generation: u64,
    live_score: Option<u8>,
}

impl SessionMachine {
    /// Create the machine, recovering from a persisted snapshot if one is
    /// present and valid. A corrupt or unreadable snapshot falls back to
    /// `defaults` silently (logged, never fatal). If the recovered countdown
    /// already expired while suspended, the completion transition runs here,
    /// exactly once.
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Box<dyn SnapshotStore>,
        notifier: Box<dyn Notifier>,
        telemetry: Box<dyn TelemetrySink>,
        defaults: SessionSettings,
    ) -> Self {
        let defaults = defaults.sanitized(&SessionSettings::default());
        let mut machine = Self {
            state: SessionState::initial(&defaults),
            settings: defaults,
            clock,
            store,
            notifier,
            telemetry,
            manual_pause: false,
            hidden_at_ms: None,
            last_tick_ms: None,
            phase_started_at_ms: None,
            pending_resume: None,
            generation: 0,
            live_score: None,
        };
        machine.recover();
        machine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn manual_pause(&self) -> bool {
        self.manual_pause
    }

    pub fn has_pending_resume(&self) -> bool {
        self.pending_resume.is_some()
    }

    /// Build a full state snapshot event.
    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot {
            state: self.state.clone(),
            settings: self.settings,
            manual_pause: self.manual_pause,
            at: self.now_utc(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin (or resume) the countdown. No-op while already running.
    /// Clears the manual-pause marker.
    pub fn start(&mut self) -> Option<Event> {
        if self.state.running {
            return None;
        }
        self.cancel_pending();
        self.manual_pause = false;
        let now = self.clock.now_ms();
        let announce = self.phase_started_at_ms.is_none();
        if announce {
            self.phase_started_at_ms = Some(now);
        }
        self.state.running = true;
        self.last_tick_ms = Some(now);
        self.persist();
        if announce {
            if let Err(e) = self.notifier.phase_started(self.state.phase) {
                log::warn!("phase-start notification dropped: {e}");
            }
        }
        Some(Event::SessionStarted {
            phase: self.state.phase,
            time_left_secs: self.state.time_left_secs,
            at: self.now_utc(),
        })
    }

    /// User-invoked pause. Records the manual-pause marker so a later
    /// natural completion does not auto-resume, and cancels any pending
    /// auto-resume immediately.
    pub fn pause(&mut self) -> Option<Event> {
        self.cancel_pending();
        self.manual_pause = true;
        if !self.state.running {
            self.persist();
            return None;
        }
        let now = self.clock.now_ms();
        self.flush_elapsed(now);
        self.state.running = false;
        self.last_tick_ms = None;
        self.persist();
        Some(Event::SessionPaused {
            phase: self.state.phase,
            time_left_secs: self.state.time_left_secs,
            at: self.now_utc(),
        })
    }

    /// Stop the countdown and restore the current phase's full duration.
    pub fn reset(&mut self) -> Option<Event> {
        self.cancel_pending();
        self.state.running = false;
        self.last_tick_ms = None;
        self.phase_started_at_ms = None;
        self.state.time_left_secs = self.phase_duration_secs();
        self.persist();
        Some(Event::SessionReset {
            phase: self.state.phase,
            time_left_secs: self.state.time_left_secs,
            at: self.now_utc(),
        })
    }

    /// Force the same completion transition natural expiry performs,
    /// regardless of remaining time.
    pub fn skip(&mut self) -> Option<Event> {
        self.cancel_pending();
        Some(self.complete_phase())
    }

    /// Merge a settings change. Invalid fields keep their previous value;
    /// this never fails. A focus-duration change resizes a Focus countdown
    /// immediately. The machine always drops to a non-running state so a
    /// stale countdown is never kept against new settings.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Event {
        self.cancel_pending();
        if self.state.running {
            let now = self.clock.now_ms();
            self.flush_elapsed(now);
        }
        let old_focus = self.settings.focus_minutes;
        self.settings = self.settings.merged(&update);
        if self.state.phase == Phase::Focus && self.settings.focus_minutes != old_focus {
            self.state.time_left_secs = self.settings.focus_minutes as u64 * 60;
        }
        let max = self.phase_duration_secs();
        if self.state.time_left_secs > max {
            self.state.time_left_secs = max;
        }
        self.state.running = false;
        self.last_tick_ms = None;
        self.persist();
        Event::SettingsUpdated {
            settings: self.settings,
            at: self.now_utc(),
        }
    }

    /// Call periodically (~1 s). Fires a due auto-resume, then accounts
    /// elapsed wall-clock seconds and performs the completion transition
    /// when the countdown reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        if let Some(event) = self.poll_auto_resume(now) {
            return Some(event);
        }
        if !self.state.running {
            return None;
        }
        self.flush_elapsed(now);
        if self.state.time_left_secs == 0 {
            return Some(self.complete_phase());
        }
        self.persist();
        None
    }

    // ── Environment signals ──────────────────────────────────────────

    /// Host became hidden while counting. Records the hidden marker so a
    /// process death while backgrounded still recovers correctly.
    pub fn handle_hidden(&mut self) {
        if !self.state.running {
            return;
        }
        self.hidden_at_ms = Some(self.clock.now_ms());
        self.persist();
    }

    /// Host became visible again. Elapsed time is measured from the last
    /// accounted tick, so a tick that did fire while hidden is not counted
    /// twice. Forces completion if the countdown expired in the background.
    pub fn handle_visible(&mut self) -> Option<Event> {
        self.hidden_at_ms = None;
        if !self.state.running {
            self.persist();
            return None;
        }
        let now = self.clock.now_ms();
        self.flush_elapsed(now);
        if self.state.time_left_secs == 0 {
            return Some(self.complete_phase());
        }
        self.persist();
        None
    }

    /// Latest score from the attention tracker, `None` when not tracked.
    /// Attached to Focus completion records.
    pub fn observe_attention_score(&mut self, score: Option<u8>) {
        self.live_score = score;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn recover(&mut self) {
        let snapshot = match self.store.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                log::warn!("discarding unreadable session snapshot: {e}");
                return;
            }
        };
        self.settings = snapshot.settings.sanitized(&self.settings);
        self.state = snapshot.state;
        self.manual_pause = snapshot.manual_pause;
        self.hidden_at_ms = None;
        let max = self.phase_duration_secs();
        if self.state.time_left_secs > max {
            self.state.time_left_secs = max;
        }
        if !self.state.running {
            return;
        }
        match snapshot.saved_at_epoch_ms {
            Some(saved_at) => {
                let now = self.clock.now_ms();
                // Clock skew can make saved_at land in the future; elapsed
                // clamps to zero rather than extending the countdown.
                let elapsed_secs = now.saturating_sub(saved_at) / 1000;
                self.state.time_left_secs = self.state.time_left_secs.saturating_sub(elapsed_secs);
                if self.state.time_left_secs == 0 {
                    self.state.running = false;
                    self.complete_phase();
                } else {
                    self.last_tick_ms = Some(now);
                    self.persist();
                }
            }
            None => {
                // running=true without a timestamp means the stop was
                // persisted mid-write; treat it as not counting.
                self.state.running = false;
                self.persist();
            }
        }
    }

    fn flush_elapsed(&mut self, now: u64) {
        match self.last_tick_ms {
            Some(last) => {
                let elapsed_secs = now.saturating_sub(last) / 1000;
                if elapsed_secs > 0 {
                    self.state.time_left_secs =
                        self.state.time_left_secs.saturating_sub(elapsed_secs);
                    // Carry the sub-second remainder forward.
                    self.last_tick_ms = Some(last + elapsed_secs * 1000);
                }
            }
            None => self.last_tick_ms = Some(now),
        }
    }

    /// The completion transition shared by natural expiry, `skip()`,
    /// recovery, and visibility restore.
    fn complete_phase(&mut self) -> Event {
        let now = self.clock.now_ms();
        let finished = self.state.phase;
        let finished_started_at = self.phase_started_at_ms.take();
        self.state.running = false;
        self.last_tick_ms = None;

        let attention_score = match finished {
            Phase::Focus => {
                self.state.completed_count += 1;
                let break_minutes = self.break_minutes_for(self.state.completed_count);
                self.state.phase = Phase::Break;
                self.state.time_left_secs = break_minutes as u64 * 60;
                Some(self.live_score.unwrap_or(0))
            }
            Phase::Break => {
                self.state.phase = Phase::Focus;
                self.state.time_left_secs = self.settings.focus_minutes as u64 * 60;
                None
            }
        };

        let record = CompletedSession {
            phase: finished,
            duration_minutes: match finished {
                Phase::Focus => self.settings.focus_minutes,
                Phase::Break => self.settings.break_minutes,
            },
            started_at: epoch_to_utc(finished_started_at.unwrap_or(now)),
            ended_at: epoch_to_utc(now),
            attention_score: attention_score.unwrap_or(0),
        };
        if let Err(e) = self.telemetry.record_completed_session(&record) {
            log::warn!("completed-session record dropped: {e}");
        }
        if let Err(e) = self.notifier.phase_completed(finished) {
            log::warn!("phase-complete notification dropped: {e}");
        }
        if let Err(e) = self.notifier.phase_started(self.state.phase) {
            log::warn!("phase-start notification dropped: {e}");
        }

        if !self.manual_pause && self.state.time_left_secs > 0 {
            self.pending_resume = Some(PendingResume {
                due_at_ms: now + AUTO_RESUME_DELAY_MS,
                generation: self.generation,
            });
        }
        self.persist();
        Event::PhaseCompleted {
            phase: finished,
            next_phase: self.state.phase,
            completed_count: self.state.completed_count,
            attention_score,
            at: self.now_utc(),
        }
    }

    fn poll_auto_resume(&mut self, now: u64) -> Option<Event> {
        let pending = self.pending_resume?;
        if pending.generation != self.generation {
            self.pending_resume = None;
            return None;
        }
        if now < pending.due_at_ms {
            return None;
        }
        self.pending_resume = None;
        if self.manual_pause || self.state.running || self.state.time_left_secs == 0 {
            return None;
        }
        self.state.running = true;
        self.last_tick_ms = Some(now);
        if self.phase_started_at_ms.is_none() {
            self.phase_started_at_ms = Some(now);
        }
        self.persist();
        Some(Event::AutoResumed {
            phase: self.state.phase,
            time_left_secs: self.state.time_left_secs,
            at: self.now_utc(),
        })
    }

    fn cancel_pending(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending_resume = None;
    }

    /// Break minutes owed after the given number of completed Focus phases.
    /// The interval is read at the moment of the transition; reconfiguring
    /// it mid-cycle applies to the already-accumulated count.
    fn break_minutes_for(&self, completed: u32) -> u32 {
        if completed > 0 && completed % self.settings.long_break_interval == 0 {
            self.settings.long_break_minutes
        } else {
            self.settings.break_minutes
        }
    }

    fn phase_duration_secs(&self) -> u64 {
        match self.state.phase {
            Phase::Focus => self.settings.focus_minutes as u64 * 60,
            Phase::Break => self.break_minutes_for(self.state.completed_count) as u64 * 60,
        }
    }

    fn persist(&mut self) {
        let snapshot = PersistedSnapshot {
            state: self.state.clone(),
            settings: self.settings,
            saved_at_epoch_ms: self.state.running.then(|| self.clock.now_ms()),
            manual_pause: self.manual_pause,
            hidden_at_epoch_ms: self.hidden_at_ms,
        };
        if let Err(e) = self.store.save_snapshot(&snapshot) {
            log::warn!("session snapshot save failed: {e}");
        }
    }

    fn now_utc(&self) -> DateTime<Utc> {
        epoch_to_utc(self.clock.now_ms())
    }
}

fn epoch_to_utc(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::NoopNotifier;
    use crate::store::MemorySnapshotStore;
    use crate::telemetry::NoopTelemetry;

    fn machine_with(clock: Arc<ManualClock>) -> SessionMachine {
        SessionMachine::new(
            clock,
            Box::new(MemorySnapshotStore::new()),
            Box::new(NoopNotifier),
            Box::new(NoopTelemetry),
            SessionSettings::default(),
        )
    }

    #[test]
    fn start_while_running_is_noop() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        assert!(machine.start().is_some());
        let before = machine.state().clone();
        assert!(machine.start().is_none());
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn tick_counts_wall_clock_seconds() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(10);
        assert!(machine.tick().is_none());
        assert_eq!(machine.state().time_left_secs, 25 * 60 - 10);
    }

    #[test]
    fn sub_second_remainder_is_carried() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_ms(1_500);
        machine.tick();
        assert_eq!(machine.state().time_left_secs, 25 * 60 - 1);
        clock.advance_ms(500);
        machine.tick();
        assert_eq!(machine.state().time_left_secs, 25 * 60 - 2);
    }

    #[test]
    fn pause_stops_counting_and_sets_marker() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(5);
        assert!(machine.pause().is_some());
        assert!(!machine.is_running());
        assert!(machine.manual_pause());
        assert_eq!(machine.state().time_left_secs, 25 * 60 - 5);
        clock.advance_secs(100);
        assert!(machine.tick().is_none());
        assert_eq!(machine.state().time_left_secs, 25 * 60 - 5);
    }

    #[test]
    fn reset_restores_phase_duration() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(60);
        machine.tick();
        machine.reset();
        assert!(!machine.is_running());
        assert_eq!(machine.state().time_left_secs, 25 * 60);
    }

    #[test]
    fn skip_runs_the_completion_transition() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        let event = machine.skip().unwrap();
        match event {
            Event::PhaseCompleted {
                phase,
                next_phase,
                completed_count,
                ..
            } => {
                assert_eq!(phase, Phase::Focus);
                assert_eq!(next_phase, Phase::Break);
                assert_eq!(completed_count, 1);
            }
            other => panic!("expected PhaseCompleted, got {other:?}"),
        }
        assert_eq!(machine.state().time_left_secs, 5 * 60);
    }

    #[test]
    fn natural_expiry_completes_once() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(25 * 60);
        let event = machine.tick();
        assert!(matches!(event, Some(Event::PhaseCompleted { .. })));
        assert_eq!(machine.state().phase, Phase::Break);
        assert_eq!(machine.state().completed_count, 1);
        // The next tick must not complete again.
        clock.advance_ms(100);
        assert!(machine.tick().is_none());
        assert_eq!(machine.state().completed_count, 1);
    }

    #[test]
    fn auto_resume_fires_after_delay() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(25 * 60);
        machine.tick();
        assert!(machine.has_pending_resume());
        clock.advance_ms(AUTO_RESUME_DELAY_MS);
        let event = machine.tick();
        assert!(matches!(event, Some(Event::AutoResumed { .. })));
        assert!(machine.is_running());
    }

    #[test]
    fn pause_inside_resume_window_cancels_it() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(25 * 60);
        machine.tick();
        machine.pause();
        clock.advance_ms(AUTO_RESUME_DELAY_MS * 2);
        assert!(machine.tick().is_none());
        assert!(!machine.is_running());
    }

    #[test]
    fn update_settings_stops_and_resizes_focus() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(25 * 60 - 10);
        machine.tick();
        assert_eq!(machine.state().time_left_secs, 10);
        machine.update_settings(SettingsUpdate {
            focus_minutes: Some(50),
            ..Default::default()
        });
        assert!(!machine.is_running());
        assert_eq!(machine.state().time_left_secs, 3_000);
    }

    #[test]
    fn hidden_visible_forces_background_completion() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut machine = machine_with(clock.clone());
        machine.start();
        clock.advance_secs(25 * 60 - 120);
        machine.tick();
        machine.handle_hidden();
        clock.advance_secs(600);
        let event = machine.handle_visible();
        assert!(matches!(event, Some(Event::PhaseCompleted { .. })));
        assert_eq!(machine.state().phase, Phase::Break);
        assert_eq!(machine.state().completed_count, 1);
    }
}
