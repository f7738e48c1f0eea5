//! Attention scoring engine.
//!
//! Turns raw interaction telemetry (pointer, keyboard, click, scroll,
//! visibility, window focus) into a bounded 0-100 focus score on a fixed
//! 2-second cadence. Like the session machine, the tracker is caller-driven:
//! `tick()` runs a scoring pass when the cadence is due and tolerates
//! arbitrarily large gaps between calls.
//!
//! Every adjustment is independent; they are summed and the result clipped
//! to `[0, 100]`, so the score is explainable term by term.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::notify::Notifier;
use crate::telemetry::{FocusMetric, Posture, TelemetrySink};

/// Scoring cadence. Also the fixed step added to the idle accumulator by
/// each tick that observes silence.
pub const SCORE_TICK_MS: u64 = 2_000;
/// Activity samples older than this are pruned on every insert.
const RETENTION_MS: u64 = 5 * 60 * 1000;
/// Window for the diversity, engagement, rate, and erratic terms.
const RECENT_WINDOW_MS: u64 = 30_000;
/// Window for the short-term pointer+key boost.
const SHORT_WINDOW_MS: u64 = 10_000;
/// Silence longer than this makes a tick count toward the idle accumulator.
const IDLE_OBSERVE_MS: u64 = 5_000;
/// Silence longer than this starts the inactivity penalty.
const INACTIVITY_GRACE_MS: u64 = 15_000;
/// Idle accumulator level where the extended-idle penalty starts.
const EXTENDED_IDLE_MS: u64 = 45_000;
/// Ring-buffer capacity for the in-memory metric history.
pub const HISTORY_CAP: usize = 100;

/// Raw interaction event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Click,
    Scroll,
}

/// Qualitative score band; crossing a boundary notifies the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Low,
    Normal,
    High,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        if score < 40 {
            ScoreBand::Low
        } else if score > 80 {
            ScoreBand::High
        } else {
            ScoreBand::Normal
        }
    }
}

/// Qualitative distraction flags. Independent; any subset may co-occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distraction {
    TabHidden,
    WindowUnfocused,
    NoRecentActivity,
    ExtendedIdle,
    ExcessivePointer,
    RapidClicking,
    VeryLowEngagement,
}

impl Distraction {
    pub fn label(&self) -> &'static str {
        match self {
            Distraction::TabHidden => "Tab not visible",
            Distraction::WindowUnfocused => "Window not focused",
            Distraction::NoRecentActivity => "No recent activity",
            Distraction::ExtendedIdle => "Extended idle period",
            Distraction::ExcessivePointer => "Excessive pointer movement",
            Distraction::RapidClicking => "Rapid clicking",
            Distraction::VeryLowEngagement => "Very low engagement",
        }
    }
}

impl fmt::Display for Distraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trailing timestamps for one activity kind, pruned on every insert.
#[derive(Debug, Clone, Default)]
struct SampleWindow {
    samples: VecDeque<u64>,
}

impl SampleWindow {
    fn record(&mut self, now: u64) {
        self.samples.push_back(now);
        self.prune(now);
    }

    fn prune(&mut self, now: u64) {
        while let Some(&oldest) = self.samples.front() {
            if now.saturating_sub(oldest) > RETENTION_MS {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn count_within(&self, now: u64, window_ms: u64) -> usize {
        self.samples
            .iter()
            .rev()
            .take_while(|&&t| now.saturating_sub(t) <= window_ms)
            .count()
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

pub struct AttentionTracker {
    clock: Arc<dyn Clock>,
    telemetry: Box<dyn TelemetrySink>,
    notifier: Box<dyn Notifier>,
    tracking: bool,
    session_id: Option<String>,
    pointer: SampleWindow,
    keys: SampleWindow,
    clicks: SampleWindow,
    scrolls: SampleWindow,
    started_at_ms: u64,
    last_activity_ms: Option<u64>,
    idle_time_ms: u64,
    score: u8,
    band: ScoreBand,
    page_visible: bool,
    window_focused: bool,
    last_tick_ms: Option<u64>,
    history: VecDeque<FocusMetric>,
}

impl AttentionTracker {
    pub fn new(
        clock: Arc<dyn Clock>,
        telemetry: Box<dyn TelemetrySink>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            clock,
            telemetry,
            notifier,
            tracking: false,
            session_id: None,
            pointer: SampleWindow::default(),
            keys: SampleWindow::default(),
            clicks: SampleWindow::default(),
            scrolls: SampleWindow::default(),
            started_at_ms: 0,
            last_activity_ms: None,
            idle_time_ms: 0,
            score: 0,
            band: ScoreBand::Low,
            page_visible: true,
            window_focused: true,
            last_tick_ms: None,
            history: VecDeque::with_capacity(HISTORY_CAP),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Begin tracking. Idempotent: a second call while tracking is a no-op.
    /// Resets all counters and the metric history.
    pub fn start_tracking(&mut self, session_id: Option<String>) {
        if self.tracking {
            return;
        }
        self.reset_counters();
        self.session_id = session_id;
        self.started_at_ms = self.clock.now_ms();
        self.tracking = true;
        self.score = 100;
        self.band = ScoreBand::of(self.score);
    }

    /// Stop tracking and zero all counters and the live score. Safe to call
    /// repeatedly and on teardown.
    pub fn stop_tracking(&mut self) {
        self.tracking = false;
        self.session_id = None;
        self.reset_counters();
        self.score = 0;
        self.band = ScoreBand::of(0);
    }

    fn reset_counters(&mut self) {
        self.pointer.clear();
        self.keys.clear();
        self.clicks.clear();
        self.scrolls.clear();
        self.last_activity_ms = None;
        self.idle_time_ms = 0;
        self.last_tick_ms = None;
        self.history.clear();
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn current_score(&self) -> u8 {
        self.score
    }

    /// Latest score while tracking, `None` otherwise.
    pub fn live_score(&self) -> Option<u8> {
        self.tracking.then_some(self.score)
    }

    pub fn history(&self) -> impl Iterator<Item = &FocusMetric> {
        self.history.iter()
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Ingest one interaction event. Ignored while not tracking.
    pub fn record_activity(&mut self, kind: ActivityKind) {
        if !self.tracking {
            return;
        }
        let now = self.clock.now_ms();
        match kind {
            ActivityKind::PointerMove => self.pointer.record(now),
            ActivityKind::KeyPress => self.keys.record(now),
            ActivityKind::Click => self.clicks.record(now),
            ActivityKind::Scroll => self.scrolls.record(now),
        }
        self.last_activity_ms = Some(now);
        self.idle_time_ms = 0;
    }

    /// Environment visibility signal. Tracked even while stopped so the
    /// first scoring pass after a restart sees current state.
    pub fn set_page_visible(&mut self, visible: bool) {
        self.page_visible = visible;
    }

    pub fn set_window_focused(&mut self, focused: bool) {
        self.window_focused = focused;
    }

    // ── Scoring ──────────────────────────────────────────────────────

    /// Call periodically. Runs a scoring pass when the 2-second cadence is
    /// due and returns the metric it produced. One pass covers an arbitrary
    /// gap; suspended intervals are not replayed.
    pub fn tick(&mut self) -> Option<FocusMetric> {
        if !self.tracking {
            return None;
        }
        let now = self.clock.now_ms();
        if let Some(last) = self.last_tick_ms {
            if now.saturating_sub(last) < SCORE_TICK_MS {
                return None;
            }
        }
        self.last_tick_ms = Some(now);

        if self.time_since_activity(now) > IDLE_OBSERVE_MS {
            self.idle_time_ms += SCORE_TICK_MS;
        }

        let score = self.compute_score(now);
        self.score = score;
        let band = ScoreBand::of(score);
        if band != self.band {
            self.band = band;
            if let Err(e) = self.notifier.score_band_changed(band, score) {
                log::warn!("score-band notification dropped: {e}");
            }
        }

        let metric = FocusMetric {
            id: Uuid::new_v4(),
            session_id: self.session_id.clone(),
            timestamp_ms: now,
            attention_score: score,
            eye_contact_approx: score > 70 && self.page_visible,
            posture_approx: Posture::of(score),
            distraction_count: (100 - score as u32) / 25,
        };
        self.history.push_back(metric.clone());
        if self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
        if let Err(e) = self.telemetry.record_focus_metric(&metric) {
            log::warn!("focus metric dropped: {e}");
        }
        Some(metric)
    }

    fn time_since_activity(&self, now: u64) -> u64 {
        let reference = self.last_activity_ms.unwrap_or(self.started_at_ms);
        now.saturating_sub(reference)
    }

    fn recent_counts(&self, now: u64) -> [usize; 4] {
        [
            self.pointer.count_within(now, RECENT_WINDOW_MS),
            self.keys.count_within(now, RECENT_WINDOW_MS),
            self.clicks.count_within(now, RECENT_WINDOW_MS),
            self.scrolls.count_within(now, RECENT_WINDOW_MS),
        ]
    }

    fn compute_score(&self, now: u64) -> u8 {
        let mut score = 100.0_f64;

        if !self.page_visible {
            score -= 50.0;
        }
        if !self.window_focused {
            score -= 35.0;
        }

        let since_activity = self.time_since_activity(now);
        if since_activity > INACTIVITY_GRACE_MS {
            let excess_ms = (since_activity - INACTIVITY_GRACE_MS) as f64;
            score -= (excess_ms / 1000.0 * 2.0).min(30.0);
        }

        let counts = self.recent_counts(now);
        let total: usize = counts.iter().sum();

        let kinds = counts.iter().filter(|&&c| c > 0).count();
        if kinds >= 2 {
            score += ((kinds * 5) as f64).min(15.0);
        }

        if total >= 10 {
            score += (total as f64 / 5.0).min(10.0);
        }

        let short_term = self.pointer.count_within(now, SHORT_WINDOW_MS)
            + self.keys.count_within(now, SHORT_WINDOW_MS);
        if short_term > 0 {
            score += (short_term as f64).min(8.0);
        }

        if self.idle_time_ms > EXTENDED_IDLE_MS {
            score -= (self.idle_time_ms as f64 / EXTENDED_IDLE_MS as f64 * 15.0).min(30.0);
        }

        if total > 100 {
            score -= ((total - 100) as f64 / 20.0).min(15.0);
        }

        let events_per_sec = total as f64 / (RECENT_WINDOW_MS as f64 / 1000.0);
        if (0.3..=2.0).contains(&events_per_sec) {
            score += 5.0;
        }

        score.clamp(0.0, 100.0).round() as u8
    }

    // ── Distraction detector ─────────────────────────────────────────

    /// On-demand qualitative flags; not tied to the scoring cadence.
    pub fn distractions(&self) -> Vec<Distraction> {
        let now = self.clock.now_ms();
        let mut flags = Vec::new();
        if !self.page_visible {
            flags.push(Distraction::TabHidden);
        }
        if !self.window_focused {
            flags.push(Distraction::WindowUnfocused);
        }
        let since_activity = self.time_since_activity(now);
        if since_activity > 20_000 {
            flags.push(Distraction::NoRecentActivity);
        }
        if self.idle_time_ms > 90_000 {
            flags.push(Distraction::ExtendedIdle);
        }
        if self.pointer.count_within(now, SHORT_WINDOW_MS) > 60 {
            flags.push(Distraction::ExcessivePointer);
        }
        if self.clicks.count_within(now, RECENT_WINDOW_MS) > 20 {
            flags.push(Distraction::RapidClicking);
        }
        let total: usize = self.recent_counts(now).iter().sum();
        if total < 3 && since_activity < 60_000 {
            flags.push(Distraction::VeryLowEngagement);
        }
        flags
    }
}
