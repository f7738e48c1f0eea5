//! Property tests: score bounds under arbitrary event sequences and the
//! recovery arithmetic invariant.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use focusloop_core::attention::{ActivityKind, AttentionTracker};
use focusloop_core::clock::ManualClock;
use focusloop_core::notify::NoopNotifier;
use focusloop_core::session::{Phase, SessionMachine, SessionSettings};
use focusloop_core::telemetry::NoopTelemetry;

use common::{RecordingNotifier, RecordingTelemetry, SharedStore};

#[derive(Debug, Clone, Copy)]
enum Step {
    Pointer,
    Key,
    Click,
    Scroll,
    Visibility(bool),
    WindowFocus(bool),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Pointer),
        Just(Step::Key),
        Just(Step::Click),
        Just(Step::Scroll),
        any::<bool>().prop_map(Step::Visibility),
        any::<bool>().prop_map(Step::WindowFocus),
    ]
}

proptest! {
    #[test]
    fn score_stays_within_bounds(
        steps in proptest::collection::vec((step_strategy(), 0u64..5_000), 0..250)
    ) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut tracker = AttentionTracker::new(
            clock.clone(),
            Box::new(NoopTelemetry),
            Box::new(NoopNotifier),
        );
        tracker.start_tracking(None);

        for (step, advance_ms) in steps {
            clock.advance_ms(advance_ms);
            match step {
                Step::Pointer => tracker.record_activity(ActivityKind::PointerMove),
                Step::Key => tracker.record_activity(ActivityKind::KeyPress),
                Step::Click => tracker.record_activity(ActivityKind::Click),
                Step::Scroll => tracker.record_activity(ActivityKind::Scroll),
                Step::Visibility(v) => tracker.set_page_visible(v),
                Step::WindowFocus(f) => tracker.set_window_focused(f),
            }
            if let Some(metric) = tracker.tick() {
                prop_assert!(metric.attention_score <= 100);
                prop_assert!(metric.distraction_count <= 4);
            }
            prop_assert!(tracker.current_score() <= 100);
        }
    }

    #[test]
    fn recovery_matches_wall_clock_arithmetic(
        focus_minutes in 1u32..120,
        run_secs in 0u64..7_200,
        gap_secs in 0u64..20_000,
    ) {
        let focus_secs = focus_minutes as u64 * 60;
        let run_secs = run_secs.min(focus_secs - 1);
        let settings = SessionSettings {
            focus_minutes,
            ..SessionSettings::default()
        };

        let clock = Arc::new(ManualClock::new(1_000_000_000));
        let store = SharedStore::default();
        {
            let mut m = SessionMachine::new(
                clock.clone(),
                Box::new(store.clone()),
                Box::new(RecordingNotifier::default()),
                Box::new(RecordingTelemetry::default()),
                settings,
            );
            m.start();
            clock.advance_secs(run_secs);
            m.tick();
        }
        let time_left_at_save = focus_secs - run_secs;

        clock.advance_secs(gap_secs);
        let m = SessionMachine::new(
            clock,
            Box::new(store),
            Box::new(RecordingNotifier::default()),
            Box::new(RecordingTelemetry::default()),
            settings,
        );

        if gap_secs < time_left_at_save {
            prop_assert_eq!(m.state().time_left_secs, time_left_at_save - gap_secs);
            prop_assert!(m.state().running);
            prop_assert_eq!(m.state().phase, Phase::Focus);
            prop_assert_eq!(m.state().completed_count, 0);
        } else {
            // Expired while suspended: completed exactly once into Break.
            prop_assert_eq!(m.state().phase, Phase::Break);
            prop_assert_eq!(m.state().completed_count, 1);
            prop_assert!(!m.state().running);
            prop_assert_eq!(m.state().time_left_secs, 5 * 60);
        }
    }
}
