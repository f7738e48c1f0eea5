use std::io::BufRead;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use focusloop_core::attention::{ActivityKind, AttentionTracker};
use focusloop_core::clock::SystemClock;
use focusloop_core::dispatch::{Dispatcher, EnvironmentEvent};
use focusloop_core::storage::{Config, Database};

use super::common::{self, TermNotifier};

#[derive(Subcommand)]
pub enum TrackAction {
    /// Run the attention tracker in the foreground, reading activity from
    /// stdin: m=pointer k=key c=click s=scroll h=hidden v=visible
    /// u=unfocused f=focused (one letter per line)
    Run {
        /// Stop after this many seconds
        #[arg(long, default_value = "60")]
        seconds: u64,
        /// Also start the session countdown
        #[arg(long)]
        with_timer: bool,
    },
}

fn parse_line(line: &str) -> Option<EnvironmentEvent> {
    match line.trim() {
        "m" => Some(EnvironmentEvent::Activity {
            kind: ActivityKind::PointerMove,
        }),
        "k" => Some(EnvironmentEvent::Activity {
            kind: ActivityKind::KeyPress,
        }),
        "c" => Some(EnvironmentEvent::Activity {
            kind: ActivityKind::Click,
        }),
        "s" => Some(EnvironmentEvent::Activity {
            kind: ActivityKind::Scroll,
        }),
        "h" => Some(EnvironmentEvent::VisibilityChanged { visible: false }),
        "v" => Some(EnvironmentEvent::VisibilityChanged { visible: true }),
        "u" => Some(EnvironmentEvent::WindowFocusChanged { focused: false }),
        "f" => Some(EnvironmentEvent::WindowFocusChanged { focused: true }),
        _ => None,
    }
}

pub fn run(action: TrackAction) -> Result<(), Box<dyn std::error::Error>> {
    let TrackAction::Run {
        seconds,
        with_timer,
    } = action;
    let config = Config::load()?;
    let machine = common::open_machine()?;
    let telemetry = Database::open()?;
    let tracker = AttentionTracker::new(
        Arc::new(SystemClock),
        Box::new(telemetry),
        Box::new(TermNotifier),
    );
    let mut dispatcher = Dispatcher::new(machine, tracker);
    dispatcher
        .tracker_mut()
        .start_tracking(config.tracking.session_label.clone());
    if with_timer {
        dispatcher.machine_mut().start();
    }

    // Stdin is read on a helper thread; the loop below owns the cadence.
    let (tx, rx) = mpsc::channel::<EnvironmentEvent>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(event) = parse_line(&line) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    });

    let deadline = std::time::Instant::now() + Duration::from_secs(seconds);
    while std::time::Instant::now() < deadline {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(env_event) => {
                if let Some(event) = dispatcher.dispatch(env_event) {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(Duration::from_millis(250));
            }
        }
        let (metric, event) = dispatcher.pump();
        if let Some(metric) = metric {
            println!(
                "score {:>3}  posture {:?}  distractions {}",
                metric.attention_score, metric.posture_approx, metric.distraction_count
            );
        }
        if let Some(event) = event {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    let flags = dispatcher.tracker().distractions();
    if !flags.is_empty() {
        println!(
            "flags: {}",
            flags
                .iter()
                .map(|f| f.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!("final score: {}", dispatcher.tracker().current_score());
    dispatcher.tracker_mut().stop_tracking();
    if with_timer {
        dispatcher.machine_mut().pause();
    }
    Ok(())
}
