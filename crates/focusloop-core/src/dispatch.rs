//! Environment event dispatcher.
//!
//! Normalizes all host-environment signals into one ordered stream consumed
//! by both the session machine and the attention tracker, instead of each
//! component layering its own listeners. Visibility feeds both components;
//! activity and window focus feed only the tracker. `pump()` drives both
//! periodic ticks and hands the live score to the machine so a Focus
//! completion attaches it.

use serde::{Deserialize, Serialize};

use crate::attention::{ActivityKind, AttentionTracker};
use crate::events::Event;
use crate::session::SessionMachine;
use crate::telemetry::FocusMetric;

/// One normalized environment signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    Activity { kind: ActivityKind },
    VisibilityChanged { visible: bool },
    WindowFocusChanged { focused: bool },
}

pub struct Dispatcher {
    machine: SessionMachine,
    tracker: AttentionTracker,
}

impl Dispatcher {
    pub fn new(machine: SessionMachine, tracker: AttentionTracker) -> Self {
        Self { machine, tracker }
    }

    /// Route one environment event in arrival order.
    pub fn dispatch(&mut self, event: EnvironmentEvent) -> Option<Event> {
        match event {
            EnvironmentEvent::Activity { kind } => {
                self.tracker.record_activity(kind);
                None
            }
            EnvironmentEvent::VisibilityChanged { visible } => {
                self.tracker.set_page_visible(visible);
                if visible {
                    self.machine.handle_visible()
                } else {
                    self.machine.handle_hidden();
                    None
                }
            }
            EnvironmentEvent::WindowFocusChanged { focused } => {
                self.tracker.set_window_focused(focused);
                None
            }
        }
    }

    /// Drive both periodic ticks. Call at the fastest cadence (~1 s); each
    /// component applies its own schedule internally.
    pub fn pump(&mut self) -> (Option<FocusMetric>, Option<Event>) {
        let metric = self.tracker.tick();
        self.machine.observe_attention_score(self.tracker.live_score());
        let event = self.machine.tick();
        (metric, event)
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SessionMachine {
        &mut self.machine
    }

    pub fn tracker(&self) -> &AttentionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut AttentionTracker {
        &mut self.tracker
    }
}
