//! # Focusloop Core Library
//!
//! Core business logic for Focusloop: a countdown-session scheduler paired
//! with a passive attention-scoring engine. The CLI binary is a thin layer
//! over this crate; any GUI would be too.
//!
//! ## Architecture
//!
//! - **Session machine**: a wall-clock-based state machine that requires the
//!   caller to periodically invoke `tick()`; it persists a snapshot on every
//!   mutation and recovers from it at start-up, so suspensions and restarts
//!   resolve to the same state as an uninterrupted countdown
//! - **Attention tracker**: rolling activity windows scored on a 2-second
//!   cadence into a bounded, explainable 0-100 focus score
//! - **Dispatcher**: one ordered environment-event stream feeding both
//! - **Storage**: SQLite session/metric storage and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionMachine`]: countdown state machine
//! - [`AttentionTracker`]: focus scoring engine
//! - [`Dispatcher`]: environment signal routing
//! - [`Database`]: persistence and statistics
//! - [`Config`]: application configuration

pub mod attention;
pub mod clock;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod notify;
pub mod session;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use attention::{ActivityKind, AttentionTracker, Distraction, ScoreBand};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{Dispatcher, EnvironmentEvent};
pub use error::{ConfigError, CoreError, SettingsError, StorageError};
pub use events::Event;
pub use notify::{Notifier, NoopNotifier};
pub use session::{
    PersistedSnapshot, Phase, SessionMachine, SessionSettings, SessionState, SettingsUpdate,
};
pub use storage::{Config, Database, Stats};
pub use store::{MemorySnapshotStore, SnapshotStore};
pub use telemetry::{CompletedSession, FocusMetric, NoopTelemetry, Posture, TelemetrySink};
