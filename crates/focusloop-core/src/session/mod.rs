mod machine;
mod settings;
mod state;

pub use machine::{SessionMachine, AUTO_RESUME_DELAY_MS};
pub use settings::{SessionSettings, SettingsUpdate};
pub use state::{PersistedSnapshot, Phase, SessionState};
