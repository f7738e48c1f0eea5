use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Session durations and the long-break cadence, all in whole minutes.
///
/// Mutable only through [`SettingsUpdate`]; the machine drops to a
/// non-running state whenever an update is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    /// Every Nth completed Focus phase earns the long break. Always >= 2.
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
}

/// Partial settings change; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub focus_minutes: Option<u32>,
    pub break_minutes: Option<u32>,
    pub long_break_minutes: Option<u32>,
    pub long_break_interval: Option<u32>,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_long_break_interval(),
        }
    }
}

impl SessionSettings {
    /// Validated constructor. Durations must be >= 1 minute, the long-break
    /// interval >= 2.
    pub fn new(
        focus_minutes: u32,
        break_minutes: u32,
        long_break_minutes: u32,
        long_break_interval: u32,
    ) -> Result<Self, SettingsError> {
        let settings = Self {
            focus_minutes,
            break_minutes,
            long_break_minutes,
            long_break_interval,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let minutes = [
            ("focus_minutes", self.focus_minutes),
            ("break_minutes", self.break_minutes),
            ("long_break_minutes", self.long_break_minutes),
        ];
        for (field, value) in minutes {
            if value == 0 {
                return Err(SettingsError::InvalidValue {
                    field: field.into(),
                    message: "must be at least 1 minute".into(),
                });
            }
        }
        if self.long_break_interval < 2 {
            return Err(SettingsError::InvalidValue {
                field: "long_break_interval".into(),
                message: "must be at least 2".into(),
            });
        }
        Ok(())
    }

    /// Merge an update, field by field. Invalid fields fall back to the
    /// current value and are logged; this never fails.
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        let mut next = *self;
        next.focus_minutes = merge_minutes("focus_minutes", self.focus_minutes, update.focus_minutes);
        next.break_minutes = merge_minutes("break_minutes", self.break_minutes, update.break_minutes);
        next.long_break_minutes = merge_minutes(
            "long_break_minutes",
            self.long_break_minutes,
            update.long_break_minutes,
        );
        if let Some(interval) = update.long_break_interval {
            if interval >= 2 {
                next.long_break_interval = interval;
            } else {
                log::warn!("ignoring long_break_interval={interval}: must be at least 2");
            }
        }
        next
    }

    /// Replace any invalid field with the corresponding field of `fallback`.
    /// Used when settings come from an untrusted source (persisted snapshot,
    /// config file).
    pub fn sanitized(mut self, fallback: &SessionSettings) -> Self {
        if self.focus_minutes == 0 {
            self.focus_minutes = fallback.focus_minutes;
        }
        if self.break_minutes == 0 {
            self.break_minutes = fallback.break_minutes;
        }
        if self.long_break_minutes == 0 {
            self.long_break_minutes = fallback.long_break_minutes;
        }
        if self.long_break_interval < 2 {
            self.long_break_interval = fallback.long_break_interval;
        }
        self
    }
}

fn merge_minutes(field: &str, current: u32, candidate: Option<u32>) -> u32 {
    match candidate {
        Some(0) => {
            log::warn!("ignoring {field}=0: must be at least 1 minute");
            current
        }
        Some(value) => value,
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_25_5_15_4() {
        let s = SessionSettings::default();
        assert_eq!(
            (s.focus_minutes, s.break_minutes, s.long_break_minutes, s.long_break_interval),
            (25, 5, 15, 4)
        );
    }

    #[test]
    fn new_rejects_zero_duration_and_small_interval() {
        assert!(SessionSettings::new(0, 5, 15, 4).is_err());
        assert!(SessionSettings::new(25, 5, 15, 1).is_err());
        assert!(SessionSettings::new(25, 5, 15, 2).is_ok());
    }

    #[test]
    fn merged_applies_valid_fields_only() {
        let base = SessionSettings::default();
        let next = base.merged(&SettingsUpdate {
            focus_minutes: Some(50),
            break_minutes: Some(0),
            long_break_minutes: None,
            long_break_interval: Some(1),
        });
        assert_eq!(next.focus_minutes, 50);
        assert_eq!(next.break_minutes, 5);
        assert_eq!(next.long_break_minutes, 15);
        assert_eq!(next.long_break_interval, 4);
    }

    #[test]
    fn sanitized_falls_back_per_field() {
        let bad = SessionSettings {
            focus_minutes: 0,
            break_minutes: 10,
            long_break_minutes: 0,
            long_break_interval: 0,
        };
        let fixed = bad.sanitized(&SessionSettings::default());
        assert_eq!(fixed.focus_minutes, 25);
        assert_eq!(fixed.break_minutes, 10);
        assert_eq!(fixed.long_break_minutes, 15);
        assert_eq!(fixed.long_break_interval, 4);
    }
}
