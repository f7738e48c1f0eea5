//! SQLite-based persistence.
//!
//! Provides durable storage for:
//! - Completed sessions with their attention score
//! - Focus metrics forwarded by the attention tracker
//! - The key-value snapshot backing session recovery
//!
//! The database doubles as the production [`SnapshotStore`] and
//! [`TelemetrySink`] implementations.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::StorageError;
use crate::session::{PersistedSnapshot, Phase};
use crate::store::SnapshotStore;
use crate::telemetry::{CompletedSession, FocusMetric, TelemetrySink};

const KEY_STATE: &str = "session-state";
const KEY_SETTINGS: &str = "session-settings";
const KEY_SAVED_AT: &str = "session-saved-at";
const KEY_MANUAL_PAUSE: &str = "manual-pause-marker";
const KEY_HIDDEN_AT: &str = "hidden-at-marker";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub completed_focus_sessions: u64,
    pub avg_attention_score: f64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

/// SQLite database at `~/.config/focusloop/focusloop.db`.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the default database, creating file and schema if needed.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?
            .join("focusloop.db");
        Self::open_at(&path)
    }

    /// Open a database at an explicit path (tests use a temp directory).
    pub fn open_at(path: &std::path::Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                phase           TEXT NOT NULL,
                duration_min    INTEGER NOT NULL,
                started_at      TEXT NOT NULL,
                ended_at        TEXT NOT NULL,
                attention_score INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS focus_metrics (
                id                TEXT PRIMARY KEY,
                session_id        TEXT,
                timestamp_ms      INTEGER NOT NULL,
                attention_score   INTEGER NOT NULL,
                eye_contact       INTEGER NOT NULL,
                posture           TEXT NOT NULL,
                distraction_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON sessions(ended_at);
            CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON focus_metrics(timestamp_ms);",
        )?;
        Ok(())
    }

    // ── Key-value store ──────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub fn stats_all(&self) -> Result<Stats, StorageError> {
        let mut stats = Stats::default();
        let mut stmt = self.conn.prepare(
            "SELECT phase, COUNT(*), COALESCE(SUM(duration_min), 0), COALESCE(AVG(attention_score), 0)
             FROM sessions
             GROUP BY phase",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        for row in rows {
            let (phase, count, minutes, avg_score) = row.map_err(StorageError::from)?;
            stats.total_sessions += count;
            match phase.as_str() {
                "focus" => {
                    stats.completed_focus_sessions += count;
                    stats.total_focus_min += minutes;
                    stats.avg_attention_score = avg_score;
                }
                "break" => {
                    stats.total_break_min += minutes;
                }
                _ => {}
            }
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE phase = 'focus' AND ended_at >= ?1",
        )?;
        let row = stmt.query_row(params![format!("{today}T00:00:00+00:00")], |row| {
            Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?))
        })?;
        stats.today_sessions = row.0;
        stats.today_focus_min = row.1;

        Ok(stats)
    }

    pub fn stats_today(&self) -> Result<Stats, StorageError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut stats = Stats::default();
        let mut stmt = self.conn.prepare(
            "SELECT phase, COUNT(*), COALESCE(SUM(duration_min), 0), COALESCE(AVG(attention_score), 0)
             FROM sessions
             WHERE ended_at >= ?1
             GROUP BY phase",
        )?;
        let rows = stmt.query_map(params![format!("{today}T00:00:00+00:00")], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        for row in rows {
            let (phase, count, minutes, avg_score) = row.map_err(StorageError::from)?;
            stats.total_sessions += count;
            match phase.as_str() {
                "focus" => {
                    stats.completed_focus_sessions += count;
                    stats.total_focus_min += minutes;
                    stats.avg_attention_score = avg_score;
                    stats.today_sessions += count;
                    stats.today_focus_min += minutes;
                }
                "break" => {
                    stats.total_break_min += minutes;
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Most recent completed sessions, newest first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, phase, duration_min, started_at, ended_at, attention_score
             FROM sessions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                phase: row.get(1)?,
                duration_min: row.get(2)?,
                started_at: row.get(3)?,
                ended_at: row.get(4)?,
                attention_score: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }
}

/// A stored completed-session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub phase: String,
    pub duration_min: u64,
    pub started_at: String,
    pub ended_at: String,
    pub attention_score: u8,
}

impl SnapshotStore for Database {
    fn load_snapshot(&self) -> Result<Option<PersistedSnapshot>, StorageError> {
        let state_json = match self.kv_get(KEY_STATE)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let settings_json = match self.kv_get(KEY_SETTINGS)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let state = match serde_json::from_str(&state_json) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("discarding corrupt session state: {e}");
                return Ok(None);
            }
        };
        let settings = match serde_json::from_str(&settings_json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("discarding corrupt session settings: {e}");
                return Ok(None);
            }
        };
        let saved_at_epoch_ms = self.kv_get(KEY_SAVED_AT)?.and_then(|v| v.parse().ok());
        let manual_pause = self
            .kv_get(KEY_MANUAL_PAUSE)?
            .map(|v| v == "true")
            .unwrap_or(false);
        let hidden_at_epoch_ms = self.kv_get(KEY_HIDDEN_AT)?.and_then(|v| v.parse().ok());
        Ok(Some(PersistedSnapshot {
            state,
            settings,
            saved_at_epoch_ms,
            manual_pause,
            hidden_at_epoch_ms,
        }))
    }

    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> Result<(), StorageError> {
        let state_json = serde_json::to_string(&snapshot.state)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        let settings_json = serde_json::to_string(&snapshot.settings)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.kv_set(KEY_STATE, &state_json)?;
        self.kv_set(KEY_SETTINGS, &settings_json)?;
        match snapshot.saved_at_epoch_ms {
            Some(ms) => self.kv_set(KEY_SAVED_AT, &ms.to_string())?,
            None => self.kv_delete(KEY_SAVED_AT)?,
        }
        self.kv_set(
            KEY_MANUAL_PAUSE,
            if snapshot.manual_pause { "true" } else { "false" },
        )?;
        match snapshot.hidden_at_epoch_ms {
            Some(ms) => self.kv_set(KEY_HIDDEN_AT, &ms.to_string())?,
            None => self.kv_delete(KEY_HIDDEN_AT)?,
        }
        Ok(())
    }

    fn clear_snapshot(&self) -> Result<(), StorageError> {
        for key in [
            KEY_STATE,
            KEY_SETTINGS,
            KEY_SAVED_AT,
            KEY_MANUAL_PAUSE,
            KEY_HIDDEN_AT,
        ] {
            self.kv_delete(key)?;
        }
        Ok(())
    }
}

impl TelemetrySink for Database {
    fn record_focus_metric(&self, metric: &FocusMetric) -> Result<(), Box<dyn std::error::Error>> {
        self.conn.execute(
            "INSERT INTO focus_metrics
             (id, session_id, timestamp_ms, attention_score, eye_contact, posture, distraction_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                metric.id.to_string(),
                metric.session_id,
                metric.timestamp_ms as i64,
                metric.attention_score,
                metric.eye_contact_approx,
                format!("{:?}", metric.posture_approx).to_lowercase(),
                metric.distraction_count,
            ],
        )?;
        Ok(())
    }

    fn record_completed_session(
        &self,
        session: &CompletedSession,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let phase = match session.phase {
            Phase::Focus => "focus",
            Phase::Break => "break",
        };
        self.conn.execute(
            "INSERT INTO sessions (phase, duration_min, started_at, ended_at, attention_score)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                phase,
                session.duration_minutes,
                session.started_at.to_rfc3339(),
                session.ended_at.to_rfc3339(),
                session.attention_score,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSettings, SessionState};
    use crate::telemetry::Posture;
    use uuid::Uuid;

    fn sample_snapshot() -> PersistedSnapshot {
        PersistedSnapshot {
            state: SessionState::initial(&SessionSettings::default()),
            settings: SessionSettings::default(),
            saved_at_epoch_ms: Some(1_700_000_000_000),
            manual_pause: false,
            hidden_at_epoch_ms: Some(1_700_000_100_000),
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn snapshot_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_snapshot().unwrap().is_none());

        let snap = sample_snapshot();
        db.save_snapshot(&snap).unwrap();
        assert_eq!(db.load_snapshot().unwrap(), Some(snap.clone()));

        // Not-running form deletes the timestamp key.
        let paused = PersistedSnapshot {
            saved_at_epoch_ms: None,
            hidden_at_epoch_ms: None,
            manual_pause: true,
            ..snap
        };
        db.save_snapshot(&paused).unwrap();
        let loaded = db.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.saved_at_epoch_ms, None);
        assert!(loaded.manual_pause);

        db.clear_snapshot().unwrap();
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_treated_as_absent() {
        let db = Database::open_memory().unwrap();
        db.save_snapshot(&sample_snapshot()).unwrap();
        db.kv_set(KEY_STATE, "{not json").unwrap();
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn record_session_and_query_stats() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_completed_session(&CompletedSession {
            phase: Phase::Focus,
            duration_minutes: 25,
            started_at: now,
            ended_at: now,
            attention_score: 84,
        })
        .unwrap();
        db.record_completed_session(&CompletedSession {
            phase: Phase::Break,
            duration_minutes: 5,
            started_at: now,
            ended_at: now,
            attention_score: 0,
        })
        .unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.completed_focus_sessions, 1);
        assert_eq!(stats.total_focus_min, 25);
        assert_eq!(stats.total_break_min, 5);
        assert!((stats.avg_attention_score - 84.0).abs() < f64::EPSILON);
        assert_eq!(stats.today_sessions, 1);
    }

    #[test]
    fn record_focus_metric_row() {
        let db = Database::open_memory().unwrap();
        db.record_focus_metric(&FocusMetric {
            id: Uuid::new_v4(),
            session_id: Some("s1".into()),
            timestamp_ms: 1_700_000_000_000,
            attention_score: 72,
            eye_contact_approx: true,
            posture_approx: Posture::Fair,
            distraction_count: 1,
        })
        .unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM focus_metrics", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
