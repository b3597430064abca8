//! Durable calibration record.
//!
//! Only three values survive a session: the calibrated step length, when it
//! was calibrated, and the user's body height. The engine reads them at
//! creation and on every start, and writes them back on calibration,
//! `set_body_height` and `reset_calibration`.
//!
//! Stores:
//! - [`MemoryStore`]: shared in-memory record, for tests and hosts that
//!   persist elsewhere
//! - `SqliteStore` (feature `persistence`): a `settings` key/value table

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepDistError};

/// The persisted calibration record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCalibration {
    /// Meters per step
    pub step_length: Option<f64>,
    /// Epoch seconds of the last successful calibration
    pub last_calibrated: Option<i64>,
    /// Meters
    pub body_height: Option<f64>,
}

/// Storage backend for [`PersistedCalibration`].
pub trait CalibrationStore: Send {
    fn load(&self) -> Result<PersistedCalibration>;

    /// Write step length and calibration time together.
    fn save_step_length(&mut self, step_length: f64, calibrated_at: i64) -> Result<()>;

    fn save_body_height(&mut self, body_height: Option<f64>) -> Result<()>;

    /// Erase the whole record.
    fn clear(&mut self) -> Result<()>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory store. Clones share the same record, so a test can keep one
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryRecord>>,
}

#[derive(Debug, Default)]
struct MemoryRecord {
    record: PersistedCalibration,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: PersistedCalibration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryRecord { record, writes: 0 })),
        }
    }

    /// Number of write operations performed so far.
    pub fn writes(&self) -> usize {
        self.lock().map(|r| r.writes).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryRecord>> {
        self.inner.lock().map_err(|_| StepDistError::Persistence {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&self) -> Result<PersistedCalibration> {
        Ok(self.lock()?.record)
    }

    fn save_step_length(&mut self, step_length: f64, calibrated_at: i64) -> Result<()> {
        let mut inner = self.lock()?;
        inner.record.step_length = Some(step_length);
        inner.record.last_calibrated = Some(calibrated_at);
        inner.writes += 1;
        Ok(())
    }

    fn save_body_height(&mut self, body_height: Option<f64>) -> Result<()> {
        let mut inner = self.lock()?;
        inner.record.body_height = body_height;
        inner.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.record = PersistedCalibration::default();
        inner.writes += 1;
        Ok(())
    }
}

// ============================================================================
// SQLite store
// ============================================================================

#[cfg(feature = "persistence")]
pub use sqlite::SqliteStore;

#[cfg(feature = "persistence")]
mod sqlite {
    use log::info;
    use rusqlite::{params, Connection, Result as SqlResult};

    use super::{CalibrationStore, PersistedCalibration};
    use crate::error::Result;

    const KEY_STEP_LENGTH: &str = "step_length";
    const KEY_LAST_CALIBRATED: &str = "last_calibrated";
    const KEY_BODY_HEIGHT: &str = "body_height";

    /// SQLite-backed store.
    pub struct SqliteStore {
        db: Connection,
        db_path: String,
    }

    impl SqliteStore {
        /// Open (or create) the database at `db_path`.
        pub fn new(db_path: &str) -> SqlResult<Self> {
            let db = Connection::open(db_path)?;
            Self::init_schema(&db)?;
            info!("[StepDist] Calibration store opened at {}", db_path);
            Ok(Self {
                db,
                db_path: db_path.to_string(),
            })
        }

        /// Create an in-memory database (for testing).
        pub fn in_memory() -> SqlResult<Self> {
            Self::new(":memory:")
        }

        pub fn path(&self) -> &str {
            &self.db_path
        }

        fn init_schema(conn: &Connection) -> SqlResult<()> {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value REAL NOT NULL
                );
                "#,
            )
        }

        fn put(conn: &Connection, key: &str, value: f64) -> SqlResult<()> {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                params![key, value],
            )?;
            Ok(())
        }

        fn delete(conn: &Connection, key: &str) -> SqlResult<()> {
            conn.execute("DELETE FROM settings WHERE key = ?", params![key])?;
            Ok(())
        }
    }

    impl CalibrationStore for SqliteStore {
        fn load(&self) -> Result<PersistedCalibration> {
            let mut stmt = self.db.prepare("SELECT key, value FROM settings")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;

            let mut record = PersistedCalibration::default();
            for row in rows {
                let (key, value) = row?;
                match key.as_str() {
                    KEY_STEP_LENGTH => record.step_length = Some(value),
                    KEY_LAST_CALIBRATED => record.last_calibrated = Some(value as i64),
                    KEY_BODY_HEIGHT => record.body_height = Some(value),
                    _ => {}
                }
            }
            Ok(record)
        }

        fn save_step_length(&mut self, step_length: f64, calibrated_at: i64) -> Result<()> {
            let tx = self.db.transaction()?;
            Self::put(&tx, KEY_STEP_LENGTH, step_length)?;
            Self::put(&tx, KEY_LAST_CALIBRATED, calibrated_at as f64)?;
            tx.commit()?;
            Ok(())
        }

        fn save_body_height(&mut self, body_height: Option<f64>) -> Result<()> {
            match body_height {
                Some(meters) => Self::put(&self.db, KEY_BODY_HEIGHT, meters)?,
                None => Self::delete(&self.db, KEY_BODY_HEIGHT)?,
            }
            Ok(())
        }

        fn clear(&mut self) -> Result<()> {
            self.db.execute("DELETE FROM settings", [])?;
            Ok(())
        }
    }
}
