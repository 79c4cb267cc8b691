use crate::app_dirs::AppDirs;
use crate::error::{StoreError, SubmitError};
use crate::identity::Identity;
use crate::level::{Level, TestDuration};
use crate::result::TestResult;
use crate::sink::{ResultSink, SubmissionPayload};
use chrono::{DateTime, Local};
use log::info;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS test_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        wpm INTEGER NOT NULL,
        accuracy INTEGER NOT NULL,
        error_count INTEGER NOT NULL,
        test_level TEXT NOT NULL,
        test_duration INTEGER NOT NULL,
        taken_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_test_results_user ON test_results(user_id, taken_at);
"#;

/// A saved result row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: i64,
    pub user_id: String,
    pub result: TestResult,
    pub taken_at: DateTime<Local>,
}

/// Aggregates shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistorySummary {
    pub tests_taken: i64,
    pub best_wpm: u32,
    pub average_wpm: f64,
    pub average_accuracy: f64,
}

/// Local durable record of results, one row per saved test
#[derive(Debug)]
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteResultStore {
    /// Open the store at the default state location
    pub fn new() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("gemtype_results.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        info!("result store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, or None for an in-memory store
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // a panic mid-statement leaves sqlite consistent, so keep going
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert one result and return its row id
    pub fn insert(
        &self,
        user_id: &str,
        result: &TestResult,
        taken_at: DateTime<Local>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO test_results
            (user_id, wpm, accuracy, error_count, test_level, test_duration, taken_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user_id,
                result.wpm,
                result.accuracy,
                result.mistakes as i64,
                result.level.to_string(),
                result.duration.as_secs() as i64,
                taken_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All results for a user, oldest first
    pub fn history(&self, user_id: &str) -> Result<Vec<StoredResult>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, wpm, accuracy, error_count, test_level, test_duration, taken_at
            FROM test_results
            WHERE user_id = ?1
            ORDER BY taken_at ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map([user_id], |row| {
            let level_str: String = row.get(5)?;
            let level = Level::from_wire(&level_str).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    5,
                    "test_level".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            let duration_secs: i64 = row.get(6)?;
            let duration = TestDuration::try_from(duration_secs as u64).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    6,
                    "test_duration".to_string(),
                    rusqlite::types::Type::Integer,
                )
            })?;
            let taken_at_str: String = row.get(7)?;
            let taken_at = DateTime::parse_from_rfc3339(&taken_at_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        7,
                        "taken_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);
            let mistakes: i64 = row.get(4)?;

            Ok(StoredResult {
                id: row.get(0)?,
                user_id: row.get(1)?,
                result: TestResult {
                    wpm: row.get(2)?,
                    accuracy: row.get(3)?,
                    mistakes: mistakes.max(0) as usize,
                    duration,
                    level,
                },
                taken_at,
            })
        })?;

        let mut history = Vec::new();
        for row in rows {
            history.push(row.map_err(|e| match e {
                rusqlite::Error::InvalidColumnType(_, name, _) => StoreError::Corrupt(name),
                other => StoreError::Sqlite(other),
            })?);
        }
        Ok(history)
    }

    pub fn summary(&self, user_id: &str) -> Result<HistorySummary, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                COUNT(*),
                MAX(wpm),
                AVG(wpm),
                AVG(accuracy)
            FROM test_results
            WHERE user_id = ?1
            "#,
        )?;

        let summary = stmt.query_row([user_id], |row| {
            let best: Option<i64> = row.get(1)?;
            let avg_wpm: Option<f64> = row.get(2)?;
            let avg_acc: Option<f64> = row.get(3)?;
            Ok(HistorySummary {
                tests_taken: row.get(0)?,
                best_wpm: best.unwrap_or(0) as u32,
                average_wpm: avg_wpm.unwrap_or(0.0),
                average_accuracy: avg_acc.unwrap_or(0.0),
            })
        })?;
        Ok(summary)
    }
}

impl ResultSink for SqliteResultStore {
    fn name(&self) -> &str {
        "local"
    }

    fn submit(&self, identity: &Identity, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        let result = payload.to_result().ok_or_else(|| {
            SubmitError::MalformedResponse(format!("unsupported payload {payload:?}"))
        })?;
        let id = self.insert(&identity.user_id, &result, Local::now())?;
        info!("saved result #{id} for {}", identity.user_id);
        Ok(())
    }
}
