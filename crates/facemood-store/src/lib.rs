//! facemood-store: Append-only SQLite record of prediction attempts.
//!
//! Every call opens its own connection, does its work and closes it
//! again. There is no pooling and no long-lived transaction.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    matric TEXT,
    email TEXT,
    image_path TEXT,
    emotion TEXT,
    created_at TEXT
)";

/// How long a writer waits on a locked database file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
}

/// A submission about to be written. `id` and `created_at` are assigned
/// by the store.
#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub name: String,
    pub matric: String,
    pub email: String,
    pub image_path: String,
    pub emotion: String,
}

/// A persisted submission row.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: i64,
    pub name: String,
    pub matric: String,
    pub email: String,
    pub image_path: String,
    pub emotion: String,
    /// RFC 3339 UTC timestamp.
    pub created_at: String,
}

/// Handle to the submissions database file.
#[derive(Debug, Clone)]
pub struct SubmissionStore {
    db_path: PathBuf,
}

impl SubmissionStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path).await?;
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await?;
        Ok(conn)
    }

    async fn close(conn: Connection) {
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "failed to close database connection");
        }
    }

    /// Create the `submissions` table if it does not exist. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = self.open().await?;
        conn.call(|conn| {
            conn.execute(SCHEMA, [])?;
            Ok(())
        })
        .await?;
        Self::close(conn).await;

        tracing::info!(path = %self.db_path.display(), "submission schema ready");
        Ok(())
    }

    /// Append one row and return its id. Never rejects on content.
    pub async fn insert(&self, submission: NewSubmission) -> Result<i64, StoreError> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let emotion = submission.emotion.clone();

        let conn = self.open().await?;
        let id = conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO submissions (name, matric, email, image_path, emotion, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        submission.name,
                        submission.matric,
                        submission.email,
                        submission.image_path,
                        submission.emotion,
                        created_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Self::close(conn).await;

        tracing::debug!(id, emotion = %emotion, "submission stored");
        Ok(id)
    }

    /// Most recent submissions, newest first. Administrative use only.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Submission>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.open().await?;
        let rows = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, matric, email, image_path, emotion, created_at
                     FROM submissions ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit], |row| {
                        Ok(Submission {
                            id: row.get(0)?,
                            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                            matric: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                            email: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                            image_path: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                            emotion: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                            created_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Self::close(conn).await;

        Ok(rows)
    }

    /// Total number of stored submissions.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let conn = self.open().await?;
        let n = conn
            .call(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
                Ok(n)
            })
            .await?;
        Self::close(conn).await;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SubmissionStore {
        SubmissionStore::new(dir.path().join("database.db"))
    }

    fn submission(matric: &str, emotion: &str) -> NewSubmission {
        NewSubmission {
            name: "Ada".into(),
            matric: matric.into(),
            email: "ada@example.com".into(),
            image_path: format!("uploads/{matric}.png"),
            emotion: emotion.into(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init_schema().await.unwrap();

        let a = store.insert(submission("A1", "happy")).await.unwrap();
        let b = store.insert(submission("B2", "sad")).await.unwrap();
        assert!(b > a);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init_schema().await.unwrap();
        store.insert(submission("A1", "happy")).await.unwrap();

        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap();

        let rows = store.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].matric, "A1");
        assert_eq!(rows[0].emotion, "happy");
    }

    #[tokio::test]
    async fn test_accepts_duplicate_and_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init_schema().await.unwrap();

        store.insert(NewSubmission::default()).await.unwrap();
        store.insert(NewSubmission::default()).await.unwrap();
        store.insert(submission("A1", "model_not_loaded")).await.unwrap();
        store.insert(submission("A1", "model_not_loaded")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init_schema().await.unwrap();

        for (i, emotion) in ["angry", "fear", "neutral"].iter().enumerate() {
            store.insert(submission(&format!("M{i}"), emotion)).await.unwrap();
        }

        let rows = store.recent(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].emotion, "neutral");
        assert_eq!(rows[1].emotion, "fear");
        assert!(rows[0].created_at.ends_with('Z'), "{}", rows[0].created_at);
        assert!(chrono::DateTime::parse_from_rfc3339(&rows[0].created_at).is_ok());
    }

    #[tokio::test]
    async fn test_init_schema_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = SubmissionStore::new(dir.path().join("nested/data/database.db"));
        store.init_schema().await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_insert_without_schema_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.insert(submission("A1", "happy")).await.is_err());
    }
}
