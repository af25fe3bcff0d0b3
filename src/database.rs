use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use thiserror::Error;
use tokio::sync::Mutex;

const MIGRATION_FILES: &[(&str, &[u8])] = &[(
    "0001_events.sql",
    include_bytes!("../db_migrations/0001_events.sql"),
)];

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migrate error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// SQLite-backed event store.
///
/// All writes across all categories are serialized through `write_lock`
/// (single-writer discipline); event volume is bounded by human conversational
/// rates, so the throughput cost is acceptable.
#[derive(Debug)]
pub struct Database {
    pub pool: SqlitePool,
    #[allow(unused)]
    pub path: PathBuf,
    write_lock: Mutex<()>,
}

impl Database {
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("{}", db_path.display());

        tracing::debug!("Checking if DB exists...{:?}", db_url);
        if Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            tracing::debug!("DB exists");
        } else {
            tracing::debug!("DB does not exist, creating...");
            Sqlite::create_database(&db_url).await.map_err(|e| {
                tracing::error!("Error creating DB: {:?}", e);
                DatabaseError::Sqlx(e)
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .max_connections(10)
            .after_connect(|conn, _| {
                Box::pin(async move {
                    let conn = &mut *conn;
                    sqlx::query("PRAGMA journal_mode=WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout=5000")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("{}?mode=rwc", db_url))
            .await?;

        Self::run_migrations(&pool, &db_path).await?;

        Ok(Self {
            pool,
            path: db_path,
            write_lock: Mutex::new(()),
        })
    }

    /// The single-writer lock every insert must hold for its transaction.
    pub(crate) fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }

    /// Applies the embedded migrations by materializing them into a temporary
    /// directory next to the database file.
    async fn run_migrations(pool: &SqlitePool, db_path: &Path) -> Result<(), DatabaseError> {
        tracing::debug!("Running migrations...");

        let data_dir = db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let temp_dir = data_dir.join("temp_migrations");
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir)?;
        }
        fs::create_dir_all(&temp_dir)?;

        for (filename, content) in MIGRATION_FILES {
            tracing::debug!("Writing migration file: {}", filename);
            fs::write(temp_dir.join(filename), content)?;
        }

        let migration_result = match sqlx::migrate::Migrator::new(temp_dir.clone()).await {
            Ok(migrator) => {
                let result = migrator.run(pool).await;
                if result.is_ok() {
                    tracing::debug!("Migrations applied successfully");
                }
                result.map_err(DatabaseError::from)
            }
            Err(e) => {
                tracing::error!("Failed to create migrator: {:?}", e);
                Err(DatabaseError::Migrate(e))
            }
        };

        if let Err(e) = fs::remove_dir_all(&temp_dir) {
            tracing::warn!("Failed to remove temp migrations directory: {:?}", e);
        }

        migration_result
    }

    pub async fn delete_all_data(&self) -> Result<(), DatabaseError> {
        let _writer = self.write_lock.lock().await;
        let mut txn = self.pool.begin().await?;

        for table in [
            "messages",
            "reactions",
            "events",
            "media",
            "contacts",
            "groups",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_new_creates_schema() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '_sqlx%' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();

        assert_eq!(
            tables,
            vec!["contacts", "events", "groups", "media", "messages", "reactions"]
        );
    }

    #[tokio::test]
    async fn test_delete_all_data() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();

        sqlx::query("INSERT INTO messages (message_id, chat_id, text, date) VALUES (1, 2, 'hi', '2026-01-01T00:00:00Z')")
            .execute(&db.pool)
            .await
            .unwrap();

        db.delete_all_data().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
