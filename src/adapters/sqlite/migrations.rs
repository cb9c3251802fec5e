//! Embedded schema migrations.
//!
//! Each database carries an append-only migration list; the highest applied
//! version lives in the `migrations` table and anything newer is applied in
//! order inside one transaction per migration set.

use sqlx::{Connection, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Store: migration {version} failed: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Store: failed to read schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every migration above the recorded version. Returns how many ran.
    pub async fn run(&self, migrations: &[Migration]) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current = self.current_version().await?;
        let pending: Vec<&Migration> =
            migrations.iter().filter(|m| m.version > current).collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(MigrationError::VersionCheckError)?;
        let mut tx = conn
            .begin()
            .await
            .map_err(MigrationError::VersionCheckError)?;

        for migration in &pending {
            sqlx::raw_sql(migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| MigrationError::ExecutionError {
                    version: migration.version,
                    source,
                })?;

            sqlx::query("INSERT INTO migrations (version, description) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.description)
                .execute(&mut *tx)
                .await
                .map_err(|source| MigrationError::ExecutionError {
                    version: migration.version,
                    source,
                })?;
        }

        tx.commit()
            .await
            .map_err(|source| MigrationError::ExecutionError {
                version: pending.last().map_or(0, |m| m.version),
                source,
            })?;

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| MigrationError::ExecutionError { version: 0, source })?;
        Ok(())
    }

    pub async fn current_version(&self) -> Result<i64, MigrationError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM migrations")
                .fetch_optional(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(row.map_or(0, |(v,)| v))
    }
}

/// Migrations for the hive database (`.hive-mind/hive.db`).
pub fn hive_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Hive schema: swarms, agents, tasks, consensus, collective memory",
        sql: include_str!("../../../migrations/hive/001_hive_schema.sql"),
    }]
}

/// Migrations for the swarm database (`.swarm/memory.db`).
pub fn swarm_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Swarm schema: memory store and metadata",
        sql: include_str!("../../../migrations/swarm/001_swarm_schema.sql"),
    }]
}
