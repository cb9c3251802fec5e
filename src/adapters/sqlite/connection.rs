//! SQLite store: connection pool, WAL discipline, self-heal, and backup.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Store: failed to open database at {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Store: invalid database path: {0}")]
    InvalidPath(String),
    #[error("Store: failed to create directory: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),
    #[error("Store: backup failed: {0}")]
    BackupFailed(#[source] sqlx::Error),
    #[error("Store: checkpoint failed: {0}")]
    CheckpointFailed(#[source] sqlx::Error),
    #[error("Store: failed to begin transaction: {0}")]
    TransactionFailed(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
    /// Negative values are KiB per SQLite convention; -65536 is 64 MiB.
    pub cache_size_kib: i64,
    /// Memory-mapped region cap in bytes.
    pub mmap_size: u64,
    pub statement_cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(3),
            busy_timeout: Duration::from_secs(30),
            cache_size_kib: -65_536,
            mmap_size: 256 * 1024 * 1024,
            statement_cache_capacity: 100,
        }
    }
}

/// Embedded-SQL store backing all durable entities.
///
/// One `Store` wraps one database file (or `:memory:`). WAL journaling with
/// `synchronous = NORMAL`; `close()` forces a truncating checkpoint so a
/// clean shutdown leaves no sidecar files behind.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Store {
    /// Open the database at `path`, creating it if missing.
    ///
    /// If the first connect fails, the WAL/SHM sidecars left by a previous
    /// crash are removed and the open is retried exactly once. A second
    /// failure surfaces to the caller, who may choose to reinitialize.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ConnectionError> {
        Self::open_with(path, StoreConfig::default()).await
    }

    pub async fn open_with(
        path: impl AsRef<Path>,
        config: StoreConfig,
    ) -> Result<Self, ConnectionError> {
        let path = path.as_ref();
        ensure_parent_directory(path)?;

        match Self::connect(path, &config).await {
            Ok(pool) => Ok(Self {
                pool,
                path: Some(path.to_path_buf()),
            }),
            Err(first_err) => {
                warn!(
                    path = %path.display(),
                    error = %first_err,
                    "open failed, removing stale sidecars and retrying once"
                );
                remove_sidecars(path);
                let pool = Self::connect(path, &config)
                    .await
                    .map_err(|source| ConnectionError::OpenFailed {
                        path: path.display().to_string(),
                        source,
                    })?;
                Ok(Self {
                    pool,
                    path: Some(path.to_path_buf()),
                })
            }
        }
    }

    /// Open a fresh in-memory store for tests.
    pub async fn open_in_memory() -> Result<Self, ConnectionError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|_| ConnectionError::InvalidPath("sqlite::memory:".to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .shared_cache(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| ConnectionError::OpenFailed {
                path: ":memory:".to_string(),
                source,
            })?;

        Ok(Self { pool, path: None })
    }

    async fn connect(path: &Path, config: &StoreConfig) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .statement_cache_capacity(config.statement_cache_capacity)
            .pragma("cache_size", config.cache_size_kib.to_string())
            .pragma("mmap_size", config.mmap_size.to_string());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        // Surface corruption at open time rather than on first query.
        sqlx::query("SELECT 1").fetch_one(&pool).await?;
        Ok(pool)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction; drop rolls back, `commit()` makes the writes
    /// durable as a unit.
    pub async fn begin(
        &self,
    ) -> Result<sqlx::Transaction<'static, sqlx::Sqlite>, ConnectionError> {
        self.pool
            .begin()
            .await
            .map_err(ConnectionError::TransactionFailed)
    }

    /// Copy the database into a single backup file.
    pub async fn backup(&self, target: impl AsRef<Path>) -> Result<(), ConnectionError> {
        let target = target.as_ref();
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(ConnectionError::DirectoryCreationFailed)?;
            }
        }
        sqlx::query(&format!(
            "VACUUM INTO '{}'",
            target.display().to_string().replace('\'', "''")
        ))
        .execute(&self.pool)
        .await
        .map_err(ConnectionError::BackupFailed)?;
        info!(target = %target.display(), "backup written");
        Ok(())
    }

    /// Checkpoint the WAL and close the pool.
    pub async fn close(self) -> Result<(), ConnectionError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(ConnectionError::CheckpointFailed)?;
        self.pool.close().await;
        Ok(())
    }

    /// Path of the backing file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn ensure_parent_directory(path: &Path) -> Result<(), ConnectionError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(ConnectionError::DirectoryCreationFailed)?;
        }
    }
    Ok(())
}

fn remove_sidecars(path: &Path) {
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            if let Err(e) = std::fs::remove_file(&sidecar) {
                warn!(path = %sidecar.display(), error = %e, "failed to remove sidecar");
            }
        }
    }
}
