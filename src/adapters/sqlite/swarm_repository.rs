//! SQLite implementation of the SwarmRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{HiveError, HiveResult};
use crate::domain::models::{QueenType, Swarm, SwarmConfig, SwarmStatus};
use crate::domain::ports::SwarmRepository;

#[derive(Clone)]
pub struct SqliteSwarmRepository {
    pool: SqlitePool,
}

impl SqliteSwarmRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SwarmRepository for SqliteSwarmRepository {
    async fn create(&self, swarm: &Swarm) -> HiveResult<()> {
        let config_json = serde_json::to_string(&swarm.config)?;
        sqlx::query(
            "INSERT INTO swarms (id, name, objective, queen_type, status, config, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(swarm.id.to_string())
        .bind(&swarm.name)
        .bind(&swarm.objective)
        .bind(swarm.queen_type.as_str())
        .bind(swarm.status.as_str())
        .bind(config_json)
        .bind(swarm.created_at.to_rfc3339())
        .bind(swarm.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> HiveResult<Option<Swarm>> {
        let row: Option<SwarmRow> = sqlx::query_as("SELECT * FROM swarms WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, swarm: &Swarm) -> HiveResult<()> {
        let config_json = serde_json::to_string(&swarm.config)?;
        let result = sqlx::query(
            "UPDATE swarms SET name = ?, objective = ?, queen_type = ?, status = ?,
             config = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&swarm.name)
        .bind(&swarm.objective)
        .bind(swarm.queen_type.as_str())
        .bind(swarm.status.as_str())
        .bind(config_json)
        .bind(swarm.updated_at.to_rfc3339())
        .bind(swarm.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HiveError::SwarmNotFound(swarm.id.to_string()));
        }
        Ok(())
    }

    async fn list(&self, status: Option<SwarmStatus>) -> HiveResult<Vec<Swarm>> {
        let rows: Vec<SwarmRow> = match status {
            Some(status) => {
                sqlx::query_as("SELECT * FROM swarms WHERE status = ? ORDER BY created_at DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM swarms ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SwarmRow {
    id: String,
    name: String,
    objective: String,
    queen_type: String,
    status: String,
    config: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SwarmRow> for Swarm {
    type Error = HiveError;

    fn try_from(row: SwarmRow) -> Result<Self, Self::Error> {
        let config: SwarmConfig = serde_json::from_str(&row.config)?;
        Ok(Swarm {
            id: parse_uuid(&row.id)?,
            name: row.name,
            objective: row.objective,
            queen_type: QueenType::from_str(&row.queen_type)
                .ok_or_else(|| HiveError::Storage(format!("bad queen_type: {}", row.queen_type)))?,
            status: SwarmStatus::from_str(&row.status)
                .ok_or_else(|| HiveError::Storage(format!("bad swarm status: {}", row.status)))?,
            config,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

pub(crate) fn parse_uuid(raw: &str) -> HiveResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| HiveError::Storage(format!("bad uuid {raw}: {e}")))
}

pub(crate) fn parse_ts(raw: &str) -> HiveResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HiveError::Storage(format!("bad timestamp {raw}: {e}")))
}
