use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

// ── Server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Server {
    pub id: Uuid,
    pub instance_id: String,
    pub launch_time: DateTime<Utc>,
    pub public_host: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct NewServer<'a> {
    pub instance_id: &'a str,
    pub launch_time: DateTime<Utc>,
    pub public_host: &'a str,
}

impl Server {
    pub async fn insert(pool: &PgPool, server: &NewServer<'_>) -> sqlx::Result<Self> {
        sqlx::query_as(
            r#"INSERT INTO servers (instance_id, launch_time, public_host)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(server.instance_id)
        .bind(server.launch_time)
        .bind(server.public_host)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_instance_id(pool: &PgPool, instance_id: &str) -> sqlx::Result<Self> {
        sqlx::query_as("SELECT * FROM servers WHERE instance_id = $1")
            .bind(instance_id)
            .fetch_one(pool)
            .await
    }

    /// Most recently launched first.
    pub async fn list(pool: &PgPool) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as("SELECT * FROM servers ORDER BY launch_time DESC")
            .fetch_all(pool)
            .await
    }
}
