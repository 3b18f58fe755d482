pub mod models;

use async_trait::async_trait;
use lae_infra::types::ServerRecord;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use models::{NewServer, Server};

/// Create a connection pool to PostgreSQL.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Server log backed by the `servers` table. One INSERT per record.
#[derive(Clone)]
pub struct PgServerLog {
    pool: PgPool,
}

impl PgServerLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl lae_infra::ServerLog for PgServerLog {
    async fn append(&self, record: &ServerRecord) -> lae_infra::Result<()> {
        let server = Server::insert(
            &self.pool,
            &NewServer {
                instance_id: &record.instance_id.0,
                launch_time: record.launch_time,
                public_host: &record.public_host,
            },
        )
        .await
        .map_err(|e| lae_infra::Error::ServerLog(format!("insert {}: {e}", record.instance_id)))?;

        tracing::info!(server_id = %server.id, instance_id = %server.instance_id, "server recorded");
        Ok(())
    }
}
