use std::sync::Arc;

use lae_infra::DnsService;
use lae_provision::Provisioner;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::runs::RunRegistry;

#[derive(Clone)]
pub struct AppState {
    /// Present only when the server log lives in Postgres.
    pub db: Option<PgPool>,
    pub provisioner: Provisioner,
    pub dns: Arc<dyn DnsService>,
    pub runs: RunRegistry,
    pub config: AppConfig,
}
