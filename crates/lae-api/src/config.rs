use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// When set, provisioned servers are logged to Postgres instead of the
    /// CSV file.
    pub database_url: Option<String>,
    pub listen_addr: SocketAddr,
    pub control_plane_api_key: String,
    pub lae_config_path: PathBuf,
    pub ec2_secret_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            listen_addr: env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".into())
                .parse()
                .expect("LISTEN_ADDR must be a valid socket address"),
            control_plane_api_key: env::var("CONTROL_PLANE_API_KEY")
                .expect("CONTROL_PLANE_API_KEY must be set"),
            lae_config_path: env::var("LAE_CONFIG_PATH")
                .unwrap_or_else(|_| "../lae_automation_config.json".into())
                .into(),
            ec2_secret_path: env::var("EC2_SECRET_PATH")
                .unwrap_or_else(|_| "../ec2secret".into())
                .into(),
        }
    }
}
