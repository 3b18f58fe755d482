mod auth;
mod config;
mod dto;
mod error;
mod routes;
mod runs;
mod state;

use std::sync::Arc;

use lae_provision::{AutomationConfig, PipelineTimings, Provisioner};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::routes::api_router;
use crate::runs::RunRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    // Catalog and operator keys
    let automation =
        AutomationConfig::load(&config.lae_config_path).expect("failed to load automation config");
    let operator = automation
        .operator_settings()
        .expect("failed to read operator key files");
    let ec2_credentials = automation
        .ec2_credentials(&config.ec2_secret_path)
        .expect("failed to read EC2 secret");
    let timings = PipelineTimings::from_env().expect("invalid pipeline timings");

    tracing::info!(
        products = automation.products.len(),
        config = %config.lae_config_path.display(),
        "automation config loaded"
    );

    // Remote services
    let service_config =
        lae_infra::ServiceConfig::from_env(ec2_credentials).expect("invalid service config");
    let (mut services, dns) =
        lae_infra::build_services(&service_config).expect("failed to build services");

    // Server log: Postgres when configured, CSV otherwise
    let db = match &config.database_url {
        Some(url) => {
            let pool = lae_db::create_pool(url)
                .await
                .expect("failed to connect to database");
            lae_db::run_migrations(&pool)
                .await
                .expect("failed to run migrations");
            services = services.with_server_log(Arc::new(lae_db::PgServerLog::new(pool.clone())));
            tracing::info!("server log: postgres");
            Some(pool)
        }
        None => {
            tracing::info!(path = %service_config.serverinfo_path.display(), "server log: csv");
            None
        }
    };

    let provisioner = Provisioner::new(Arc::new(automation), Arc::new(operator), services, timings);

    let state = AppState {
        db,
        provisioner,
        dns,
        runs: RunRegistry::default(),
        config: config.clone(),
    };

    let app = api_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(addr = %config.listen_addr, "starting provisioning API");

    axum::serve(listener, app).await.expect("server error");
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::path::Path;

    use async_trait::async_trait;
    use aws_api::route53::RecordSets;
    use aws_api::{Name, Ns, Record, RecordSetFilter};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lae_infra::types::{
        AccountCredentials, AddressPair, ConnectionDescriptor, InstanceId, InstanceSpec,
        LaunchedInstance, ServerRecord, ServerSecrets,
    };
    use lae_infra::{
        BillingService, ComputeService, DnsService, Installer, Notifier, ServerLog, Services,
        StorageService,
    };
    use lae_provision::{OperatorSettings, ProductDefinition};
    use tower::ServiceExt;

    use super::*;

    const API_KEY: &str = "test-key";

    /// Every remote call fails; the routes under test never reach them.
    struct Offline;

    fn offline() -> lae_infra::Error {
        lae_infra::Error::Protocol {
            host: "offline".into(),
            detail: "no remote calls in tests".into(),
        }
    }

    #[async_trait]
    impl BillingService for Offline {
        async fn activate(&self, _: &str, _: &str) -> lae_infra::Result<AccountCredentials> {
            Err(offline())
        }
        async fn verify_subscription(&self, _: &AccountCredentials, _: &str) -> lae_infra::Result<bool> {
            Err(offline())
        }
    }

    #[async_trait]
    impl StorageService for Offline {
        async fn create_or_adopt_bucket(&self, _: &AccountCredentials, _: &str, _: Option<&str>) -> lae_infra::Result<()> {
            Err(offline())
        }
    }

    #[async_trait]
    impl ComputeService for Offline {
        async fn launch_instance(&self, _: &InstanceSpec) -> lae_infra::Result<LaunchedInstance> {
            Err(offline())
        }
        async fn resolve_addresses(&self, _: &[InstanceId]) -> lae_infra::Result<Option<Vec<AddressPair>>> {
            Err(offline())
        }
    }

    #[async_trait]
    impl Installer for Offline {
        async fn install(&self, _: &str, _: &Path, _: &str, _: &Path) -> lae_infra::Result<()> {
            Err(offline())
        }
        async fn bounce_service(
            &self,
            _: &str,
            _: &Path,
            _: &str,
            _: &AccountCredentials,
            _: &str,
            _: Option<&ServerSecrets>,
        ) -> lae_infra::Result<ConnectionDescriptor> {
            Err(offline())
        }
    }

    #[async_trait]
    impl Notifier for Offline {
        async fn send_confirmation(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &ConnectionDescriptor,
            _: Option<&str>,
        ) -> lae_infra::Result<()> {
            Err(offline())
        }
        async fn send_failure(&self, _: &str, _: &str, _: &str) -> lae_infra::Result<()> {
            Ok(())
        }
        async fn register_monitoring(&self, _: &str, _: &str, _: &Path) -> lae_infra::Result<()> {
            Err(offline())
        }
    }

    #[async_trait]
    impl ServerLog for Offline {
        async fn append(&self, _: &ServerRecord) -> lae_infra::Result<()> {
            Err(offline())
        }
    }

    struct FixedDns;

    #[async_trait]
    impl DnsService for FixedDns {
        async fn lookup_record_sets(&self, zone_id: &str, _: &RecordSetFilter) -> lae_infra::Result<RecordSets> {
            let mut sets = HashMap::new();
            sets.insert(
                Name::new(format!("{zone_id}.example.com.")),
                HashSet::from([Record::Ns(Ns {
                    nameserver: Name::new("ns-1.awsdns-01.org."),
                })]),
            );
            Ok(sets)
        }
    }

    fn test_state() -> AppState {
        let offline = Arc::new(Offline);
        let services = Services {
            billing: offline.clone(),
            storage: offline.clone(),
            compute: offline.clone(),
            installer: offline.clone(),
            notifier: offline.clone(),
            server_log: offline,
        };
        let automation = AutomationConfig {
            products: vec![ProductDefinition {
                product_code: "S4".into(),
                full_name: "Simple Secure Storage Service".into(),
                product_token: "{ProductToken}S4".into(),
                ami_image_id: "ami-deadbeef".into(),
                instance_size: "t1.micro".into(),
            }],
            ec2_access_key_id: "AKIAOPERATOR".into(),
            admin_keypair_name: "admin-keypair".into(),
            admin_privkey_path: "/etc/lae/admin.pem".into(),
            monitor_pubkey_path: "/etc/lae/monitor.pub".into(),
            monitor_privkey_path: "/etc/lae/monitor.pem".into(),
            monitoring_privkey_path: "/etc/lae/zenoss.pem".into(),
            monitoring_host: "198.51.100.5".into(),
        };
        let operator = OperatorSettings {
            admin_keypair_name: "admin-keypair".into(),
            admin_privkey_path: "/etc/lae/admin.pem".into(),
            monitor_pubkey: "ssh-rsa AAAA monitor".into(),
            monitor_privkey_path: "/etc/lae/monitor.pem".into(),
            monitoring_privkey_path: "/etc/lae/zenoss.pem".into(),
            monitoring_host: "198.51.100.5".into(),
        };

        AppState {
            db: None,
            provisioner: Provisioner::new(
                Arc::new(automation),
                Arc::new(operator),
                services,
                PipelineTimings::default(),
            ),
            dns: Arc::new(FixedDns),
            runs: RunRegistry::default(),
            config: AppConfig {
                database_url: None,
                listen_addr: "127.0.0.1:0".parse().unwrap(),
                control_plane_api_key: API_KEY.into(),
                lae_config_path: "lae_automation_config.json".into(),
                ec2_secret_path: "ec2secret".into(),
            },
        }
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut req = Request::get(uri);
        if let Some(key) = key {
            req = req.header("authorization", format!("Bearer {key}"));
        }
        req.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("authorization", format!("Bearer {API_KEY}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let resp = api_router(test_state()).oneshot(get("/servers", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let resp = api_router(test_state())
            .oneshot(get("/servers", Some("nope")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn servers_need_database() {
        let resp = api_router(test_state())
            .oneshot(get("/servers", Some(API_KEY)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let uri = format!("/runs/{}", uuid::Uuid::new_v4());
        let resp = api_router(test_state()).oneshot(get(&uri, Some(API_KEY))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_product_is_rejected_before_spawning() {
        let state = test_state();
        let resp = api_router(state)
            .oneshot(post_json(
                "/signups",
                serde_json::json!({
                    "activation_key": "ACTIVATIONKEY",
                    "product_code": "NOPE",
                    "customer_name": "Ada",
                    "customer_email": "ada@example.com"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(resp).await;
        assert!(body["error"].as_str().unwrap().contains("matches no products"));
    }

    #[tokio::test]
    async fn signup_is_accepted_with_run_id() {
        let state = test_state();
        let runs = state.runs.clone();
        let resp = api_router(state)
            .oneshot(post_json(
                "/signups",
                serde_json::json!({
                    "activation_key": "ACTIVATIONKEY",
                    "product_code": "S4",
                    "customer_name": "Ada",
                    "customer_email": "ada@example.com",
                    "seed": "7f3a"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = json_body(resp).await;
        let run_id: uuid::Uuid = body["run_id"].as_str().unwrap().parse().unwrap();
        let run = runs.get(run_id).await.unwrap();
        assert_eq!(run.customer_email, "ada@example.com");
    }

    #[tokio::test]
    async fn dns_record_sets_as_json() {
        let resp = api_router(test_state())
            .oneshot(get("/dns/zones/Z123/rrsets?type=NS", Some(API_KEY)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(
            body["Z123.example.com."][0],
            serde_json::json!({ "type": "NS", "nameserver": "ns-1.awsdns-01.org." })
        );
    }
}
