pub mod aws;
pub mod installer;
pub mod notify;
pub mod serverinfo;
pub mod ssh;
pub mod tahoe;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use aws_api::RecordSetFilter;
use aws_api::route53::RecordSets;
use types::{
    AccountCredentials, AddressPair, ConnectionDescriptor, InstanceId, InstanceSpec,
    LaunchedInstance, ServerRecord, ServerSecrets,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("aws error: {0}")]
    Aws(#[from] aws_api::Error),

    #[error("{host} is not listening for ssh connections yet")]
    NotListening { host: String },

    #[error("command {command:?} on {host} failed (exit {exit_code}): {stderr}")]
    Remote {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mail error: {0}")]
    Mail(String),

    #[error("server log error: {0}")]
    ServerLog(String),

    #[error("unexpected response from {host}: {detail}")]
    Protocol { host: String, detail: String },

    #[error("missing env var: {0}")]
    MissingEnv(String),
}

impl Error {
    /// Whether this is the transient "ssh not accepting connections yet"
    /// condition of a freshly launched instance.
    pub fn is_not_listening(&self) -> bool {
        matches!(self, Self::NotListening { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Remote services ─────────────────────────────────────────────────

/// Subscription billing: account activation and subscription checks.
#[async_trait]
pub trait BillingService: Send + Sync + 'static {
    /// Exchange an activation key for account credentials.
    async fn activate(&self, activation_key: &str, product_token: &str) -> Result<AccountCredentials>;

    /// Whether the account's subscription to the product is active.
    async fn verify_subscription(
        &self,
        credentials: &AccountCredentials,
        product_token: &str,
    ) -> Result<bool>;
}

/// Customer-owned bucket storage.
#[async_trait]
pub trait StorageService: Send + Sync + 'static {
    /// Create the bucket, or adopt it when the account already owns it.
    async fn create_or_adopt_bucket(
        &self,
        credentials: &AccountCredentials,
        bucket_name: &str,
        location: Option<&str>,
    ) -> Result<()>;
}

/// Compute instance lifecycle. Operator credentials are bound at
/// construction.
#[async_trait]
pub trait ComputeService: Send + Sync + 'static {
    async fn launch_instance(&self, spec: &InstanceSpec) -> Result<LaunchedInstance>;

    /// Address pairs of the given instances, or `None` while the provider
    /// has not assigned addresses to all of them yet.
    async fn resolve_addresses(&self, instance_ids: &[InstanceId]) -> Result<Option<Vec<AddressPair>>>;
}

/// Read-only DNS zone queries, used by operational tooling.
#[async_trait]
pub trait DnsService: Send + Sync + 'static {
    async fn lookup_record_sets(&self, zone_id: &str, filter: &RecordSetFilter) -> Result<RecordSets>;
}

// ── Server setup ────────────────────────────────────────────────────

/// Remote installation and service start on a launched instance.
#[async_trait]
pub trait Installer: Send + Sync + 'static {
    /// Install the server software. Fails with [`Error::NotListening`] while
    /// the instance does not accept ssh connections yet.
    async fn install(
        &self,
        public_host: &str,
        admin_key_path: &Path,
        monitor_pubkey: &str,
        monitor_key_path: &Path,
    ) -> Result<()>;

    /// Configure and (re)start the storage server, returning the customer's
    /// connection descriptor.
    async fn bounce_service(
        &self,
        public_host: &str,
        admin_key_path: &Path,
        private_host: &str,
        credentials: &AccountCredentials,
        bucket_name: &str,
        old_secrets: Option<&ServerSecrets>,
    ) -> Result<ConnectionDescriptor>;
}

/// Customer/staff messages and monitoring registration.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send_confirmation(
        &self,
        public_host: &str,
        customer_name: &str,
        customer_email: &str,
        descriptor: &ConnectionDescriptor,
        key_info: Option<&str>,
    ) -> Result<()>;

    async fn send_failure(&self, cause: &str, customer_name: &str, customer_email: &str) -> Result<()>;

    async fn register_monitoring(
        &self,
        public_host: &str,
        monitoring_host: &str,
        monitoring_key_path: &Path,
    ) -> Result<()>;
}

/// Append-only log of provisioned servers.
#[async_trait]
pub trait ServerLog: Send + Sync + 'static {
    async fn append(&self, record: &ServerRecord) -> Result<()>;
}

// ── Wiring ──────────────────────────────────────────────────────────

/// Endpoints and operator settings the concrete services are built from.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub region: String,
    pub ec2_endpoint: String,
    pub s3_endpoint: String,
    pub devpay_endpoint: String,
    pub route53_endpoint: String,
    pub operator_credentials: aws_api::Credentials,
    pub serverinfo_path: PathBuf,
    pub mail: notify::MailConfig,
}

impl ServiceConfig {
    /// Endpoint overrides come from env vars (`EC2_ENDPOINT`, `S3_ENDPOINT`,
    /// `DEVPAY_ENDPOINT`, `ROUTE53_ENDPOINT`, `AWS_REGION`,
    /// `SERVERINFO_PATH`); everything else is supplied by the caller.
    pub fn from_env(operator_credentials: aws_api::Credentials) -> Result<Self> {
        dotenvy::dotenv().ok();

        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.into());

        Ok(Self {
            region: var("AWS_REGION", "us-east-1"),
            ec2_endpoint: var("EC2_ENDPOINT", aws_api::EC2_ENDPOINT),
            s3_endpoint: var("S3_ENDPOINT", aws_api::S3_ENDPOINT),
            devpay_endpoint: var("DEVPAY_ENDPOINT", aws_api::DEVPAY_ENDPOINT),
            route53_endpoint: var("ROUTE53_ENDPOINT", aws_api::ROUTE53_ENDPOINT),
            operator_credentials,
            serverinfo_path: var("SERVERINFO_PATH", "../serverinfo.csv").into(),
            mail: notify::MailConfig::from_env()?,
        })
    }
}

/// The collaborators one provisioning run talks to.
#[derive(Clone)]
pub struct Services {
    pub billing: Arc<dyn BillingService>,
    pub storage: Arc<dyn StorageService>,
    pub compute: Arc<dyn ComputeService>,
    pub installer: Arc<dyn Installer>,
    pub notifier: Arc<dyn Notifier>,
    pub server_log: Arc<dyn ServerLog>,
}

impl Services {
    /// Replace the server log backend.
    pub fn with_server_log(mut self, server_log: Arc<dyn ServerLog>) -> Self {
        self.server_log = server_log;
        self
    }
}

/// Build the production services plus the DNS reader.
pub fn build_services(config: &ServiceConfig) -> Result<(Services, Arc<dyn DnsService>)> {
    let region = config.region.as_str();

    let billing = aws::AwsBilling::new(&config.devpay_endpoint, region)?;
    let storage = aws::AwsStorage::new(&config.s3_endpoint, region)?;
    let compute = aws::AwsCompute::new(
        &config.ec2_endpoint,
        region,
        config.operator_credentials.clone(),
    )?;
    let dns = aws::AwsDns::new(&config.route53_endpoint, config.operator_credentials.clone())?;

    tracing::info!(
        ec2 = %config.ec2_endpoint,
        s3 = %config.s3_endpoint,
        devpay = %config.devpay_endpoint,
        "registered AWS services"
    );

    let services = Services {
        billing: Arc::new(billing),
        storage: Arc::new(storage),
        compute: Arc::new(compute),
        installer: Arc::new(installer::SshInstaller::new()),
        notifier: Arc::new(notify::MailNotifier::new(config.mail.clone())),
        server_log: Arc::new(serverinfo::CsvServerLog::new(&config.serverinfo_path)),
    };

    Ok((services, Arc::new(dns)))
}
