use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::{self, ProductDefinition};
use crate::{Error, Result};

/// Product catalog plus operator settings, loaded from the automation
/// config JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    pub products: Vec<ProductDefinition>,
    pub ec2_access_key_id: String,
    pub admin_keypair_name: String,
    pub admin_privkey_path: PathBuf,
    pub monitor_pubkey_path: PathBuf,
    pub monitor_privkey_path: PathBuf,
    pub monitoring_privkey_path: PathBuf,
    pub monitoring_host: String,
}

impl AutomationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::parse(&raw).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config(format!("invalid automation config: {e}")))
    }

    pub fn lookup_product(&self, product_code: &str) -> Result<&ProductDefinition> {
        catalog::lookup(&self.products, product_code)
    }

    /// Operator compute credentials: the key id from config, the secret from
    /// its own file.
    pub fn ec2_credentials(&self, secret_path: &Path) -> Result<aws_api::Credentials> {
        let secret = read_trimmed(secret_path)?;
        Ok(aws_api::Credentials::new(&self.ec2_access_key_id, &secret))
    }

    /// Resolve the settings the pipeline needs at run time.
    pub fn operator_settings(&self) -> Result<OperatorSettings> {
        Ok(OperatorSettings {
            admin_keypair_name: self.admin_keypair_name.clone(),
            admin_privkey_path: self.admin_privkey_path.clone(),
            monitor_pubkey: read_trimmed(&self.monitor_pubkey_path)?,
            monitor_privkey_path: self.monitor_privkey_path.clone(),
            monitoring_privkey_path: self.monitoring_privkey_path.clone(),
            monitoring_host: self.monitoring_host.clone(),
        })
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))
}

/// Keys and hosts used while setting up an instance.
#[derive(Debug, Clone)]
pub struct OperatorSettings {
    pub admin_keypair_name: String,
    pub admin_privkey_path: PathBuf,
    pub monitor_pubkey: String,
    pub monitor_privkey_path: PathBuf,
    pub monitoring_privkey_path: PathBuf,
    pub monitoring_host: String,
}

/// Poll intervals, budgets and retry bounds. Budgets are whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTimings {
    pub poll_interval_secs: u64,
    /// Card verification can take 15 minutes; allow 20.
    pub verification_budget_secs: u64,
    pub address_delay_secs: u64,
    pub address_budget_secs: u64,
    pub listen_retries: u32,
    pub listen_poll_secs: u64,
}

impl Default for PipelineTimings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            verification_budget_secs: 20 * 60,
            address_delay_secs: 20,
            address_budget_secs: 5 * 60,
            listen_retries: 5,
            listen_poll_secs: 15,
        }
    }
}

impl PipelineTimings {
    /// Defaults, overridden by `LAE_POLL_INTERVAL_SECS`,
    /// `LAE_VERIFICATION_BUDGET_SECS`, `LAE_ADDRESS_DELAY_SECS`,
    /// `LAE_ADDRESS_BUDGET_SECS`, `LAE_LISTEN_RETRIES` and
    /// `LAE_LISTEN_POLL_SECS`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let d = Self::default();
        let timings = Self {
            poll_interval_secs: env_or("LAE_POLL_INTERVAL_SECS", d.poll_interval_secs)?,
            verification_budget_secs: env_or("LAE_VERIFICATION_BUDGET_SECS", d.verification_budget_secs)?,
            address_delay_secs: env_or("LAE_ADDRESS_DELAY_SECS", d.address_delay_secs)?,
            address_budget_secs: env_or("LAE_ADDRESS_BUDGET_SECS", d.address_budget_secs)?,
            listen_retries: env_or("LAE_LISTEN_RETRIES", d.listen_retries)?,
            listen_poll_secs: env_or("LAE_LISTEN_POLL_SECS", d.listen_poll_secs)?,
        };
        timings.validate()?;
        Ok(timings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll interval must be at least one second".into()));
        }
        if self.listen_retries == 0 {
            return Err(Error::Config("listen retries must be at least one".into()));
        }
        Ok(())
    }

    pub fn address_delay(&self) -> Duration {
        Duration::from_secs(self.address_delay_secs)
    }

    pub fn listen_poll(&self) -> Duration {
        Duration::from_secs(self.listen_poll_secs)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
