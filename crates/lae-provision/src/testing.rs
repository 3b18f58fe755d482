//! In-memory collaborators that record every call into a shared journal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lae_infra::types::{
    AccountCredentials, AddressPair, ConnectionDescriptor, InstanceId, InstanceSpec,
    LaunchedInstance, ServerRecord, ServerSecrets,
};
use lae_infra::{
    BillingService, ComputeService, Error, Installer, Notifier, Result, ServerLog, Services,
    StorageService,
};

use crate::config::OperatorSettings;

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, event: impl Into<String>) -> usize {
        let mut events = self.0.lock().unwrap();
        events.push(event.into());
        events.len()
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events whose first word is `kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.split(' ').next() == Some(kind))
            .count()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.events().iter().any(|e| e.starts_with(prefix))
    }
}

/// Knobs for the fake collaborators. `Fakes::new()` is the happy path.
#[derive(Debug, Clone)]
pub struct Fakes {
    pub journal: Journal,
    /// Poll on which the subscription verifies; `None` never verifies.
    pub verified_on_poll: Option<usize>,
    pub unassigned_polls: usize,
    pub address_pairs: usize,
    pub not_listening: usize,
    pub install_fails: bool,
    pub server_log_fails: bool,
    pub failure_mail_fails: bool,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            verified_on_poll: Some(1),
            unassigned_polls: 0,
            address_pairs: 1,
            not_listening: 0,
            install_fails: false,
            server_log_fails: false,
            failure_mail_fails: false,
        }
    }

    pub fn services(&self) -> Services {
        let fake = Arc::new(Fake {
            knobs: self.clone(),
            verify_polls: Mutex::new(0),
            resolve_polls: Mutex::new(0),
            install_attempts: Mutex::new(0),
        });
        Services {
            billing: fake.clone(),
            storage: fake.clone(),
            compute: fake.clone(),
            installer: fake.clone(),
            notifier: fake.clone(),
            server_log: fake,
        }
    }
}

pub fn operator() -> OperatorSettings {
    OperatorSettings {
        admin_keypair_name: "admin-keypair".into(),
        admin_privkey_path: PathBuf::from("/etc/lae/admin.pem"),
        monitor_pubkey: "ssh-rsa AAAA monitor".into(),
        monitor_privkey_path: PathBuf::from("/etc/lae/monitor.pem"),
        monitoring_privkey_path: PathBuf::from("/etc/lae/zenoss.pem"),
        monitoring_host: "198.51.100.5".into(),
    }
}

struct Fake {
    knobs: Fakes,
    verify_polls: Mutex<usize>,
    resolve_polls: Mutex<usize>,
    install_attempts: Mutex<usize>,
}

fn bump(counter: &Mutex<usize>) -> usize {
    let mut n = counter.lock().unwrap();
    *n += 1;
    *n
}

#[async_trait]
impl BillingService for Fake {
    async fn activate(&self, activation_key: &str, product_token: &str) -> Result<AccountCredentials> {
        self.knobs.journal.push(format!("activate {activation_key}"));
        Ok(AccountCredentials {
            access_key_id: "AKIAUSER".into(),
            secret_key: "secret".into(),
            user_token: "{UserToken}u".into(),
            product_token: product_token.into(),
        })
    }

    async fn verify_subscription(&self, _: &AccountCredentials, _: &str) -> Result<bool> {
        self.knobs.journal.push("verify");
        let poll = bump(&self.verify_polls);
        Ok(self.knobs.verified_on_poll.is_some_and(|n| poll >= n))
    }
}

#[async_trait]
impl StorageService for Fake {
    async fn create_or_adopt_bucket(&self, _: &AccountCredentials, bucket_name: &str, _: Option<&str>) -> Result<()> {
        self.knobs.journal.push(format!("bucket {bucket_name}"));
        Ok(())
    }
}

#[async_trait]
impl ComputeService for Fake {
    async fn launch_instance(&self, spec: &InstanceSpec) -> Result<LaunchedInstance> {
        self.knobs
            .journal
            .push(format!("launch {} {} {}", spec.image_id, spec.bucket_name, spec.instance_name));
        Ok(LaunchedInstance {
            id: InstanceId("i-0abc".into()),
            launch_time: Utc.with_ymd_and_hms(2011, 3, 7, 18, 4, 29).unwrap(),
        })
    }

    async fn resolve_addresses(&self, ids: &[InstanceId]) -> Result<Option<Vec<AddressPair>>> {
        self.knobs.journal.push(format!("resolve {}", ids[0]));
        if bump(&self.resolve_polls) <= self.knobs.unassigned_polls {
            return Ok(None);
        }
        let pairs = (0..self.knobs.address_pairs)
            .map(|i| AddressPair {
                public_host: format!("203.0.113.{}", 12 + i),
                private_host: format!("10.0.0.{}", 12 + i),
            })
            .collect();
        Ok(Some(pairs))
    }
}

#[async_trait]
impl Installer for Fake {
    async fn install(&self, public_host: &str, _: &Path, _: &str, _: &Path) -> Result<()> {
        self.knobs.journal.push(format!("install {public_host}"));
        if self.knobs.install_fails {
            return Err(Error::Remote {
                host: public_host.into(),
                command: "apt-get install".into(),
                exit_code: 100,
                stderr: "E: broken packages".into(),
            });
        }
        if bump(&self.install_attempts) <= self.knobs.not_listening {
            return Err(Error::NotListening {
                host: public_host.into(),
            });
        }
        Ok(())
    }

    async fn bounce_service(
        &self,
        _: &str,
        _: &Path,
        _: &str,
        _: &AccountCredentials,
        bucket_name: &str,
        old_secrets: Option<&ServerSecrets>,
    ) -> Result<ConnectionDescriptor> {
        let old = if old_secrets.is_some() { "old-secrets" } else { "fresh" };
        self.knobs.journal.push(format!("bounce {bucket_name} {old}"));
        Ok(ConnectionDescriptor("furl://abc".into()))
    }
}

#[async_trait]
impl Notifier for Fake {
    async fn send_confirmation(
        &self,
        _: &str,
        _: &str,
        customer_email: &str,
        descriptor: &ConnectionDescriptor,
        _: Option<&str>,
    ) -> Result<()> {
        self.knobs
            .journal
            .push(format!("confirm {customer_email} {descriptor}"));
        Ok(())
    }

    async fn send_failure(&self, cause: &str, customer_name: &str, customer_email: &str) -> Result<()> {
        self.knobs
            .journal
            .push(format!("failure {customer_name} {customer_email}: {cause}"));
        if self.knobs.failure_mail_fails {
            return Err(Error::Mail("relay unavailable".into()));
        }
        Ok(())
    }

    async fn register_monitoring(&self, public_host: &str, monitoring_host: &str, _: &Path) -> Result<()> {
        self.knobs
            .journal
            .push(format!("monitor {public_host} {monitoring_host}"));
        Ok(())
    }
}

#[async_trait]
impl ServerLog for Fake {
    async fn append(&self, record: &ServerRecord) -> Result<()> {
        if self.knobs.server_log_fails {
            return Err(Error::ServerLog("disk full".into()));
        }
        self.knobs
            .journal
            .push(format!("record {} {}", record.instance_id, record.public_host));
        Ok(())
    }
}
