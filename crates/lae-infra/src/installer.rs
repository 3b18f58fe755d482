use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::ssh::{self, SshTarget, shell_quote};
use crate::tahoe::{
    self, INTRODUCER_DIR, IntroducerConfig, NODE_USER, NodeFile, SERVER_DIR, StorageServerConfig,
};
use crate::types::{AccountCredentials, ConnectionDescriptor, ServerSecrets};
use crate::{Error, Installer, Result};

const ADMIN_USER: &str = "ubuntu";
const MONITOR_USER: &str = "monitor";

/// Seconds to wait for the introducer to publish its furl.
const FURL_WAIT_SECS: u32 = 30;

/// Installs and runs the storage server over ssh with the admin key.
#[derive(Debug, Clone)]
pub struct SshInstaller {
    ssh_program: PathBuf,
}

impl Default for SshInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SshInstaller {
    pub fn new() -> Self {
        Self {
            ssh_program: PathBuf::from("ssh"),
        }
    }

    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    fn target(&self, host: &str, user: &str, key_path: &Path) -> SshTarget {
        SshTarget::new(host, user, key_path).with_program(&self.ssh_program)
    }

    async fn as_node_user(admin: &SshTarget, command: &str) -> Result<String> {
        admin
            .exec_checked(&format!("sudo -u {NODE_USER} -H sh -c {}", shell_quote(command)))
            .await
    }

    async fn write_node_file(admin: &SshTarget, file: &NodeFile) -> Result<()> {
        admin.write_file_privileged(&file.path, &file.contents).await?;
        admin
            .exec_checked(&format!("sudo chown {NODE_USER}: {}", shell_quote(&file.path)))
            .await?;
        Ok(())
    }

    async fn restart(admin: &SshTarget, node_dir: &str) -> Result<()> {
        Self::as_node_user(admin, &format!("tahoe restart {node_dir}"))
            .await
            .map(|_| ())
    }

    async fn read_introducer_furl(admin: &SshTarget) -> Result<String> {
        let furl_path = format!("{INTRODUCER_DIR}/private/introducer.furl");
        let out = admin
            .exec_checked(&format!(
                "for i in $(seq 1 {FURL_WAIT_SECS}); do sudo test -s {furl_path} && break; sleep 1; done; sudo cat {furl_path}"
            ))
            .await?;

        let furl = out.trim();
        if !furl.starts_with("pb://") {
            return Err(Error::Protocol {
                host: admin.host().to_string(),
                detail: format!("introducer furl looks wrong: {furl:?}"),
            });
        }
        Ok(furl.to_string())
    }
}

#[async_trait]
impl Installer for SshInstaller {
    async fn install(
        &self,
        public_host: &str,
        admin_key_path: &Path,
        monitor_pubkey: &str,
        monitor_key_path: &Path,
    ) -> Result<()> {
        ssh::probe(public_host).await?;

        let admin = self.target(public_host, ADMIN_USER, admin_key_path);

        info!(host = public_host, "installing storage server packages");
        admin
            .exec_checked("sudo apt-get -y update && sudo apt-get -y install tahoe-lafs")
            .await?;

        for user in [NODE_USER, MONITOR_USER] {
            admin
                .exec_checked(&format!(
                    "id -u {user} >/dev/null 2>&1 || sudo adduser --disabled-password --gecos '' {user}"
                ))
                .await?;
        }

        info!(host = public_host, "authorizing monitoring key");
        let keys = format!("/home/{MONITOR_USER}/.ssh/authorized_keys");
        admin
            .exec_checked(&format!("sudo mkdir -p /home/{MONITOR_USER}/.ssh"))
            .await?;
        admin
            .exec_checked(&format!(
                "echo {} | sudo tee {keys} >/dev/null && sudo chown -R {MONITOR_USER}: /home/{MONITOR_USER}/.ssh && sudo chmod 600 {keys}",
                shell_quote(monitor_pubkey.trim())
            ))
            .await?;

        // The monitoring key must actually open a session.
        self.target(public_host, MONITOR_USER, monitor_key_path)
            .exec_checked("true")
            .await?;

        for node_dir in [INTRODUCER_DIR, SERVER_DIR] {
            let kind = if node_dir == INTRODUCER_DIR {
                "create-introducer"
            } else {
                "create-node"
            };
            Self::as_node_user(
                &admin,
                &format!("test -d {node_dir} || tahoe {kind} {node_dir}"),
            )
            .await?;
        }

        info!(host = public_host, "storage server installed");
        Ok(())
    }

    async fn bounce_service(
        &self,
        public_host: &str,
        admin_key_path: &Path,
        private_host: &str,
        credentials: &AccountCredentials,
        bucket_name: &str,
        old_secrets: Option<&ServerSecrets>,
    ) -> Result<ConnectionDescriptor> {
        let admin = self.target(public_host, ADMIN_USER, admin_key_path);

        // Introducer first: the storage server needs its furl.
        let mut introducer_files = vec![NodeFile {
            path: format!("{INTRODUCER_DIR}/tahoe.cfg"),
            contents: tahoe::render_introducer_config(&IntroducerConfig {
                public_host,
                private_host,
            }),
        }];
        if let Some(pem) = old_secrets.and_then(|s| s.introducer_node_pem.as_deref()) {
            info!(host = public_host, "restoring introducer identity");
            introducer_files.push(NodeFile {
                path: format!("{INTRODUCER_DIR}/private/node.pem"),
                contents: pem.to_string(),
            });
        }
        for file in &introducer_files {
            Self::write_node_file(&admin, file).await?;
        }
        Self::restart(&admin, INTRODUCER_DIR).await?;
        let furl = Self::read_introducer_furl(&admin).await?;

        let mut server_files = vec![NodeFile {
            path: format!("{SERVER_DIR}/tahoe.cfg"),
            contents: tahoe::render_storage_config(&StorageServerConfig {
                public_host,
                private_host,
                introducer_furl: &furl,
                bucket_name,
                access_key_id: &credentials.access_key_id,
            }),
        }];
        server_files.extend(tahoe::storage_secret_files(credentials));
        if let Some(pem) = old_secrets.and_then(|s| s.server_node_pem.as_deref()) {
            info!(host = public_host, "restoring storage server identity");
            server_files.push(NodeFile {
                path: format!("{SERVER_DIR}/private/node.pem"),
                contents: pem.to_string(),
            });
        }
        for file in &server_files {
            Self::write_node_file(&admin, file).await?;
        }
        admin
            .exec_checked(&format!("sudo chmod -R go-rwx {SERVER_DIR}/private"))
            .await?;
        Self::restart(&admin, SERVER_DIR).await?;

        info!(host = public_host, bucket = bucket_name, "storage server started");
        Ok(ConnectionDescriptor(furl))
    }
}
