use std::path::Path;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::ssh::{SshTarget, shell_quote};
use crate::types::ConnectionDescriptor;
use crate::{Error, Notifier, Result};

const MONITORING_USER: &str = "zenoss";
const BATCH_PATH: &str = "/tmp/lae-monitor.batch";

/// SMTP relay and addressing.
#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub staff_address: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("from_address", &self.from_address)
            .field("staff_address", &self.staff_address)
            .finish_non_exhaustive()
    }
}

impl MailConfig {
    pub fn from_env() -> Result<Self> {
        let required =
            |name: &str| std::env::var(name).map_err(|_| Error::MissingEnv(name.to_string()));

        let smtp_port = match std::env::var("SMTP_PORT") {
            Ok(port) => port
                .parse()
                .map_err(|_| Error::MissingEnv(format!("SMTP_PORT (not a port: {port})")))?,
            Err(_) => 587,
        };

        Ok(Self {
            smtp_host: required("SMTP_HOST")?,
            smtp_port,
            smtp_username: required("SMTP_USERNAME")?,
            smtp_password: required("SMTP_PASSWORD")?,
            from_address: required("MAIL_FROM")?,
            staff_address: required("STAFF_EMAIL")?,
        })
    }
}

// ── Message bodies ───────────────────────────────────────────────────

pub fn confirmation_subject() -> &'static str {
    "Your storage server is ready"
}

pub fn confirmation_body(
    customer_name: &str,
    public_host: &str,
    descriptor: &ConnectionDescriptor,
    key_info: Option<&str>,
) -> String {
    let mut body = format!(
        "Dear {customer_name},\n\
         \n\
         Your storage server at {public_host} is now running.\n\
         \n\
         Add the following introducer furl to your client's tahoe.cfg:\n\
         \n\
         introducer.furl = {descriptor}\n"
    );
    if let Some(key_info) = key_info {
        body.push_str(&format!("\nYour signup key information: {key_info}\n"));
    }
    body.push_str("\nThank you for subscribing.\n");
    body
}

pub fn failure_subject(customer_email: &str) -> String {
    format!("Signup failure for {customer_email}")
}

pub fn failure_body(cause: &str, customer_name: &str, customer_email: &str) -> String {
    format!(
        "A provisioning run failed and needs attention.\n\
         \n\
         Customer name:  {customer_name}\n\
         Customer email: {customer_email}\n\
         \n\
         Cause:\n\
         {cause}\n"
    )
}

/// Batch file for `zenbatchload` registering the host as a monitored device.
pub fn monitoring_batch(public_host: &str) -> String {
    format!("/Devices/Server/SSH/Linux\n{public_host} setManageIp='{public_host}'\n")
}

// ── Notifier ─────────────────────────────────────────────────────────

pub struct MailNotifier {
    config: MailConfig,
}

impl MailNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|e| Error::Mail(format!("invalid from address: {e}")))?;
        let to_box: Mailbox = to
            .parse()
            .map_err(|e| Error::Mail(format!("invalid recipient {to}: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to_box)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| Error::Mail(format!("failed to build message: {e}")))?;

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| Error::Mail(format!("smtp transport: {e}")))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| Error::Mail(format!("smtp send to {to}: {e}")))?;

        info!(to, subject, "mail sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn send_confirmation(
        &self,
        public_host: &str,
        customer_name: &str,
        customer_email: &str,
        descriptor: &ConnectionDescriptor,
        key_info: Option<&str>,
    ) -> Result<()> {
        let body = confirmation_body(customer_name, public_host, descriptor, key_info);
        self.send(customer_email, confirmation_subject(), body).await
    }

    async fn send_failure(&self, cause: &str, customer_name: &str, customer_email: &str) -> Result<()> {
        let staff = self.config.staff_address.clone();
        let body = failure_body(cause, customer_name, customer_email);
        self.send(&staff, &failure_subject(customer_email), body).await
    }

    async fn register_monitoring(
        &self,
        public_host: &str,
        monitoring_host: &str,
        monitoring_key_path: &Path,
    ) -> Result<()> {
        let target = SshTarget::new(monitoring_host, MONITORING_USER, monitoring_key_path);

        target
            .write_file(BATCH_PATH, &monitoring_batch(public_host))
            .await?;
        target
            .exec_checked(&format!("zenbatchload {}", shell_quote(BATCH_PATH)))
            .await?;

        info!(host = public_host, monitoring_host, "registered with monitoring");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_carries_furl_and_key_info() {
        let body = confirmation_body(
            "Ada",
            "203.0.113.12",
            &ConnectionDescriptor("pb://abc@203.0.113.12:12345/introducer".into()),
            Some("ssh-rsa AAAA ada"),
        );

        assert!(body.starts_with("Dear Ada,"));
        assert!(body.contains("introducer.furl = pb://abc@203.0.113.12:12345/introducer\n"));
        assert!(body.contains("ssh-rsa AAAA ada"));
    }

    #[test]
    fn confirmation_without_key_info() {
        let body = confirmation_body(
            "Ada",
            "203.0.113.12",
            &ConnectionDescriptor("furl://abc".into()),
            None,
        );
        assert!(!body.contains("key information"));
    }

    #[test]
    fn failure_names_the_customer() {
        let body = failure_body("verification timed out", "someone", "ada@example.com");
        assert!(body.contains("Customer name:  someone\n"));
        assert!(body.contains("Customer email: ada@example.com\n"));
        assert!(body.ends_with("verification timed out\n"));
        assert_eq!(failure_subject("ada@example.com"), "Signup failure for ada@example.com");
    }

    #[test]
    fn batch_registers_manage_ip() {
        assert_eq!(
            monitoring_batch("203.0.113.12"),
            "/Devices/Server/SSH/Linux\n203.0.113.12 setManageIp='203.0.113.12'\n"
        );
    }
}
