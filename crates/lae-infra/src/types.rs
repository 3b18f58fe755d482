use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Billing-linked account credentials for a customer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub access_key_id: String,
    pub secret_key: String,
    pub user_token: String,
    pub product_token: String,
}

impl AccountCredentials {
    /// Request-signing credentials for the customer's own AWS calls.
    pub fn aws(&self) -> aws_api::Credentials {
        aws_api::Credentials::devpay(
            &self.access_key_id,
            &self.secret_key,
            &self.user_token,
            &self.product_token,
        )
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .field("user_token", &"<redacted>")
            .field("product_token", &self.product_token)
            .finish()
    }
}

/// Secrets of a previously provisioned server, used to replace it.
///
/// The node keys are optional; when present the replacement keeps the old
/// node identity, so the customer's existing connection descriptor keeps
/// working.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerSecrets {
    pub access_key_id: String,
    pub secret_key: String,
    pub user_token: String,
    pub product_token: String,
    pub bucket_name: String,
    #[serde(default)]
    pub introducer_node_pem: Option<String>,
    #[serde(default)]
    pub server_node_pem: Option<String>,
}

impl ServerSecrets {
    pub fn credentials(&self) -> AccountCredentials {
        AccountCredentials {
            access_key_id: self.access_key_id.clone(),
            secret_key: self.secret_key.clone(),
            user_token: self.user_token.clone(),
            product_token: self.product_token.clone(),
        }
    }
}

impl fmt::Debug for ServerSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSecrets")
            .field("access_key_id", &self.access_key_id)
            .field("bucket_name", &self.bucket_name)
            .finish_non_exhaustive()
    }
}

/// Opaque provider-side instance identifier (e.g. `i-1a2b3c4d`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters for launching an instance.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub image_id: String,
    pub instance_size: String,
    pub bucket_name: String,
    pub keypair_name: String,
    pub instance_name: String,
}

/// An instance the compute provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedInstance {
    pub id: InstanceId,
    pub launch_time: DateTime<Utc>,
}

/// Public and private host addresses of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPair {
    pub public_host: String,
    pub private_host: String,
}

/// Opaque access URI handed to the customer (a furl).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor(pub String);

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of the provisioned-servers log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRecord {
    pub launch_time: DateTime<Utc>,
    pub instance_id: InstanceId,
    pub public_host: String,
}
