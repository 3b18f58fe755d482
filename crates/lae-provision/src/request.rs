use chrono::{DateTime, Utc};
use lae_infra::types::{ConnectionDescriptor, InstanceId, ServerSecrets};
use serde::Serialize;

/// Who the server is for.
#[derive(Debug, Clone)]
pub struct Customer {
    pub name: String,
    pub email: String,
    /// Opaque signup key information, echoed back in the confirmation.
    pub key_info: Option<String>,
}

/// Where the run's account credentials come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Fresh signup: exchange the key with billing, then wait for the
    /// subscription to verify.
    Activate { activation_key: String },
    /// Replacement: reuse a previous server's credentials and bucket.
    Stored(ServerSecrets),
}

/// Everything one pipeline run needs, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub product_token: String,
    pub image_id: String,
    pub instance_size: String,
    pub bucket_name: String,
    pub instance_name: String,
    pub location: Option<String>,
    pub customer: Customer,
    pub credentials: CredentialSource,
}

impl DeploymentRequest {
    pub fn is_replacement(&self) -> bool {
        matches!(self.credentials, CredentialSource::Stored(_))
    }

    pub(crate) fn old_secrets(&self) -> Option<&ServerSecrets> {
        match &self.credentials {
            CredentialSource::Stored(secrets) => Some(secrets),
            CredentialSource::Activate { .. } => None,
        }
    }
}

/// A server that made it all the way to serving.
#[derive(Debug, Clone, Serialize)]
pub struct Served {
    pub instance_id: InstanceId,
    pub launch_time: DateTime<Utc>,
    pub public_host: String,
    pub bucket_name: String,
    pub descriptor: ConnectionDescriptor,
}
