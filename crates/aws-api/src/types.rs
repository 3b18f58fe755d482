use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ── Credentials ─────────────────────────────────────────────────────

/// Access key pair, optionally with a security token (DevPay user/product
/// tokens travel in `x-amz-security-token`).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_key: String,
    pub security_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            security_token: None,
        }
    }

    /// Credentials for a DevPay customer account.
    pub fn devpay(
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
        user_token: &str,
        product_token: &str,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            security_token: Some(format!("{user_token},{product_token}")),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ── EC2 ─────────────────────────────────────────────────────────────

/// EC2 wraps every list in `<fooSet><item>..</item></fooSet>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSet<T> {
    #[serde(rename = "item", default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for ItemSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub struct RunInstancesRequest {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInstancesResponse {
    #[serde(default)]
    pub reservation_id: Option<String>,
    #[serde(default)]
    pub instances_set: ItemSet<Instance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeInstancesResponse {
    #[serde(default)]
    pub reservation_set: ItemSet<Reservation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(default)]
    pub instances_set: ItemSet<Instance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: String,
    pub launch_time: DateTime<Utc>,
    #[serde(default)]
    pub instance_state: Option<InstanceState>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
    #[serde(default)]
    pub private_dns_name: Option<String>,
}

impl Instance {
    /// `(public, private)` addresses, once EC2 has assigned both.
    pub fn addresses(&self) -> Option<(String, String)> {
        let public = non_empty(&self.ip_address)?;
        let private = non_empty(&self.private_ip_address)?;
        Some((public.to_string(), private.to_string()))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceState {
    pub code: i32,
    pub name: String,
}

// ── DevPay license service ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateDesktopProductResponse {
    pub activate_desktop_product_result: ActivatedProduct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivatedProduct {
    #[serde(rename = "UserToken")]
    pub user_token: String,
    #[serde(rename = "AWSAccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerifyProductSubscriptionByTokensResponse {
    pub verify_product_subscription_by_tokens_result: SubscriptionStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionStatus {
    pub subscribed: bool,
}

// ── S3 ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOutcome {
    Created,
    /// The bucket already existed and belongs to the caller.
    Adopted,
}

// ── Route53 ─────────────────────────────────────────────────────────

/// Optional filters for `ListResourceRecordSets`.
#[derive(Debug, Clone, Default)]
pub struct RecordSetFilter {
    pub identifier: Option<String>,
    pub max_items: Option<u32>,
    pub name: Option<String>,
    pub record_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResourceRecordSetsResponse {
    #[serde(default)]
    pub resource_record_sets: ResourceRecordSets,
    pub is_truncated: bool,
    #[serde(default)]
    pub next_record_name: Option<String>,
    #[serde(default)]
    pub next_record_type: Option<String>,
    #[serde(default)]
    pub next_record_identifier: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceRecordSets {
    #[serde(rename = "ResourceRecordSet", default)]
    pub items: Vec<ResourceRecordSet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(default)]
    pub resource_records: ResourceRecords,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceRecords {
    #[serde(rename = "ResourceRecord", default)]
    pub items: Vec<ResourceRecordValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecordValue {
    pub value: String,
}

/// A DNS name as Route53 reports it (fully qualified, trailing dot kept).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub String);

impl Name {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Soa {
    pub mname: Name,
    pub rname: Name,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ns {
    pub nameserver: Name,
}

/// Typed record values understood by the DNS read path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Record {
    Soa(Soa),
    Ns(Ns),
}
