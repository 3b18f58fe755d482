use std::collections::BTreeMap;

use aws_api::{Record, RecordSetFilter};
use aws_api::route53::RecordSets;
use chrono::{DateTime, Utc};
use lae_db::models::Server;
use lae_infra::types::ServerSecrets;
use lae_provision::{ReplaceRequest, SignupRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSignupRequest {
    pub activation_key: String,
    pub product_code: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_key_info: Option<String>,
    pub seed: Option<String>,
}

impl From<CreateSignupRequest> for SignupRequest {
    fn from(req: CreateSignupRequest) -> Self {
        Self {
            activation_key: req.activation_key,
            product_code: req.product_code,
            customer_name: req.customer_name,
            customer_email: req.customer_email,
            customer_key_info: req.customer_key_info,
            seed: req.seed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReplacementRequest {
    pub secrets: ServerSecrets,
    pub image_id: String,
    pub instance_size: String,
    pub customer_email: String,
}

impl From<CreateReplacementRequest> for ReplaceRequest {
    fn from(req: CreateReplacementRequest) -> Self {
        Self {
            secrets: req.secrets,
            image_id: req.image_id,
            instance_size: req.instance_size,
            customer_email: req.customer_email,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordSetsQuery {
    pub identifier: Option<String>,
    pub max_items: Option<u32>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
}

impl From<RecordSetsQuery> for RecordSetFilter {
    fn from(q: RecordSetsQuery) -> Self {
        Self {
            identifier: q.identifier,
            max_items: q.max_items,
            name: q.name,
            record_type: q.record_type,
        }
    }
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub instance_id: String,
    pub launch_time: DateTime<Utc>,
    pub public_host: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<Server> for ServerResponse {
    fn from(s: Server) -> Self {
        Self {
            instance_id: s.instance_id,
            launch_time: s.launch_time,
            public_host: s.public_host,
            recorded_at: s.recorded_at,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RecordResponse {
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Ns {
        nameserver: String,
    },
}

impl From<&Record> for RecordResponse {
    fn from(record: &Record) -> Self {
        match record {
            Record::Soa(soa) => Self::Soa {
                mname: soa.mname.to_string(),
                rname: soa.rname.to_string(),
                serial: soa.serial,
                refresh: soa.refresh,
                retry: soa.retry,
                expire: soa.expire,
                minimum: soa.minimum,
            },
            Record::Ns(ns) => Self::Ns {
                nameserver: ns.nameserver.to_string(),
            },
        }
    }
}

/// Record sets keyed by name, records sorted for stable output.
pub fn record_sets_response(sets: &RecordSets) -> BTreeMap<String, Vec<RecordResponse>> {
    sets.iter()
        .map(|(name, records)| {
            let mut out: Vec<RecordResponse> = records.iter().map(RecordResponse::from).collect();
            out.sort();
            (name.to_string(), out)
        })
        .collect()
}
