use std::sync::Arc;

use lae_infra::Services;
use lae_infra::types::ServerSecrets;
use rand::Rng;
use tracing::info;

use crate::config::{AutomationConfig, OperatorSettings, PipelineTimings};
use crate::pipeline::Pipeline;
use crate::request::{CredentialSource, Customer, DeploymentRequest, Served};
use crate::Result;

/// Customer name used on replacement runs, which carry no signup identity.
pub const REPLACEMENT_CUSTOMER_NAME: &str = "someone";

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub activation_key: String,
    pub product_code: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_key_info: Option<String>,
    /// Bucket-name suffix; a random one is generated when absent.
    pub seed: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub secrets: ServerSecrets,
    pub image_id: String,
    pub instance_size: String,
    pub customer_email: String,
}

/// `lae-<lowercased product code>-<seed>`.
pub fn bucket_name(product_code: &str, seed: &str) -> String {
    format!("lae-{}-{seed}", product_code.to_lowercase())
}

/// Eight random hex digits.
pub fn random_seed() -> String {
    let n: u32 = rand::rng().random();
    format!("{n:08x}")
}

/// The two ways into the pipeline.
#[derive(Clone)]
pub struct Provisioner {
    config: Arc<AutomationConfig>,
    pipeline: Pipeline,
}

impl Provisioner {
    pub fn new(
        config: Arc<AutomationConfig>,
        operator: Arc<OperatorSettings>,
        services: Services,
        timings: PipelineTimings,
    ) -> Self {
        Self {
            config,
            pipeline: Pipeline::new(services, operator, timings),
        }
    }

    /// Build the run for a fresh signup. Fails with a configuration error,
    /// before anything remote happens, when the product code does not match
    /// exactly one product.
    pub fn signup_request(&self, req: SignupRequest) -> Result<DeploymentRequest> {
        let product = self.config.lookup_product(&req.product_code)?;
        let seed = req.seed.unwrap_or_else(random_seed);

        info!(product = %product.full_name, customer = %req.customer_email, "signing up customer");

        Ok(DeploymentRequest {
            product_token: product.product_token.clone(),
            image_id: product.ami_image_id.clone(),
            instance_size: product.instance_size.clone(),
            bucket_name: bucket_name(&req.product_code, &seed),
            // Need not be unique.
            instance_name: req.customer_email.clone(),
            location: None,
            customer: Customer {
                name: req.customer_name,
                email: req.customer_email,
                key_info: req.customer_key_info,
            },
            credentials: CredentialSource::Activate {
                activation_key: req.activation_key,
            },
        })
    }

    /// Build the run that replaces a server from its stored secrets.
    pub fn replace_request(&self, req: ReplaceRequest) -> DeploymentRequest {
        info!(bucket = %req.secrets.bucket_name, customer = %req.customer_email, "replacing server");

        DeploymentRequest {
            product_token: req.secrets.product_token.clone(),
            image_id: req.image_id,
            instance_size: req.instance_size,
            bucket_name: req.secrets.bucket_name.clone(),
            instance_name: req.customer_email.clone(),
            location: None,
            customer: Customer {
                name: REPLACEMENT_CUSTOMER_NAME.into(),
                email: req.customer_email,
                key_info: None,
            },
            credentials: CredentialSource::Stored(req.secrets),
        }
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<Served> {
        let request = self.signup_request(req)?;
        self.pipeline.run(&request).await
    }

    pub async fn replace_server(&self, req: ReplaceRequest) -> Result<Served> {
        let request = self.replace_request(req);
        self.pipeline.run(&request).await
    }

    pub async fn run(&self, request: &DeploymentRequest) -> Result<Served> {
        self.pipeline.run(request).await
    }
}
