use async_trait::async_trait;
use aws_api::route53::RecordSets;
use aws_api::{
    BucketOutcome, Credentials, DevPayClient, Ec2Client, Endpoint, RecordSetFilter,
    Route53Client, RunInstancesRequest, S3Client,
};
use tracing::{debug, info};

use crate::types::{AccountCredentials, AddressPair, InstanceId, InstanceSpec, LaunchedInstance};
use crate::{BillingService, ComputeService, DnsService, Result, StorageService};

/// Tag carrying the customer bucket on launched instances.
const BUCKET_TAG: &str = "lae:bucket";

/// DevPay-backed billing.
pub struct AwsBilling {
    client: DevPayClient,
}

impl AwsBilling {
    pub fn new(endpoint: &str, region: &str) -> Result<Self> {
        Ok(Self {
            client: DevPayClient::new(Endpoint::new(endpoint, region)?),
        })
    }
}

#[async_trait]
impl BillingService for AwsBilling {
    async fn activate(&self, activation_key: &str, product_token: &str) -> Result<AccountCredentials> {
        let product = self
            .client
            .activate_desktop_product(activation_key, product_token)
            .await?;

        info!(access_key_id = %product.access_key_id, "devpay: account activated");

        Ok(AccountCredentials {
            access_key_id: product.access_key_id,
            secret_key: product.secret_key,
            user_token: product.user_token,
            product_token: product_token.to_string(),
        })
    }

    async fn verify_subscription(
        &self,
        credentials: &AccountCredentials,
        product_token: &str,
    ) -> Result<bool> {
        let subscribed = self
            .client
            .verify_subscription(
                &Credentials::new(&credentials.access_key_id, &credentials.secret_key),
                &credentials.user_token,
                product_token,
            )
            .await?;

        debug!(access_key_id = %credentials.access_key_id, subscribed, "devpay: subscription checked");
        Ok(subscribed)
    }
}

/// S3-backed customer buckets.
pub struct AwsStorage {
    client: S3Client,
}

impl AwsStorage {
    pub fn new(endpoint: &str, region: &str) -> Result<Self> {
        Ok(Self {
            client: S3Client::new(Endpoint::new(endpoint, region)?),
        })
    }
}

#[async_trait]
impl StorageService for AwsStorage {
    async fn create_or_adopt_bucket(
        &self,
        credentials: &AccountCredentials,
        bucket_name: &str,
        location: Option<&str>,
    ) -> Result<()> {
        let outcome = self
            .client
            .create_bucket(&credentials.aws(), bucket_name, location)
            .await?;

        match outcome {
            BucketOutcome::Created => info!(bucket = bucket_name, "s3: bucket created"),
            BucketOutcome::Adopted => info!(bucket = bucket_name, "s3: adopted existing bucket"),
        }
        Ok(())
    }
}

/// EC2 instances launched under the operator account.
pub struct AwsCompute {
    client: Ec2Client,
}

impl AwsCompute {
    pub fn new(endpoint: &str, region: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            client: Ec2Client::new(Endpoint::new(endpoint, region)?, credentials),
        })
    }
}

#[async_trait]
impl ComputeService for AwsCompute {
    async fn launch_instance(&self, spec: &InstanceSpec) -> Result<LaunchedInstance> {
        let instance = self
            .client
            .run_instance(&RunInstancesRequest {
                image_id: spec.image_id.clone(),
                instance_type: spec.instance_size.clone(),
                key_name: spec.keypair_name.clone(),
                tags: vec![
                    ("Name".into(), spec.instance_name.clone()),
                    (BUCKET_TAG.into(), spec.bucket_name.clone()),
                ],
            })
            .await?;

        info!(instance_id = %instance.instance_id, image = %spec.image_id, "ec2: instance launched");

        Ok(LaunchedInstance {
            id: InstanceId(instance.instance_id),
            launch_time: instance.launch_time,
        })
    }

    async fn resolve_addresses(&self, instance_ids: &[InstanceId]) -> Result<Option<Vec<AddressPair>>> {
        let ids: Vec<&str> = instance_ids.iter().map(|id| id.0.as_str()).collect();
        let instances = self.client.describe_instances(&ids).await?;

        // Freshly launched instances may not be visible to describe yet.
        if instances.is_empty() {
            return Ok(None);
        }

        let mut pairs = Vec::with_capacity(instances.len());
        for instance in &instances {
            match instance.addresses() {
                Some((public_host, private_host)) => pairs.push(AddressPair {
                    public_host,
                    private_host,
                }),
                None => {
                    debug!(instance_id = %instance.instance_id, "ec2: addresses not assigned yet");
                    return Ok(None);
                }
            }
        }
        Ok(Some(pairs))
    }
}

/// Route53-backed DNS reads.
pub struct AwsDns {
    client: Route53Client,
}

impl AwsDns {
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self> {
        // Route53 is a global service signed against us-east-1.
        Ok(Self {
            client: Route53Client::new(Endpoint::new(endpoint, "us-east-1")?, credentials),
        })
    }
}

#[async_trait]
impl DnsService for AwsDns {
    async fn lookup_record_sets(&self, zone_id: &str, filter: &RecordSetFilter) -> Result<RecordSets> {
        Ok(self.client.list_resource_record_sets(zone_id, filter).await?)
    }
}
