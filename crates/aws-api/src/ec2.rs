use crate::{
    Call, Credentials, DescribeInstancesResponse, Endpoint, Error, Instance, Result,
    RunInstancesRequest, RunInstancesResponse, Transport, decode,
};

const API_VERSION: &str = "2016-11-15";

/// Client for the EC2 query API, bound to the operator's credentials.
#[derive(Clone)]
pub struct Ec2Client {
    transport: Transport,
    credentials: Credentials,
}

impl Ec2Client {
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            transport: Transport::new(endpoint, "ec2"),
            credentials,
        }
    }

    fn params(action: &str) -> Vec<(String, String)> {
        vec![
            ("Action".into(), action.into()),
            ("Version".into(), API_VERSION.into()),
        ]
    }

    /// Launch exactly one instance and return it.
    pub async fn run_instance(&self, req: &RunInstancesRequest) -> Result<Instance> {
        let mut params = Self::params("RunInstances");
        params.extend([
            ("ImageId".into(), req.image_id.clone()),
            ("InstanceType".into(), req.instance_type.clone()),
            ("KeyName".into(), req.key_name.clone()),
            ("MinCount".into(), "1".into()),
            ("MaxCount".into(), "1".into()),
        ]);
        if !req.tags.is_empty() {
            params.push(("TagSpecification.1.ResourceType".into(), "instance".into()));
            for (i, (key, value)) in req.tags.iter().enumerate() {
                let n = i + 1;
                params.push((format!("TagSpecification.1.Tag.{n}.Key"), key.clone()));
                params.push((format!("TagSpecification.1.Tag.{n}.Value"), value.clone()));
            }
        }

        let (_, resp) = self
            .transport
            .send(Call::get("/", &params).signed(&self.credentials))
            .await?;
        let parsed: RunInstancesResponse = decode(resp, "run instances").await?;

        parsed
            .instances_set
            .items
            .into_iter()
            .next()
            .ok_or(Error::EmptyResponse("run instances"))
    }

    pub async fn describe_instances(&self, instance_ids: &[&str]) -> Result<Vec<Instance>> {
        let mut params = Self::params("DescribeInstances");
        for (i, id) in instance_ids.iter().enumerate() {
            params.push((format!("InstanceId.{}", i + 1), (*id).to_string()));
        }

        let (_, resp) = self
            .transport
            .send(Call::get("/", &params).signed(&self.credentials))
            .await?;
        let parsed: DescribeInstancesResponse = decode(resp, "describe instances").await?;

        Ok(parsed
            .reservation_set
            .items
            .into_iter()
            .flat_map(|r| r.instances_set.items)
            .collect())
    }
}
