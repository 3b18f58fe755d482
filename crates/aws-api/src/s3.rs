use reqwest::Method;

use crate::{BucketOutcome, Call, Credentials, Endpoint, Error, Result, Transport};

/// Client for the S3 bucket API (path-style addressing).
#[derive(Clone)]
pub struct S3Client {
    transport: Transport,
}

impl S3Client {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            transport: Transport::new(endpoint, "s3"),
        }
    }

    fn location_body(location: &str) -> String {
        format!(
            "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <LocationConstraint>{location}</LocationConstraint>\
             </CreateBucketConfiguration>"
        )
    }

    /// Create a bucket owned by `credentials`. A bucket the caller already
    /// owns is adopted rather than treated as a failure.
    pub async fn create_bucket(
        &self,
        credentials: &Credentials,
        bucket: &str,
        location: Option<&str>,
    ) -> Result<BucketOutcome> {
        let path = format!("/{bucket}");
        let mut call = Call::new(Method::PUT, &path, &[]).signed(credentials);
        if let Some(location) = location {
            call = call.body(Self::location_body(location));
        }

        let (_, resp) = self.transport.send(call).await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(BucketOutcome::Created);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT && body.contains("BucketAlreadyOwnedByYou") {
            return Ok(BucketOutcome::Adopted);
        }

        Err(Error::Api {
            endpoint: "create bucket",
            status,
            body,
        })
    }
}
