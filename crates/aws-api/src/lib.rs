//! Typed Rust client for the AWS query APIs used to provision storage servers.
//!
//! Covers the subset the provisioning pipeline and its tooling need:
//! DevPay license service (activate, verify), S3 (create bucket),
//! EC2 (run instances, describe instances) and Route53 (list record sets).
//!
//! Requests are signed with Signature Version 4. Responses are XML and are
//! decoded with `quick-xml`'s serde support.

pub mod devpay;
pub mod ec2;
pub mod route53;
pub mod s3;
mod sign;
mod types;

pub use devpay::DevPayClient;
pub use ec2::Ec2Client;
pub use route53::Route53Client;
pub use s3::S3Client;
pub use types::*;

use chrono::Utc;
use reqwest::Method;

pub const EC2_ENDPOINT: &str = "https://ec2.us-east-1.amazonaws.com/";
pub const S3_ENDPOINT: &str = "https://s3.amazonaws.com/";
pub const DEVPAY_ENDPOINT: &str = "https://ls.amazonaws.com/";
pub const ROUTE53_ENDPOINT: &str = "https://route53.amazonaws.com/";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("aws request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("aws {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed {endpoint} response: {source}")]
    Parse {
        endpoint: &'static str,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("aws {0} response contained no results")]
    EmptyResponse(&'static str),

    #[error("aws {endpoint} pagination stalled: {detail}")]
    Pagination { endpoint: &'static str, detail: String },

    #[error("malformed {record_type} record value: {value:?}")]
    Record { record_type: String, value: String },

    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("while requesting {uri}: {source}")]
    WhileRequesting {
        uri: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Service endpoint: base URI plus the region used for request signing.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: String,
    host: String,
    region: String,
}

impl Endpoint {
    pub fn new(uri: &str, region: impl Into<String>) -> Result<Self> {
        let url = reqwest::Url::parse(uri).map_err(|_| Error::InvalidEndpoint(uri.to_string()))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(Error::InvalidEndpoint(uri.to_string())),
        };
        Ok(Self {
            base: format!("{}://{host}", url.scheme()),
            host,
            region: region.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn uri(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{path}", self.base)
        } else {
            format!("{}{path}?{query}", self.base)
        }
    }
}

/// One request against an [`Endpoint`], optionally SigV4-signed.
pub(crate) struct Call<'a> {
    pub method: Method,
    pub path: &'a str,
    pub params: &'a [(String, String)],
    pub body: Option<String>,
    pub credentials: Option<&'a Credentials>,
}

impl<'a> Call<'a> {
    pub(crate) fn new(method: Method, path: &'a str, params: &'a [(String, String)]) -> Self {
        Self {
            method,
            path,
            params,
            body: None,
            credentials: None,
        }
    }

    pub(crate) fn get(path: &'a str, params: &'a [(String, String)]) -> Self {
        Self::new(Method::GET, path, params)
    }

    pub(crate) fn body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn signed(mut self, credentials: &'a Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Shared HTTP plumbing for the per-service clients.
#[derive(Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    endpoint: Endpoint,
    service: &'static str,
}

impl Transport {
    pub(crate) fn new(endpoint: Endpoint, service: &'static str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            service,
        }
    }

    /// Send a call and return the request URI alongside the raw response.
    pub(crate) async fn send(&self, call: Call<'_>) -> Result<(String, reqwest::Response)> {
        let query = sign::canonical_query(call.params);
        let uri = self.endpoint.uri(call.path, &query);

        let mut builder = self.http.request(call.method.clone(), &uri);

        if let Some(credentials) = call.credentials {
            let payload_hash = sign::sha256_hex(call.body.as_deref().unwrap_or("").as_bytes());
            let signer = sign::Signer {
                credentials,
                region: self.endpoint.region(),
                service: self.service,
            };
            let headers = signer.sign(
                call.method.as_str(),
                self.endpoint.host(),
                call.path,
                &query,
                &payload_hash,
                Utc::now(),
            );
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
        }

        if let Some(body) = call.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        Ok((uri, resp))
    }
}

pub(crate) async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            endpoint,
            status,
            body,
        });
    }
    Ok(resp)
}

/// Read a checked response body and decode it as XML.
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    endpoint: &'static str,
) -> Result<T> {
    let body = check(resp, endpoint).await?.text().await?;
    parse_xml(&body, endpoint)
}

pub(crate) fn parse_xml<T: serde::de::DeserializeOwned>(body: &str, endpoint: &'static str) -> Result<T> {
    quick_xml::de::from_str(body).map_err(|source| Error::Parse { endpoint, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_explicit_port() {
        let ep = Endpoint::new("http://localhost:4566/", "us-east-1").unwrap();
        assert_eq!(ep.host(), "localhost:4566");
        assert_eq!(ep.uri("/", "Action=X"), "http://localhost:4566/?Action=X");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(matches!(
            Endpoint::new("not a uri", "us-east-1"),
            Err(Error::InvalidEndpoint(_))
        ));
    }
}
