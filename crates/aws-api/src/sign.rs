use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::Credentials;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

// ── Encoding ────────────────────────────────────────────────────────

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode everything except the RFC 3986 unreserved set.
pub(crate) fn uri_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// Encoded, sorted query string. Used both for signing and on the wire so
/// the two never disagree.
pub(crate) fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

// ── Signature Version 4 ─────────────────────────────────────────────

pub(crate) struct Signer<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
}

impl Signer<'_> {
    fn signing_key(&self, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.credentials.secret_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }

    /// Returns the headers to attach to the request (everything signed except
    /// `host`, which the HTTP client sets itself, plus `authorization`).
    pub(crate) fn sign(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers: Vec<(&'static str, String)> = vec![
            ("host", host.to_string()),
            ("x-amz-content-sha256", payload_hash.to_string()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.security_token {
            headers.push(("x-amz-security-token", token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(b.0));

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{k}:{}\n", v.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );
        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );
        let signature = hex(&hmac_sha256(&self.signing_key(&date), string_to_sign.as_bytes()));

        headers.retain(|(k, _)| *k != "host");
        headers.push((
            "authorization",
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds(token: Option<&str>) -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            security_token: token.map(str::to_string),
        }
    }

    #[test]
    fn empty_payload_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let params = vec![
            ("Version".to_string(), "2016-11-15".to_string()),
            ("Action".to_string(), "DescribeInstances".to_string()),
            ("Name".to_string(), "a b/c@d".to_string()),
        ];
        assert_eq!(
            canonical_query(&params),
            "Action=DescribeInstances&Name=a%20b%2Fc%40d&Version=2016-11-15"
        );
        assert_eq!(uri_encode("A-z_0.9~é+="), "A-z_0.9~%C3%A9%2B%3D");
    }

    #[test]
    fn authorization_header_shape() {
        let credentials = creds(None);
        let signer = Signer {
            credentials: &credentials,
            region: "us-east-1",
            service: "ec2",
        };
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = signer.sign("GET", "ec2.us-east-1.amazonaws.com", "/", "", &sha256_hex(b""), now);

        let names: Vec<&str> = headers.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, ["x-amz-content-sha256", "x-amz-date", "authorization"]);

        let (_, date) = &headers[1];
        assert_eq!(date, "20150830T123600Z");

        let (_, auth) = &headers[2];
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/ec2/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        let signature = auth.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn security_token_is_signed() {
        let credentials = creds(Some("{UserToken}user,{ProductToken}product"));
        let signer = Signer {
            credentials: &credentials,
            region: "us-east-1",
            service: "s3",
        };
        let now = Utc.with_ymd_and_hms(2012, 2, 15, 0, 0, 0).unwrap();
        let headers = signer.sign("PUT", "s3.amazonaws.com", "/lae-s4-1", "", &sha256_hex(b""), now);

        assert!(headers
            .iter()
            .any(|(k, v)| *k == "x-amz-security-token" && v.contains("{ProductToken}")));
        let (_, auth) = headers.last().unwrap();
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"));
    }

    #[test]
    fn signature_depends_on_secret() {
        let a = creds(None);
        let mut b = creds(None);
        b.secret_key.push('x');
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let sign = |c: &Credentials| {
            Signer {
                credentials: c,
                region: "us-east-1",
                service: "route53",
            }
            .sign("GET", "route53.amazonaws.com", "/", "", &sha256_hex(b""), now)
        };
        assert_ne!(sign(&a).last(), sign(&b).last());
    }
}
