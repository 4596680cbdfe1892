//! AWS Signature Version 4 request signing.
//!
//! Signs a fully built [`reqwest::Request`] in place. Only `host`,
//! `x-amz-date` and, with temporary credentials, `x-amz-security-token`
//! are signed; the payload hash always covers the exact body bytes.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use loraix_core::error::LoraixError;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach the session token of temporary credentials
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Signs requests for one AWS service in one region
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Add `x-amz-date`, the session token and `Authorization` to `request`
    pub fn sign(
        &self,
        request: &mut reqwest::Request,
        now: DateTime<Utc>,
    ) -> Result<(), LoraixError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let url = request.url();
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(LoraixError::configuration(format!(
                    "Cannot sign a request without a host: {}",
                    url
                )))
            }
        };

        // Sorted by name.
        let mut signed = vec![("host", host), ("x-amz-date", amz_date.clone())];
        if let Some(token) = &self.credentials.session_token {
            signed.push(("x-amz-security-token", token.clone()));
        }
        let canonical_headers: String = signed
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();
        let signed_headers = signed
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .unwrap_or_default();
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method().as_str(),
            canonical_uri(url.path()),
            canonical_query(url),
            canonical_headers,
            signed_headers,
            hex::encode(Sha256::digest(body)),
        );

        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date_stamp)?,
            string_to_sign.as_bytes(),
        )?);
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        );

        tracing::trace!(canonical_request = %canonical_request, "signed request");

        let headers = request.headers_mut();
        headers.insert(
            HeaderName::from_static("x-amz-date"),
            header_value(&amz_date)?,
        );
        if let Some(token) = &self.credentials.session_token {
            headers.insert(
                HeaderName::from_static("x-amz-security-token"),
                header_value(token)?,
            );
        }
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }

    fn signing_key(&self, date_stamp: &str) -> Result<Vec<u8>, LoraixError> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, LoraixError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| LoraixError::other(format!("HMAC key error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(value: &str) -> Result<HeaderValue, LoraixError> {
    HeaderValue::from_str(value)
        .map_err(|e| LoraixError::configuration(format!("Invalid signing header value: {}", e)))
}

/// Percent-encode everything but RFC 3986 unreserved characters
pub(crate) fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Each path segment encoded once more, as non-S3 services expect
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (uri_encode(&key), uri_encode(&value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}
