//! Amazon Bedrock embedding provider.
//!
//! Calls `InvokeModel` on `bedrock-runtime.<region>.amazonaws.com` for an
//! Amazon Titan text embedding model. Requests are signed with AWS
//! Signature Version 4 using credentials from the environment:
//!
//! | Variable | Required |
//! |----------|----------|
//! | `AWS_ACCESS_KEY_ID` | yes |
//! | `AWS_SECRET_ACCESS_KEY` | yes |
//! | `AWS_SESSION_TOKEN` | for temporary credentials |
//!
//! Request body is `{"inputText": ...}` (plus `dimensions` for Titan v2);
//! the response carries the vector under `embedding`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::{Digest, Sha256};

use session_memory_core::embedding::Embedder;
use session_memory_core::error::EmbeddingError;

use super::{http_client, json_vector, send_json};
use crate::config::EmbeddingConfig;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "bedrock";

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> Result<Self, EmbeddingError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| EmbeddingError::Config(format!("{name} environment variable not set")))
        };
        Ok(Self {
            access_key_id: var("AWS_ACCESS_KEY_ID")?,
            secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

pub struct BedrockEmbedder {
    client: reqwest::Client,
    credentials: AwsCredentials,
    region: String,
    /// `https://host` without a trailing slash.
    endpoint: String,
    model: String,
    dims: usize,
}

impl BedrockEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Self::with_credentials(config, AwsCredentials::from_env()?)
    }

    pub fn with_credentials(
        config: &EmbeddingConfig,
        credentials: AwsCredentials,
    ) -> Result<Self, EmbeddingError> {
        if config.region.trim().is_empty() {
            return Err(EmbeddingError::Config("embedding.region is empty".into()));
        }
        let endpoint = config
            .url
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", config.region))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            credentials,
            region: config.region.clone(),
            endpoint,
            model: config.model.clone(),
            dims: config.dims,
        })
    }

    fn request_body(&self, text: &str) -> Value {
        if self.model.starts_with("amazon.titan-embed-text-v2") {
            serde_json::json!({ "inputText": text, "dimensions": self.dims })
        } else {
            serde_json::json!({ "inputText": text })
        }
    }
}

#[async_trait]
impl Embedder for BedrockEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::to_vec(&self.request_body(text))
            .map_err(|e| EmbeddingError::Config(format!("failed to encode request: {e}")))?;

        let path = format!("/model/{}/invoke", uri_encode(&self.model));
        let host = self
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        let signed = sign_request(&SigningInput {
            credentials: &self.credentials,
            region: &self.region,
            service: SERVICE,
            method: "POST",
            host,
            // Non-S3 services sign the path encoded a second time.
            canonical_uri: &path.split('/').map(uri_encode).collect::<Vec<_>>().join("/"),
            content_type: "application/json",
            body: &body,
            now: Utc::now(),
        });

        let mut request = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-Amz-Date", &signed.amz_date)
            .header("Authorization", &signed.authorization)
            .body(body);
        if let Some(ref token) = self.credentials.session_token {
            request = request.header("X-Amz-Security-Token", token);
        }

        parse_titan_response(&send_json(request).await?)
    }
}

fn parse_titan_response(json: &Value) -> Result<Vec<f32>, EmbeddingError> {
    json_vector(json.get("embedding"), "embedding")
}

// ============ AWS SigV4 ============

struct SigningInput<'a> {
    credentials: &'a AwsCredentials,
    region: &'a str,
    service: &'a str,
    method: &'a str,
    host: &'a str,
    canonical_uri: &'a str,
    content_type: &'a str,
    body: &'a [u8],
    now: DateTime<Utc>,
}

#[derive(Debug)]
struct SignedRequest {
    amz_date: String,
    authorization: String,
}

fn sign_request(input: &SigningInput<'_>) -> SignedRequest {
    let date_stamp = input.now.format("%Y%m%d").to_string();
    let amz_date = input.now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(input.body);

    let mut headers = vec![
        ("content-type".to_string(), input.content_type.to_string()),
        ("host".to_string(), input.host.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = input.credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        input.method, input.canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, input.region, input.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &input.credentials.secret_access_key,
        &date_stamp,
        input.region,
        input.service,
    );
    let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

    SignedRequest {
        amz_date,
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            input.credentials.access_key_id, credential_scope, signed_headers, signature
        ),
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding; only `A-Z a-z 0-9 - _ . ~` pass through.
fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}
