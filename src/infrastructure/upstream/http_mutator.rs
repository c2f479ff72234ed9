use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::application::ports::{UpstreamError, UpstreamMutator, UpstreamRequest};
use crate::domain::codec::{
    boundary_from_content_type, decode_with_boundary, encode, multipart_content_type,
    MULTIPART_BOUNDARY,
};
use crate::domain::entities::{Document, RootDocument};

pub const HEADER_TRANSACTION_ID: &str = "x-transaction-id";
pub const HEADER_FACTORY_RESET: &str = "x-factory-reset";

/// Upper bound on how much of an error body ends up in logs and errors.
const MAX_ERROR_BODY: usize = 512;

/// Connection and retry settings of the upstream mutator client.
#[derive(Debug, Clone)]
pub struct HttpMutatorConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl HttpMutatorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_millis(2_000),
            timeout: Duration::from_millis(10_000),
            max_retries: 3,
            retry_base: Duration::from_millis(100),
            retry_max: Duration::from_millis(2_000),
        }
    }
}

/// Forwards documents to an HTTP mutator as `multipart/mixed` and reads the
/// replacement back in the same encoding.
///
/// Transport errors, 408, 429 and 5xx are retried with exponential backoff
/// and jitter; 204, 304 and 404 mean "no replacement".
pub struct HttpUpstreamMutator {
    client: reqwest::Client,
    config: HttpMutatorConfig,
}

impl HttpUpstreamMutator {
    pub fn new(config: HttpMutatorConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, request: &UpstreamRequest) -> String {
        format!(
            "{}/api/v1/device/{}/upstream",
            self.config.base_url.trim_end_matches('/'),
            request.device_id.as_str().to_lowercase()
        )
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base.as_millis() as u64;
        let max = self.config.retry_max.as_millis() as u64;
        let backoff = base.saturating_mul(1_u64 << attempt.min(16)).min(max);
        let jitter = rand::rng().random_range(0..=(backoff / 5).max(1));
        Duration::from_millis(backoff.saturating_add(jitter))
    }

    async fn send_once(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &bytes::Bytes,
    ) -> Result<Option<Document>, UpstreamError> {
        let response = self
            .client
            .post(url)
            .headers(headers.clone())
            .body(body.clone())
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .unwrap_or_default();
                let body = response.bytes().await?;
                if body.is_empty() {
                    return Ok(None);
                }

                let boundary =
                    boundary_from_content_type(&content_type).unwrap_or(MULTIPART_BOUNDARY);
                let parts = decode_with_boundary(&body, boundary)
                    .map_err(|e| UpstreamError::Codec(e.to_string()))?;
                Ok(Some(Document::from_parts(parts)))
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED | StatusCode::NOT_FOUND => {
                debug!(status = status.as_u16(), "Upstream has no replacement");
                Ok(None)
            }
            _ => {
                let mut message = response.text().await.unwrap_or_default();
                if message.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !message.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    message.truncate(cut);
                }
                Err(UpstreamError::status(status.as_u16(), message))
            }
        }
    }
}

#[async_trait]
impl UpstreamMutator for HttpUpstreamMutator {
    async fn mutate(&self, request: &UpstreamRequest) -> Result<Option<Document>, UpstreamError> {
        let url = self.endpoint(request);
        let headers = request_headers(request);
        let body = encode(&request.document.to_parts());

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &headers, &body).await {
                Ok(document) => return Ok(document),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let backoff = self.backoff_with_jitter(attempt);
                    attempt += 1;
                    warn!(
                        device_id = %request.device_id,
                        transaction_id = %request.transaction_id,
                        attempt,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying upstream call"
                    );
                    sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Old and new root metadata travel as headers so the mutator can decide on its own.
fn request_headers(request: &UpstreamRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, CONTENT_TYPE.as_str(), &multipart_content_type());
    insert(&mut headers, HEADER_TRANSACTION_ID, &request.transaction_id);
    if request.factory_reset {
        insert(&mut headers, HEADER_FACTORY_RESET, "true");
    }

    insert_root(&mut headers, "x-system", &request.new_root);
    if let Some(old_root) = &request.old_root {
        insert_root(&mut headers, "x-system-prev", old_root);
    }
    headers
}

fn insert_root(headers: &mut HeaderMap, prefix: &str, root: &RootDocument) {
    let fields = [
        ("bitmap", root.bitmap.to_string()),
        ("firmware-version", root.firmware_version.clone()),
        ("model-name", root.model_name.clone()),
        ("partner-id", root.partner_id.clone()),
        ("schema-version", root.schema_version.clone()),
        ("root-version", root.version.clone()),
    ];
    for (suffix, value) in fields {
        if !value.is_empty() {
            insert(headers, &format!("{}-{}", prefix, suffix), &value);
        }
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => debug!(header = name, "Skipping header that is not valid HTTP"),
    }
}
