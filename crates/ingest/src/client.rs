use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::types::{UploadRequest, UpstreamReply};
use crate::IngestError;

/// Sends an upload to the analysis engine and returns its raw reply.
///
/// Implementations make a single attempt: no retries. Anything short of a
/// fully buffered reply (connect failure, timeout, truncated body) is an
/// [`IngestError::Transport`].
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: &UploadRequest) -> Result<UpstreamReply, IngestError>;
}

/// [`UpstreamClient`] over HTTP using a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    http: reqwest::Client,
    url: String,
}

impl HttpUpstreamClient {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| IngestError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: cfg.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn form(request: &UploadRequest) -> Form {
        // Bytes clones are reference-counted; the upload is not copied.
        let file = Part::stream_with_length(request.content.clone(), request.file_size() as u64)
            .file_name(request.file_name.clone());
        Form::new()
            .text("product", request.product.clone())
            .text("userID", request.user_id.clone())
            .part("files", file)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn send(&self, request: &UploadRequest) -> Result<UpstreamReply, IngestError> {
        let start = Instant::now();
        debug!(
            url = %self.url,
            product = %request.product,
            file_name = %request.file_name,
            file_size = request.file_size(),
            "forwarding upload"
        );

        let response = self
            .http
            .post(&self.url)
            .multipart(Self::form(request))
            .send()
            .await
            .map_err(|e| {
                warn!(url = %self.url, error = %e, timeout = e.is_timeout(), "upstream send failed");
                IngestError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(|e| {
            warn!(url = %self.url, status, error = %e, "upstream body read failed");
            IngestError::Transport(format!("failed to read reply body: {e}"))
        })?;

        debug!(
            status,
            body_len = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upstream replied"
        );
        Ok(UpstreamReply {
            status,
            headers,
            body,
        })
    }
}
