use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use store::Analysis;

use crate::IngestError;

/// A file upload to forward to the analysis engine.
///
/// Request-scoped: built by the HTTP layer, consumed by one
/// [`IngestionCoordinator::ingest`](crate::IngestionCoordinator::ingest) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub product: String,
    pub user_id: String,
    pub file_name: String,
    pub content: Bytes,
}

impl UploadRequest {
    pub fn new(
        product: impl Into<String>,
        user_id: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            product: product.into(),
            user_id: user_id.into(),
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub fn file_size(&self) -> usize {
        self.content.len()
    }

    /// Checks the upload before any network call is attempted.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.product.trim().is_empty() {
            return Err(IngestError::Validation("product is required".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(IngestError::Validation("userID is required".into()));
        }
        if self.content.is_empty() {
            return Err(IngestError::Validation("file is required and must not be empty".into()));
        }
        Ok(())
    }
}

/// Raw reply from the analysis engine, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Result of interpreting one engine reply. Exactly one per upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestionOutcome {
    /// The engine accepted the file and assigned this identifier.
    Created { analysis_id: String },
    /// The engine declined the file.
    Rejected { message: String },
    /// The engine failed or replied unexpectedly. `status_code` is 0 when no
    /// reply was received at all.
    UpstreamError { status_code: u16, message: String },
}

/// An accepted upload together with the record read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingested {
    pub analysis_id: String,
    pub analysis: Analysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_requires_every_field() {
        let ok = UploadRequest::new("rose", "42", "leaf.jpg", &b"jpeg"[..]);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.file_size(), 4);

        for bad in [
            UploadRequest::new("", "42", "leaf.jpg", &b"jpeg"[..]),
            UploadRequest::new("rose", "  ", "leaf.jpg", &b"jpeg"[..]),
            UploadRequest::new("rose", "42", "leaf.jpg", Bytes::new()),
        ] {
            assert!(matches!(bad.validate(), Err(IngestError::Validation(_))));
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut reply = UpstreamReply::new(200, "{}");
        reply
            .headers
            .insert("content-type".into(), "application/json".into());
        assert_eq!(reply.header("Content-Type"), Some("application/json"));
        assert_eq!(reply.header("x-missing"), None);
    }
}
