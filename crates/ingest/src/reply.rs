//! Decoding and interpretation of analysis engine replies.
//!
//! The engine answers with `{"Response": "<string>"}` on both success and
//! rejection, but may also send plain text or an empty body. Decoding is two
//! explicit steps: a strict decode into [`EngineReply`], and on failure the
//! raw body as a string.

use serde::Deserialize;

use crate::types::{IngestionOutcome, UpstreamReply};

#[derive(Debug, Deserialize)]
struct EngineReply {
    #[serde(rename = "Response")]
    response: String,
}

/// A decoded reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// The body matched `{"Response": "..."}`.
    Structured(String),
    /// The body did not match; carries it verbatim (lossy UTF-8).
    Raw(String),
}

impl ReplyBody {
    /// Strict decode first, raw text as the fallback.
    pub fn decode(body: &[u8]) -> Self {
        match serde_json::from_slice::<EngineReply>(body) {
            Ok(reply) => ReplyBody::Structured(reply.response),
            Err(_) => ReplyBody::Raw(String::from_utf8_lossy(body).into_owned()),
        }
    }

    /// Structured message if non-empty, otherwise the raw body text.
    fn message_or(self, raw: impl FnOnce() -> String) -> String {
        match self {
            ReplyBody::Structured(msg) if !msg.trim().is_empty() => msg,
            ReplyBody::Structured(_) => raw(),
            ReplyBody::Raw(text) => text,
        }
    }
}

/// Map an engine reply to exactly one [`IngestionOutcome`].
///
/// - `200`: the body must decode strictly; the message is the new analysis id.
/// - `400`: the decoded message, or the raw body, becomes the rejection reason.
/// - anything else: engine failure carrying whatever message could be recovered.
pub fn interpret(reply: &UpstreamReply) -> IngestionOutcome {
    let decoded = ReplyBody::decode(&reply.body);
    match reply.status {
        200 => match decoded {
            ReplyBody::Structured(id) if !id.trim().is_empty() => IngestionOutcome::Created {
                analysis_id: id.trim().to_string(),
            },
            ReplyBody::Structured(_) => IngestionOutcome::UpstreamError {
                status_code: reply.status,
                message: "empty analysis identifier".to_string(),
            },
            ReplyBody::Raw(text) => IngestionOutcome::UpstreamError {
                status_code: reply.status,
                message: text,
            },
        },
        400 => IngestionOutcome::Rejected {
            message: decoded.message_or(|| reply.body_text()),
        },
        status => IngestionOutcome::UpstreamError {
            status_code: status,
            message: decoded.message_or(|| reply.body_text()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_decode_then_raw() {
        assert_eq!(
            ReplyBody::decode(br#"{"Response":"abc123"}"#),
            ReplyBody::Structured("abc123".into())
        );
        assert_eq!(
            ReplyBody::decode(b"file too large"),
            ReplyBody::Raw("file too large".into())
        );
        assert_eq!(
            ReplyBody::decode(br#"{"response":"lowercase"}"#),
            ReplyBody::Raw(r#"{"response":"lowercase"}"#.into())
        );
        assert_eq!(ReplyBody::decode(b""), ReplyBody::Raw(String::new()));
    }

    #[test]
    fn ok_reply_creates() {
        let reply = UpstreamReply::new(200, r#"{"Response":"abc123"}"#);
        assert_eq!(
            interpret(&reply),
            IngestionOutcome::Created {
                analysis_id: "abc123".into()
            }
        );
    }

    #[test]
    fn ok_reply_with_unparsable_body_is_upstream_error() {
        let reply = UpstreamReply::new(200, "<html>ok</html>");
        assert!(matches!(
            interpret(&reply),
            IngestionOutcome::UpstreamError { status_code: 200, .. }
        ));

        let reply = UpstreamReply::new(200, r#"{"Response":""}"#);
        assert!(matches!(
            interpret(&reply),
            IngestionOutcome::UpstreamError { status_code: 200, .. }
        ));
    }

    #[test]
    fn bad_request_surfaces_engine_message() {
        let reply = UpstreamReply::new(400, r#"{"Response":"duplicate file"}"#);
        assert_eq!(
            interpret(&reply),
            IngestionOutcome::Rejected {
                message: "duplicate file".into()
            }
        );

        let reply = UpstreamReply::new(400, "unsupported format");
        assert_eq!(
            interpret(&reply),
            IngestionOutcome::Rejected {
                message: "unsupported format".into()
            }
        );

        let reply = UpstreamReply::new(400, r#"{"Response":""}"#);
        assert_eq!(
            interpret(&reply),
            IngestionOutcome::Rejected {
                message: r#"{"Response":""}"#.into()
            }
        );
    }

    #[test]
    fn other_statuses_are_engine_failures() {
        let reply = UpstreamReply::new(500, "Traceback (most recent call last)");
        assert_eq!(
            interpret(&reply),
            IngestionOutcome::UpstreamError {
                status_code: 500,
                message: "Traceback (most recent call last)".into()
            }
        );

        let reply = UpstreamReply::new(503, r#"{"Response":"model loading"}"#);
        assert_eq!(
            interpret(&reply),
            IngestionOutcome::UpstreamError {
                status_code: 503,
                message: "model loading".into()
            }
        );
    }
}
