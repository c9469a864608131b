use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ConversationSummary;

const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid server address: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Sign-in required")]
    Unauthorized,
}

impl ApiError {
    pub fn status(status: reqwest::StatusCode, body: &str) -> Self {
        let trimmed = body.trim();
        let body = if trimmed.is_empty() {
            status.canonical_reason().unwrap_or("Request failed").to_string()
        } else if trimmed.chars().count() > BODY_EXCERPT_CHARS {
            let excerpt: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
            format!("{}...", excerpt)
        } else {
            trimmed.to_string()
        };
        ApiError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

// --- Request bodies ---

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ProcessInputRequest<'a> {
    pub query: &'a str,
}

// --- Response bodies ---

#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    pub response: String,
}

/// Reply from the query endpoint. `rows` holds tabular results when the
/// server ran a lookup on the user's behalf.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub rows: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Shared shape of the `{status, ...}` endpoints.
#[derive(Debug, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

impl StatusEnvelope {
    pub fn into_result(self) -> Result<Self, ApiError> {
        let status = self.status.trim().to_ascii_lowercase();
        if status == "success" || status == "ok" {
            return Ok(self);
        }
        let reason = self
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| {
                if self.status.is_empty() {
                    "missing status".to_string()
                } else {
                    self.status.clone()
                }
            });
        Err(ApiError::Server(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> StatusEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn success_status_is_case_insensitive() {
        assert!(envelope(r#"{"status": "Success"}"#).into_result().is_ok());
        assert!(envelope(r#"{"status": "ok"}"#).into_result().is_ok());
    }

    #[test]
    fn error_field_wins_over_status_text() {
        let err = envelope(r#"{"status": "error", "error": "no session"}"#)
            .into_result()
            .unwrap_err();
        assert_eq!(err.to_string(), "Server error: no session");
    }

    #[test]
    fn missing_status_is_an_error() {
        let err = envelope("{}").into_result().unwrap_err();
        assert!(matches!(err, ApiError::Server(ref m) if m == "missing status"));
    }

    #[test]
    fn long_bodies_are_cut_to_an_excerpt() {
        let body = "x".repeat(500);
        match ApiError::status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), BODY_EXCERPT_CHARS + 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_reads_as_sign_in_prompt() {
        assert_eq!(ApiError::Unauthorized.to_string(), "Sign-in required");
    }

    #[test]
    fn empty_body_uses_reason_phrase() {
        let err = ApiError::status(reqwest::StatusCode::NOT_FOUND, "  ");
        assert_eq!(err.to_string(), "Server returned HTTP 404: Not Found");
    }
}
