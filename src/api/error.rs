//! Error taxonomy for the console API client.
//!
//! Only a 401 is handled inside the client (see `client::RefreshLayer`).
//! Every other failure reaches the caller as one of these variants.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::{Response, StatusCode};
use thiserror::Error;

use super::auth::StoreError;

/// Field-level validation messages as returned by the backend on HTTP 400.
///
/// The backend answers with `{"field": ["message", ...], ...}`. Errors that
/// are not tied to a field arrive under `non_field_errors` or `detail`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Parse a DRF-style error body. Scalar values become single-message lists.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut fields = BTreeMap::new();
        for (field, messages) in object {
            let list = match messages {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                    .collect(),
                serde_json::Value::String(s) => vec![s.clone()],
                other => vec![other.to_string()],
            };
            fields.insert(field.clone(), list);
        }
        Some(Self(fields))
    }

    /// Messages for a single field, empty if the field had none.
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credential and the single retry did not help.
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// The refresh call failed; the session has been cleared.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Box<ApiError>),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Map a non-success status and its body text to an error variant.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            400 => {
                let fields = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| FieldErrors::from_json(&v))
                    .filter(|f| !f.is_empty());
                match fields {
                    Some(fields) => Self::Validation(fields),
                    None => Self::Status {
                        status: 400,
                        message: body,
                    },
                }
            }
            401 => Self::Unauthenticated(detail_or_body(body)),
            403 => Self::Forbidden(detail_or_body(body)),
            404 => Self::NotFound(detail_or_body(body)),
            code => Self::Status {
                status: code,
                message: body,
            },
        }
    }

    /// Pass a successful response through, or consume it into an error.
    pub async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Self::from_status(status, body))
    }

    /// True when the session was torn down because of this error.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::RefreshFailed(_))
    }
}

/// DRF wraps simple errors as `{"detail": "..."}`; surface just the message.
fn detail_or_body(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_parsed_per_field() {
        let body = r#"{"email": ["user with this email already exists."], "username": ["This field is required."]}"#;
        match ApiError::from_status(StatusCode::BAD_REQUEST, body.to_string()) {
            ApiError::Validation(fields) => {
                assert_eq!(fields.get("email"), ["user with this email already exists."]);
                assert_eq!(fields.get("username"), ["This field is required."]);
                assert!(fields.get("password").is_empty());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_400_is_plain_status() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "bad".to_string());
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
    }

    #[test]
    fn test_detail_extracted_for_auth_errors() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"detail": "Invalid email or password"}"#.to_string(),
        );
        match err {
            ApiError::Unauthenticated(msg) => assert_eq!(msg, "Invalid email or password"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, String::new()),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, String::new()),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            ApiError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn test_field_errors_display() {
        let fields = FieldErrors::from_json(&serde_json::json!({
            "city": ["Required"],
            "detail": "Bad address",
        }))
        .unwrap();
        assert_eq!(fields.to_string(), "city: Required; detail: Bad address");
    }
}
