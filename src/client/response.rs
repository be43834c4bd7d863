//! Response envelope decoding.
//!
//! Every JSON endpoint answers `{"success": true, ...}` on success and
//! `{"error": "..."}` (usually with a non-2xx status) on failure.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors talking to the recognition backend.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } | Self::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Connection(e.to_string())
    }
}

const GENERIC_FAILURE: &str = "request failed";

fn error_field(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Turn a non-success status and its body into an error.
pub fn status_error(status: StatusCode, body: &str) -> ServiceError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| error_field(&v))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or(GENERIC_FAILURE)
                .to_string()
        });
    ServiceError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Decode an enveloped JSON response.
///
/// A missing or false `success` flag is a failure even on a 2xx status.
pub fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ServiceError> {
    if !status.is_success() {
        return Err(status_error(status, body));
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| ServiceError::Malformed(e.to_string()))?;

    if value.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(ServiceError::Rejected(
            error_field(&value).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        ));
    }

    serde_json::from_value(value).map_err(|e| ServiceError::Malformed(e.to_string()))
}

/// Decode a JSON response that carries no envelope.
pub fn decode_plain<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ServiceError> {
    if !status.is_success() {
        return Err(status_error(status, body));
    }
    serde_json::from_str(body).map_err(|e| ServiceError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TaskOnly {
        task_id: String,
    }

    #[test]
    fn test_success_envelope() {
        let parsed: TaskOnly =
            decode_envelope(StatusCode::OK, r#"{"success": true, "task_id": "abc"}"#).unwrap();
        assert_eq!(parsed.task_id, "abc");
    }

    #[test]
    fn test_error_status_uses_server_message() {
        let err = decode_envelope::<TaskOnly>(
            StatusCode::NOT_FOUND,
            r#"{"error": "Task expired or not found"}"#,
        )
        .unwrap_err();
        match err {
            ServiceError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Task expired or not found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_status_without_json_body() {
        let err = decode_envelope::<TaskOnly>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert_eq!(err.user_message(), "Bad Gateway");
    }

    #[test]
    fn test_missing_or_false_success_flag() {
        let err = decode_envelope::<TaskOnly>(StatusCode::OK, r#"{"task_id": "abc"}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ref m) if m == "request failed"));

        let err = decode_envelope::<TaskOnly>(
            StatusCode::OK,
            r#"{"success": false, "error": "No pages were extracted successfully"}"#,
        )
        .unwrap_err();
        assert_eq!(err.user_message(), "No pages were extracted successfully");
    }

    #[test]
    fn test_malformed_bodies() {
        let err = decode_envelope::<TaskOnly>(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));

        let err = decode_envelope::<TaskOnly>(StatusCode::OK, r#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }

    #[test]
    fn test_plain_decoding() {
        #[derive(Deserialize)]
        struct Health {
            status: String,
        }
        let health: Health = decode_plain(StatusCode::OK, r#"{"status": "healthy"}"#).unwrap();
        assert_eq!(health.status, "healthy");
    }
}
