use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub const SERVER_UNAVAILABLE_MESSAGE: &str = "Server is unavailable. Please try again later.";
pub const BAD_REQUEST_MESSAGE: &str = "Invalid request. Check the entered data.";
pub const UNAUTHORIZED_MESSAGE: &str = "Authorization required. Please sign in again.";
pub const FORBIDDEN_MESSAGE: &str = "Access denied.";
pub const NOT_FOUND_MESSAGE: &str = "Resource not found.";

/// Body fields checked, in order, for a backend-supplied error message
const MESSAGE_FIELDS: [&str; 3] = ["error", "message", "reason"];

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response; `message` is always non-empty and fit to show a user
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// Transport failure before any response arrived
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 2xx response whose body does not match the expected shape
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        excerpt: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub(crate) fn from_response_body(status: StatusCode, body: &str) -> Self {
        ApiError::Http {
            status,
            message: error_message(status, body),
        }
    }
}

/// Derive a user-facing message from a failed response.
///
/// 5xx always yields the generic server-unavailable text. Otherwise the first
/// non-empty `error`/`message`/`reason` string in a JSON body wins, then the raw
/// body text, then a canned message for the status.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if status.is_server_error() {
        return SERVER_UNAVAILABLE_MESSAGE.to_string();
    }

    let body = body.trim();

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        let from_json = MESSAGE_FIELDS.iter().find_map(|field| {
            fields
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        });
        if let Some(message) = from_json {
            return message.to_string();
        }
    } else if !body.is_empty() {
        return body.to_string();
    }

    canned_message(status)
}

fn canned_message(status: StatusCode) -> String {
    match status {
        StatusCode::BAD_REQUEST => BAD_REQUEST_MESSAGE.to_string(),
        StatusCode::UNAUTHORIZED => UNAUTHORIZED_MESSAGE.to_string(),
        StatusCode::FORBIDDEN => FORBIDDEN_MESSAGE.to_string(),
        StatusCode::NOT_FOUND => NOT_FOUND_MESSAGE.to_string(),
        other => format!("Request failed with status {}", other.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_error_field() {
        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"error":"X","message":"Y"}"#);
        assert_eq!(msg, "X");
    }

    #[test]
    fn test_falls_through_message_then_reason() {
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"message":"taken"}"#),
            "taken"
        );
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, r#"{"error":"","reason":"banned"}"#),
            "banned"
        );
    }

    #[test]
    fn test_raw_text_body() {
        assert_eq!(error_message(StatusCode::BAD_REQUEST, "oops"), "oops");
    }

    #[test]
    fn test_server_errors_are_always_generic() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert_eq!(
                error_message(status, r#"{"error":"db exploded"}"#),
                SERVER_UNAVAILABLE_MESSAGE
            );
        }
    }

    #[test]
    fn test_canned_messages_for_empty_bodies() {
        assert_eq!(error_message(StatusCode::BAD_REQUEST, ""), BAD_REQUEST_MESSAGE);
        assert_eq!(error_message(StatusCode::UNAUTHORIZED, "  "), UNAUTHORIZED_MESSAGE);
        assert_eq!(error_message(StatusCode::FORBIDDEN, "{}"), FORBIDDEN_MESSAGE);
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"error":42}"#),
            NOT_FOUND_MESSAGE
        );
        assert_eq!(
            error_message(StatusCode::IM_A_TEAPOT, ""),
            "Request failed with status 418"
        );
    }

    #[test]
    fn test_json_non_object_is_used_as_text() {
        assert_eq!(error_message(StatusCode::BAD_REQUEST, "\"quoted\""), "\"quoted\"");
    }

    #[test]
    fn test_display_is_the_message() {
        let err = ApiError::from_response_body(StatusCode::UNAUTHORIZED, r#"{"error":"expired"}"#);
        assert_eq!(err.to_string(), "expired");
        assert!(err.is_unauthorized());
    }
}
