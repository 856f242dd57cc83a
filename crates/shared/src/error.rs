use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Error body returned by the back-office API on non-2xx responses.
///
/// Backends are inconsistent about which fields they send, so both are
/// optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: ErrorCode,
    #[serde(default, alias = "error")]
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body)
            .ok()
            .filter(|err| !err.message.is_empty() || err.code != ErrorCode::Unknown)
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.code, ErrorCode::Unauthorized | ErrorCode::Forbidden)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_body_with_only_message_alias() {
        let err = ApiError::from_body(r#"{"error":"token expired"}"#).expect("error body");
        assert_eq!(err.code, ErrorCode::Unknown);
        assert_eq!(err.message, "token expired");
    }

    #[test]
    fn unknown_codes_fall_back() {
        let err = ApiError::from_body(r#"{"code":"teapot","message":"no"}"#).expect("error body");
        assert_eq!(err.code, ErrorCode::Unknown);
    }

    #[test]
    fn rejects_unrelated_json() {
        assert!(ApiError::from_body(r#"{"rows":[]}"#).is_none());
        assert!(ApiError::from_body("<html>").is_none());
    }
}
