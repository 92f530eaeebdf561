use core_types::Endpoint;
use thiserror::Error;

/// Exchange return codes that mean "slow down".
const RATE_LIMIT_CODES: &[i64] = &[10006, 10018];
/// Exchange return codes for bad, expired or under-privileged keys and
/// signature/timestamp rejections.
const AUTH_CODES: &[i64] = &[10002, 10003, 10004, 10005, 10007, 33004];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("The API request returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("The exchange rejected the request (retCode {code}): {message}")]
    Exchange { code: i64, message: String },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Failed to encode the request: {0}")]
    Encoding(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Pagination for {endpoint} did not finish within {pages} pages")]
    PageLimitExceeded { endpoint: Endpoint, pages: u32 },
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ApiError::Exchange { code, .. } => RATE_LIMIT_CODES.contains(code),
            ApiError::HttpStatus { status, .. } => *status == 429 || *status == 403,
            _ => false,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        match self {
            ApiError::Exchange { code, .. } => AUTH_CODES.contains(code),
            ApiError::HttpStatus { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Short category label for logs and alerts.
    pub fn kind(&self) -> &'static str {
        if self.is_rate_limited() {
            "rate-limited"
        } else if self.is_auth_failure() {
            "authentication"
        } else {
            match self {
                ApiError::Transport(_) | ApiError::HttpStatus { .. } => "transport",
                ApiError::Exchange { .. } => "exchange",
                ApiError::Deserialization(_) => "malformed-response",
                ApiError::Encoding(_) | ApiError::InvalidRequest(_) => "request",
                ApiError::PageLimitExceeded { .. } => "page-limit",
            }
        }
    }
}
