use crate::templates;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Too many requests for this account, retry in {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },
    #[error("Exchange request failed: {0}")]
    Fetch(#[from] api_client::ApiError),
    #[error("Analytics error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),
}

impl From<core_types::CoreError> for AppError {
    fn from(err: core_types::CoreError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Analytics(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders every error as a small HTML page; the form posts are browser
/// requests, not API calls.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed.");
        } else {
            tracing::warn!(error = %self, "Rejected request.");
        }
        (status, Html(templates::error_page(&self.to_string()))).into_response()
    }
}
