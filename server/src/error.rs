use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use saver_core::SaverError;
use serde_json::json;
use tracing::{error, warn};

/// Error type for HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    /// Request is missing a field or carries an invalid one
    BadRequest(String),
    /// Request came from a page the server does not serve or trust
    Forbidden(String),
    /// Failure reported by the conversation client
    Saver(SaverError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Saver(err) => match err {
                SaverError::Auth(_) => StatusCode::UNAUTHORIZED,
                SaverError::Attachment(_) | SaverError::InvalidTurn(_) => StatusCode::BAD_REQUEST,
                SaverError::Provider { .. } | SaverError::Network(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(message) | Self::Forbidden(message) => message.clone(),
            Self::Saver(err) => err.to_string(),
        }
    }
}

impl From<SaverError> for ApiError {
    fn from(err: SaverError) -> Self {
        Self::Saver(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("Invalid form data: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!(status = %status, error = %message, "Request failed");
        } else {
            warn!(status = %status, error = %message, "Request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
