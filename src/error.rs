use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::auth::services::AuthError;
use crate::chat::services::LlmError;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    AuthenticationFailed,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::UsernameTaken) => StatusCode::CONFLICT,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Llm(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Auth(AuthError::Password(_) | AuthError::Repository(_)) => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            ApiError::Llm(e) => {
                error!(error = %e, "llm provider failed");
                "Language model provider failed".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}
