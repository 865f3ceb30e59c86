//! API error type and its mapping onto the JSON envelope.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::reply::Reply;
use crate::runner::CommandError;
use crate::storage::StoreError;

pub const METHOD_NOT_SUPPORTED: &str = "method not supported";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed,
    PayloadTooLarge(String),
    Internal(String),
    /// Execution failure with the output captured before it.
    Failed { error: String, output: String },
}

impl ApiError {
    /// HTTP status the error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) | ApiError::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reply = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg) => Reply::error(msg),
            ApiError::MethodNotAllowed => Reply::error(METHOD_NOT_SUPPORTED),
            ApiError::Failed { error, output } => Reply::failure(error, output),
        };
        (status, Json(reply)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::EmptyName => ApiError::BadRequest("no filename".into()),
            StoreError::InvalidName(_) | StoreError::NotFound(_) => {
                ApiError::NotFound("file not found".into())
            }
            StoreError::Listing { partial, source } => ApiError::Failed {
                error: format!("failed to list upload directory: {source}"),
                output: partial,
            },
            err @ (StoreError::Io(_) | StoreError::Body(_) | StoreError::Remove { .. }) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(error: CommandError) -> Self {
        let error_text = error.to_string();
        ApiError::Failed {
            error: error_text,
            output: error.into_output(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(error.body_text())
        } else {
            ApiError::BadRequest(error.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
