use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use thiserror::Error;

use crate::{
    access::AccessDenied,
    auth::AuthError,
    data_access::data_context::StoreError,
    media_service::MediaError,
};

pub const LOGIN_PATH: &str = "/login/";

#[derive(Debug, Error)]
pub enum AppError {
    /// No session. Pages answer with a redirect to the login form.
    #[error("authentication required")]
    Unauthenticated { next: Option<String> },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Remember which page to come back to after logging in.
    pub fn login_next(self, path: &str) -> Self {
        match self {
            AppError::Unauthenticated { next: None } => AppError::Unauthenticated {
                next: Some(path.to_string()),
            },
            other => other,
        }
    }
}

impl From<AccessDenied> for AppError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => AppError::Unauthenticated { next: None },
            AccessDenied::NotAuthor => {
                tracing::warn!("task change refused: requester is not the author");
                AppError::Forbidden("only the author may change this task".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthenticated { next } => {
                let target = match next {
                    Some(path) => format!("{LOGIN_PATH}?next={path}"),
                    None => LOGIN_PATH.to_string(),
                };
                return Redirect::to(&target).into_response();
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_)
            | AppError::Multipart(_)
            | AppError::Media(MediaError::NotAnImage) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::Store(StoreError::UsernameTaken(_)) => {
                StatusCode::CONFLICT
            }
            AppError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AppError::Store(_) | AppError::Media(_) | AppError::Auth(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
