use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{render::RenderError, repository::StoreError};

/// AppError
///
/// The failures a handler or middleware stage can end a request with.
///
/// Client errors carry their own status. A missing record becomes a plain 404 whatever the
/// reason it is missing. Everything else is a server error: logged in full here, reported
/// to the client only as "Internal Server Error".
#[derive(Debug, Error)]
pub enum AppError {
    #[error("client error: {0}")]
    Client(StatusCode),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("no session attached to the request")]
    SessionUnavailable,
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Client(status) => *status,
            AppError::Store(StoreError::NoRecord) => StatusCode::NOT_FOUND,
            _ => {
                tracing::error!("server error: {:?}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}
