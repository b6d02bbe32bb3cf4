//! HTTP error responses for the control routes.
//!
//! Every error renders as `{"code": ..., "message": ...}` with a status
//! chosen from the error kind.

use alpha_sync_core::Error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] Error),

    /// Malformed control request.
    #[error("INVALID_INPUT: {0}")]
    BadRequest(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Core(e) => match e {
                Error::InvalidInput(_) | Error::InvalidUrl(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
                Error::InvalidState { .. } => StatusCode::CONFLICT,
                Error::InstallFailed { .. } => StatusCode::BAD_GATEWAY,
                Error::Database(_) | Error::MigrationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "INVALID_INPUT",
            ServerError::Core(e) => e.code(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        let body = serde_json::json!({ "code": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let conflict = ServerError::from(Error::InvalidState { expected: "installed".into(), actual: "idle".into() });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "INVALID_STATE");

        let install = ServerError::from(Error::InstallFailed { url: "/".into(), reason: "status 404".into() });
        assert_eq!(install.status(), StatusCode::BAD_GATEWAY);

        let bad = ServerError::BadRequest("missing tag".into());
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.code(), "INVALID_INPUT");
    }
}
