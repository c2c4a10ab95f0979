use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::messages::dispatch::DispatchError;

#[derive(Debug)]
pub enum Error {
    // Auth Errors
    LoginFail,
    AuthFailNoToken,
    AuthFailTokenWrongFormat,
    AuthFailCtxNotInRequestExt,

    // Generic
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Error::LoginFail => (StatusCode::UNAUTHORIZED, "Login failed".to_string()),
            Error::AuthFailNoToken => (StatusCode::UNAUTHORIZED, "No auth token found".to_string()),
            Error::AuthFailTokenWrongFormat => (
                StatusCode::UNAUTHORIZED,
                "Auth token wrong format".to_string(),
            ),
            Error::AuthFailCtxNotInRequestExt => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Auth context missing".to_string(),
            ),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        // Same shape as AppResponse::err so clients parse one format
        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Allow conversion from other errors (e.g., anyhow, sqlx) easiest via string
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Internal(err)
    }
}

impl From<DispatchError> for Error {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::MissingTarget | DispatchError::AmbiguousTarget => {
                Error::BadRequest(err.to_string())
            }
            DispatchError::NotAMember(_) | DispatchError::NotAParticipant(_) => {
                Error::Forbidden(err.to_string())
            }
            DispatchError::ReceiverNotFound(_) => Error::NotFound(err.to_string()),
        }
    }
}
