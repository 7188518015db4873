use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let error = if let Some(error) = err.find::<ApiError>() {
        error.clone()
    } else if err.is_not_found() {
        ApiError::from(ApiErrorCode::NotFound)
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        ApiError::from(ApiErrorCode::InvalidInput)
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        ApiError::from(ApiErrorCode::InvalidInput)
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiError::from(ApiErrorCode::MethodNotAllowed)
    } else {
        ApiError::internal(format!("unhandled rejection: {:?}", err))
    };

    let status = error.code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(error));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> ApiError {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Logs the cause and hides it from the client.
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiError {
        warn!("Internal error: {}", error);
        ApiError::from(ApiErrorCode::InternalError)
    }
}

impl From<ApiErrorCode> for ApiError {
    fn from(code: ApiErrorCode) -> Self {
        let message = code.to_string();
        ApiError { code, message }
    }
}

impl reject::Reject for ApiError {}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Invalid request")]
    InvalidInput,
    #[error("Authorization required")]
    Unauthenticated,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UsernameTaken => StatusCode::CONFLICT,
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials.into(),
            AuthError::UserExists => ApiErrorCode::UsernameTaken.into(),
            AuthError::InvalidInput(message) => ApiError::new(ApiErrorCode::InvalidInput, message),
            AuthError::Unauthenticated => ApiErrorCode::Unauthenticated.into(),
            AuthError::InvalidOrExpired => ApiErrorCode::InvalidToken.into(),
            AuthError::Forbidden => ApiErrorCode::Forbidden.into(),
            e @ AuthError::UpstreamUnavailable(_) => ApiError::internal(e),
            e @ AuthError::InternalError(_) => ApiError::internal(e),
        }
    }
}
