use super::cookie::RefreshCookie;
use super::error::*;
use crate::application_impl::bearer_token;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::{StatusCode, header};
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

fn rejection(error: impl Into<ApiError>) -> warp::Rejection {
    reject::custom(error.into())
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let register_input = RegisterInput {
        username: body.username,
        password: body.password,
    };
    let registered = auth_service
        .register(register_input)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok(registered)),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub role: Role,
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
}

pub async fn login(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
    refresh_cookie: Arc<RefreshCookie>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        username: body.username,
        password: body.password,
    };
    let login_result = auth_service.login(login_input).await.map_err(rejection)?;

    let cookie = refresh_cookie.set(&login_result.tokens.refresh_token.0);
    let login_response = LoginResponse {
        user_id: login_result.user_id,
        role: login_result.role,
        access_token: login_result.tokens.access_token,
        access_token_expires_at: login_result.tokens.access_token_expires_at,
    };

    Ok(warp::reply::with_header(
        warp::reply::json(&ApiResponse::ok(login_response)),
        header::SET_COOKIE,
        cookie,
    ))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
}

pub async fn refresh(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    refresh_cookie: Arc<RefreshCookie>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_token =
        refresh_token.ok_or_else(|| rejection(ApiErrorCode::Unauthenticated))?;

    let tokens = auth_service
        .refresh(&refresh_token)
        .await
        .map_err(rejection)?;

    let cookie = refresh_cookie.set(&tokens.refresh_token.0);
    let response = RefreshResponse {
        access_token: tokens.access_token,
        access_token_expires_at: tokens.access_token_expires_at,
    };

    Ok(warp::reply::with_header(
        warp::reply::json(&ApiResponse::ok(response)),
        header::SET_COOKIE,
        cookie,
    ))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

pub async fn logout(
    authorization: Option<String>,
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    refresh_cookie: Arc<RefreshCookie>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let access_token = authorization
        .as_deref()
        .and_then(bearer_token)
        .ok_or_else(|| rejection(ApiErrorCode::Unauthenticated))?;
    let refresh_token =
        refresh_token.ok_or_else(|| rejection(ApiErrorCode::Unauthenticated))?;

    auth_service
        .logout(access_token, &refresh_token)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::with_header(
        warp::reply::json(&ApiResponse::ok(LogoutResponse {
            message: "Logged out successfully",
        })),
        header::SET_COOKIE,
        refresh_cookie.clear(),
    ))
}

pub async fn me(claims: TokenClaims) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(claims)))
}

#[derive(Debug, Serialize)]
pub struct RevokedSessions {
    pub user_id: UserId,
}

pub async fn revoke_user_sessions(
    user_id: i64,
    admin: TokenClaims,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user_id = UserId(user_id);
    auth_service
        .revoke_sessions(user_id)
        .await
        .map_err(rejection)?;

    tracing::info!(admin = %admin.user_id, %user_id, "forced logout");
    Ok(warp::reply::json(&ApiResponse::ok(RevokedSessions { user_id })))
}
