use super::cookie::RefreshCookie;
use super::error::*;
use super::handler;
use crate::application_impl::AuthGate;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::HeaderMap;
use warp::{Filter, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::path!("users" / "register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path!("users" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(server.refresh_cookie.clone()))
        .and_then(handler::login);

    let refresh = warp::path!("users" / "refresh")
        .and(warp::post())
        .and(with_refresh_token(server.refresh_cookie.clone()))
        .and(with(server.auth_service.clone()))
        .and(with(server.refresh_cookie.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("users" / "logout")
        .and(warp::post())
        .and(header_text("authorization"))
        .and(with_refresh_token(server.refresh_cookie.clone()))
        .and(with(server.auth_service.clone()))
        .and(with(server.refresh_cookie.clone()))
        .and_then(handler::logout);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_gate(server.auth_gate.clone(), None))
        .and_then(handler::me);

    let revoke_sessions = warp::path!("admin" / "users" / i64 / "sessions")
        .and(warp::delete())
        .and(with_gate(server.auth_gate.clone(), Some(Role::Admin)))
        .and(with(server.auth_service.clone()))
        .and_then(handler::revoke_user_sessions);

    register
        .or(login)
        .or(refresh)
        .or(logout)
        .or(me)
        .or(revoke_sessions)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Header value as text. A value that is not visible ASCII counts as absent,
/// so a garbled credential is unauthenticated rather than a server error.
fn header_text(
    name: &'static str,
) -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    warp::header::headers_cloned().map(move |headers: HeaderMap| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    })
}

fn with_refresh_token(
    refresh_cookie: Arc<RefreshCookie>,
) -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    header_text("cookie").map(
        move |cookies: Option<String>| {
            cookies.and_then(|cookies| refresh_cookie.read(&cookies).map(str::to_owned))
        },
    )
}

/// Admits the request when its bearer token verifies and its role satisfies
/// `required`, extracting the verified claims.
fn with_gate(
    auth_gate: Arc<AuthGate>,
    required: Option<Role>,
) -> impl Filter<Extract = (TokenClaims,), Error = warp::Rejection> + Clone {
    header_text("authorization").and_then(
        move |authorization: Option<String>| {
            let auth_gate = auth_gate.clone();
            async move {
                auth_gate
                    .admit(authorization.as_deref(), required)
                    .await
                    .map_err(ApiError::from)
                    .map_err(reject::custom)
            }
        },
    )
}
