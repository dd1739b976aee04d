//! Basic Authentication
//!
//! Every request must carry `Authorization: Basic <base64(user:pass)>`
//! matching one entry of the configured credential list. Anything else is
//! rejected with 401 and a `WWW-Authenticate` challenge. There is no
//! lockout or attempt tracking.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::config::Credential;

/// User name of an authenticated request, placed in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Decode the user/password pair from a Basic `Authorization` header value
pub fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, passwd) = decoded.split_once(':')?;
    Some((user.to_string(), passwd.to_string()))
}

/// Check request headers against the credential list.
///
/// Returns the matching user name.
pub fn authenticate(headers: &HeaderMap, credentials: &[Credential]) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (user, passwd) = parse_basic(value)?;

    credentials
        .iter()
        .any(|c| c.user == user && c.passwd == passwd)
        .then_some(user)
}

/// Axum middleware gating every route it wraps behind Basic auth
pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match authenticate(request.headers(), &state.credentials) {
        Some(user) => {
            tracing::debug!(user = %user, path = %request.uri().path(), "Authenticated");
            request.extensions_mut().insert(AuthenticatedUser(user));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated request");
            Err(ApiError::Unauthorized)
        }
    }
}
