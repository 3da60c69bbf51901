use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{Redirect, Response},
};

use tower_sessions::Session;

use crate::{error::AppError, repository::UserState};

/// Session key holding the logged-in user's id.
pub const AUTH_SESSION_KEY: &str = "authID";

/// Where anonymous visitors of protected pages are sent.
pub const LOGIN_PATH: &str = "/users/login";

/// Authentication
///
/// The request-scoped verdict of the authentication gate. It lives in the request's
/// extensions only, so it is recomputed for every request and never outlives one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Authentication {
    #[default]
    Anonymous,
    Authenticated { user_id: i64 },
}

impl Authentication {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Authentication::Authenticated { .. })
    }
}

/// Reads the gate's verdict. Requests that never passed the gate count as anonymous.
impl<S> FromRequestParts<S> for Authentication
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Authentication>()
            .copied()
            .unwrap_or_default())
    }
}

/// authenticate
///
/// Last stage of the stateful chain. A session carrying `authID` only counts as
/// authenticated while that user still exists; a stale id is dropped from the session
/// and the request continues anonymously.
pub async fn authenticate(
    State(users): State<UserState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authentication = match session.get::<i64>(AUTH_SESSION_KEY).await? {
        None => Authentication::Anonymous,
        Some(user_id) => {
            if users.exists(user_id).await? {
                Authentication::Authenticated { user_id }
            } else {
                tracing::info!(user_id, "session refers to a user that no longer exists");
                session.remove::<i64>(AUTH_SESSION_KEY).await?;
                Authentication::Anonymous
            }
        }
    };

    request.extensions_mut().insert(authentication);
    Ok(next.run(request).await)
}

/// AuthUser
///
/// An authenticated caller. Extracting it from an anonymous request short-circuits
/// with a redirect to the login page; it trusts the gate and does no lookups of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Authentication::from_request_parts(parts, state).await {
            Ok(Authentication::Authenticated { user_id }) => Ok(AuthUser { id: user_id }),
            _ => Err(Redirect::to(LOGIN_PATH)),
        }
    }
}

/// require_authentication
///
/// Guards the protected routes. The `AuthUser` extractor has already turned anonymous
/// requests away by the time this body runs. Protected pages are marked uncacheable.
pub async fn require_authentication(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
