use std::collections::HashMap;

use axum::{
    Form,
    body::{self, Body, Bytes},
    extract::{FromRequest, Request},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

use crate::error::AppError;

/// Session key holding the per-session CSRF secret.
pub const CSRF_SESSION_KEY: &str = "csrf_token";
/// Form field a submitted token is read from.
pub const CSRF_FORM_FIELD: &str = "csrf_token";
/// Header a submitted token is read from, for non-form clients.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Largest request body accepted on the stateful routes.
pub const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

/// CsrfToken
///
/// The session's CSRF secret, placed in request extensions for the renderer to embed in forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// verify_csrf
///
/// Second stage of the stateful chain. Makes sure the session has a CSRF secret, then
/// rejects any request with a non-safe method that does not echo that secret back,
/// either in the `x-csrf-token` header or in the `csrf_token` form field.
///
/// Form bodies are buffered to find the field and handed on to the handler unchanged.
pub async fn verify_csrf(session: Session, request: Request, next: Next) -> Result<Response, AppError> {
    let expected = match session.get::<String>(CSRF_SESSION_KEY).await? {
        Some(token) => token,
        None => {
            let token = generate_token();
            session.insert(CSRF_SESSION_KEY, &token).await?;
            token
        }
    };

    let mut request = if request.method().is_safe() {
        request
    } else {
        let (parts, body) = request.into_parts();
        let bytes = body::to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|_| AppError::Client(StatusCode::PAYLOAD_TOO_LARGE))?;

        let submitted = match parts.headers.get(CSRF_HEADER) {
            Some(value) => value.to_str().ok().map(str::to_owned),
            None => form_token(parts.headers.get(header::CONTENT_TYPE), &bytes).await,
        };

        let accepted =
            submitted.is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));
        if !accepted {
            tracing::warn!(method = %parts.method, uri = %parts.uri, "csrf token missing or invalid");
            return Err(AppError::Client(StatusCode::BAD_REQUEST));
        }

        Request::from_parts(parts, Body::from(bytes))
    };

    request.extensions_mut().insert(CsrfToken(expected));
    Ok(next.run(request).await)
}

/// Pulls `csrf_token` out of a url-encoded body, if the body is one.
async fn form_token(content_type: Option<&HeaderValue>, bytes: &Bytes) -> Option<String> {
    let content_type = content_type?.clone();
    let replay = axum::http::Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes.clone()))
        .ok()?;

    let Form(mut fields) = Form::<HashMap<String, String>>::from_request(replay, &()).await.ok()?;
    fields.remove(CSRF_FORM_FIELD)
}

/// 32 bytes from the thread-local CSPRNG, hex encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}
