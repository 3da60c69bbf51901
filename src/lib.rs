use std::{any::Any, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod clock;
pub mod config;
pub mod csrf;
pub mod error;
pub mod handlers;
pub mod models;
pub mod render;
pub mod repository;
pub mod session;
pub mod validator;

// Route tables split by access level (Public, Authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use clock::{Clock, ClockState, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{SnippetState, SqliteSnippetRepository, SqliteUserRepository, UserState, open_db};
pub use session::{SqliteSessionStore, session_layer};

/// AppState
///
/// The single, cloneable container of shared services. Middleware and extractors pull the
/// pieces they need through the `FromRef` implementations below.
#[derive(Clone)]
pub struct AppState {
    /// Content store.
    pub snippets: SnippetState,
    /// Credential store.
    pub users: UserState,
    /// Durable session rows behind the session layer.
    pub session_store: SqliteSessionStore,
    /// Page rendering.
    pub renderer: render::RendererState,
    /// The one source of "now".
    pub clock: ClockState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// from_pool
    ///
    /// Wires the SQLite-backed stores, the session store and the JSON renderer around
    /// one connection pool.
    pub fn from_pool(pool: SqlitePool, config: AppConfig, clock: ClockState) -> Self {
        Self {
            snippets: Arc::new(SqliteSnippetRepository::new(pool.clone(), clock.clone())),
            users: Arc::new(SqliteUserRepository::new(pool.clone(), clock.clone(), config.bcrypt_cost)),
            session_store: SqliteSessionStore::new(pool),
            renderer: Arc::new(render::JsonRenderer::default()),
            clock,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserState {
    fn from_ref(app_state: &AppState) -> UserState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the whole application.
///
/// `/ping` and `/static` only pass through the outer chain. Every other route also runs
/// the stateful chain, in this order: session load/save, session lifetime, CSRF
/// validation, authentication gate. The authenticated routes additionally sit behind
/// the guard.
pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;

    // 1. Stateful chain (listed outermost first).
    let stateful_chain = ServiceBuilder::new()
        .layer(DefaultBodyLimit::max(csrf::MAX_FORM_BYTES))
        .layer(session_layer(
            state.session_store.clone(),
            state.config.secure_cookies(),
        ))
        .layer(SetResponseHeaderLayer::appending(
            header::VARY,
            HeaderValue::from_static("Cookie"),
        ))
        .layer(middleware::from_fn(session::enforce_lifetime))
        .layer(middleware::from_fn(csrf::verify_csrf))
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate));

    let stateful_routes = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn(auth::require_authentication)),
        )
        .layer(stateful_chain);

    // 2. Stateless routes share only the outer chain.
    let app = Router::new()
        // GET /ping
        .route("/ping", get(handlers::ping))
        // GET /static/*
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .merge(stateful_routes)
        .with_state(state);

    with_outer_middleware(app, request_timeout)
}

/// with_outer_middleware
///
/// The chain every request passes through, outermost first: the fixed security headers,
/// panic containment, request ids and request logging, then the request timeout.
pub fn with_outer_middleware(router: Router, request_timeout: Duration) -> Router {
    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    router.layer(
        ServiceBuilder::new()
            // 1. Security headers, on every response, the panic response included.
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(
                    "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
                ),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static("origin-when-cross-origin"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("deny"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_XSS_PROTECTION,
                HeaderValue::from_static("0"),
            ))
            // 2. Panics anywhere below become a 500 on a connection that is then closed.
            .layer(CatchPanicLayer::custom(handle_panic))
            // 3. A UUID for every request, logged with it and echoed back to the client.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id))
            // 4. Requests that outlive the timeout are answered with 408.
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            )),
    )
}

/// handle_panic
///
/// Logs the panic payload and answers with a generic 500. `Connection: close` makes the
/// server drop the connection once the response is written.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "recovered from panic in request handler");

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// trace_span_logger
///
/// Builds the span every log line of a request is recorded in. It carries the
/// `x-request-id` set above, so all lines for one request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        version = ?request.version(),
        req_id = %request_id,
    )
}
