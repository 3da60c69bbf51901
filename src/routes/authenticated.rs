use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes that only make sense for a logged-in user. The guard layered over this router
/// relies on the gate having already resolved the session's `authID` for this request.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET, POST /snippets/create
        .route(
            "/snippets/create",
            get(handlers::snippet_create).post(handlers::snippet_create_post),
        )
        // POST /users/logout
        // Rotates the session token and drops the user id.
        .route("/users/logout", post(handlers::logout))
}
