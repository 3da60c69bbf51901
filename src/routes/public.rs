use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Pages anyone may load: the snippet listing, single snippets, and the signup and
/// login forms. They still see the session, so flash messages and the CSRF token work here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // The ten most recent snippets that have not expired.
        .route("/", get(handlers::home))
        // GET /snippets/view/{id}
        // A single snippet; 404 for malformed ids and for expired or unknown snippets.
        .route("/snippets/view/{id}", get(handlers::snippet_view))
        // GET, POST /users/signup
        .route(
            "/users/signup",
            get(handlers::signup_form).post(handlers::signup),
        )
        // GET, POST /users/login
        // A successful POST rotates the session token before storing the user id.
        .route("/users/login", get(handlers::login_form).post(handlers::login))
}
