#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::{RequestBuilder, Response, header};
use serde_json::Value;
use snippetbox::{AppConfig, AppState, ManualClock, create_router, open_db};
use sqlx::SqlitePool;
use tokio::net::TcpListener;

pub const PASSWORD: &str = "pa55word-long";

/// Fixed starting instant for every test clock.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
}

pub async fn test_pool() -> SqlitePool {
    open_db("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database")
}

pub fn test_config() -> AppConfig {
    AppConfig {
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Starts the full application on a random port. `customize` may swap services in the
/// state before the router is built.
pub async fn spawn_app_with(customize: impl FnOnce(&mut AppState)) -> TestApp {
    let pool = test_pool().await;
    let clock = Arc::new(ManualClock::new(t0()));

    let mut state = AppState::from_pool(pool.clone(), test_config(), clock.clone());
    customize(&mut state);

    let router = create_router(state);
    let address = serve(router).await;

    TestApp {
        address,
        pool,
        clock,
    }
}

/// Serves `router` on 127.0.0.1 and returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

impl TestApp {
    pub fn browser(&self) -> Browser {
        Browser {
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap(),
            address: self.address.clone(),
            session: None,
        }
    }
}

/// The session token in a response's `Set-Cookie` header, if any.
pub fn session_token(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().strip_prefix("session="))
        .map(str::to_owned)
        .next()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// A client that carries the session cookie from one request to the next and
/// never follows redirects.
pub struct Browser {
    client: reqwest::Client,
    address: String,
    pub session: Option<String>,
}

impl Browser {
    pub async fn get(&mut self, path: &str) -> Response {
        let request = self.client.get(format!("{}{}", self.address, path));
        self.send(request).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> Response {
        let request = self.client.post(format!("{}{}", self.address, path)).form(fields);
        self.send(request).await
    }

    async fn send(&mut self, request: RequestBuilder) -> Response {
        let request = match &self.session {
            Some(token) => request.header(header::COOKIE, format!("session={token}")),
            None => request,
        };
        let response = request.send().await.expect("request failed");
        if let Some(token) = session_token(&response) {
            self.session = Some(token);
        }
        response
    }

    /// Loads a page to obtain the session's CSRF token.
    pub async fn csrf_token(&mut self) -> String {
        let page: Value = self.get("/users/signup").await.json().await.unwrap();
        page["csrf_token"].as_str().unwrap().to_owned()
    }

    pub async fn signup(&mut self, name: &str, email: &str, password: &str) -> Response {
        let csrf = self.csrf_token().await;
        self.post_form(
            "/users/signup",
            &[
                ("name", name),
                ("email", email),
                ("password", password),
                ("csrf_token", csrf.as_str()),
            ],
        )
        .await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Response {
        let csrf = self.csrf_token().await;
        self.post_form(
            "/users/login",
            &[("email", email), ("password", password), ("csrf_token", csrf.as_str())],
        )
        .await
    }
}
