use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use tower_sessions::{
    Expiry, Session, SessionManagerLayer,
    cookie::SameSite,
    session::{Id, Record},
    session_store::{self, ExpiredDeletion, SessionStore},
};
use tower_sessions_sqlx_store::SqliteStore;

use crate::error::AppError;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// Absolute lifetime of a session, counted from its first use.
pub const SESSION_LIFETIME: Duration = Duration::hours(12);

/// Table the session rows live in.
pub const SESSION_TABLE: &str = "tower_sessions";

// Session key holding the unix timestamp the session dies at.
const DEADLINE_SESSION_KEY: &str = "deadline";

/// SqliteSessionStore
///
/// `tower_sessions_sqlx_store::SqliteStore` with one change: saving an existing session
/// only ever updates its row. Once a token has been rotated out or purged, a request
/// still holding it cannot write it back into the table.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    inner: SqliteStore,
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inner: SqliteStore::new(pool.clone()),
            pool,
        }
    }

    /// Creates the session table if it does not exist yet.
    pub async fn migrate(&self) -> sqlx::Result<()> {
        self.inner.migrate().await
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.inner.create(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let data = rmp_serde::to_vec(record).map_err(|e| session_store::Error::Encode(e.to_string()))?;

        let result = sqlx::query(&format!(
            "UPDATE {SESSION_TABLE} SET data = ?, expiry_date = ? WHERE id = ?"
        ))
        .bind(data)
        .bind(record.expiry_date.unix_timestamp())
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| session_store::Error::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            tracing::info!("dropping changes to a session that no longer exists");
        }
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        self.inner.load(id).await
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        self.inner.delete(id).await
    }
}

#[async_trait]
impl ExpiredDeletion for SqliteSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        self.inner.delete_expired().await
    }
}

/// session_layer
///
/// Loads the session named by the `session` cookie before the handler runs and saves it
/// afterwards. Nothing is saved for a 5xx response, and nothing can be when the handler
/// panics or the request is dropped.
pub fn session_layer(store: SqliteSessionStore, secure: bool) -> SessionManagerLayer<SqliteSessionStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(secure)
        .with_expiry(Expiry::OnInactivity(SESSION_LIFETIME))
}

/// enforce_lifetime
///
/// Pins every session to the deadline recorded on its first use. Renewing the token moves
/// the data, deadline included, so a session never lives past 12 hours in total.
pub async fn enforce_lifetime(session: Session, request: Request, next: Next) -> Result<Response, AppError> {
    let recorded = session
        .get::<i64>(DEADLINE_SESSION_KEY)
        .await?
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());

    let deadline = match recorded {
        Some(deadline) => deadline,
        None => {
            let deadline = OffsetDateTime::now_utc() + SESSION_LIFETIME;
            session
                .insert(DEADLINE_SESSION_KEY, deadline.unix_timestamp())
                .await?;
            deadline
        }
    };

    session.set_expiry(Some(Expiry::AtDateTime(deadline)));
    Ok(next.run(request).await)
}
