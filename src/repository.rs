use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use thiserror::Error;

use crate::{clock::ClockState, models::Snippet, session::SqliteSessionStore};

/// StoreError
///
/// Every way a store call can fail. `NoRecord`, `DuplicateEmail` and `InvalidCredentials`
/// are outcomes callers branch on; the remaining variants are infrastructure failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no matching record found")]
    NoRecord,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("snippet lifetime of {0} days is out of range")]
    InvalidExpiry(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// open_db
///
/// Opens the SQLite database named by `database_url`, creating it if needed, and brings
/// the schema, session table included, up to date. Called once at startup; any error aborts the process.
///
/// An in-memory database lives only as long as its connection, so such URLs get a
/// single connection that is never recycled.
pub async fn open_db(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    SqliteSessionStore::new(pool.clone()).migrate().await?;

    Ok(pool)
}

// --- Content Store ---

/// SnippetRepository
///
/// Persistence contract for snippets. Visibility is decided here, not by callers:
/// a snippet whose `expires` is not in the future behaves exactly like one that never existed.
#[async_trait]
pub trait SnippetRepository: Send + Sync {
    /// Stores a snippet that expires `expires_days` from now and returns its id.
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<i64, StoreError>;
    /// Fails with `StoreError::NoRecord` when the id is unknown or the snippet has expired.
    async fn get(&self, id: i64) -> Result<Snippet, StoreError>;
    /// Up to ten unexpired snippets, newest first.
    async fn latest(&self) -> Result<Vec<Snippet>, StoreError>;
}

pub type SnippetState = Arc<dyn SnippetRepository>;

/// Maximum number of snippets returned by `latest`.
pub const LATEST_LIMIT: i64 = 10;

/// SqliteSnippetRepository
///
/// The `SnippetRepository` backed by the `snippets` table.
pub struct SqliteSnippetRepository {
    pool: SqlitePool,
    clock: ClockState,
}

impl SqliteSnippetRepository {
    pub fn new(pool: SqlitePool, clock: ClockState) -> Self {
        Self { pool, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }
}

#[async_trait]
impl SnippetRepository for SqliteSnippetRepository {
    /// insert
    ///
    /// Both timestamps are derived from the store's clock at write time.
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<i64, StoreError> {
        let created = self.now();
        let expires = TimeDelta::try_days(expires_days)
            .and_then(|lifetime| created.checked_add_signed(lifetime))
            .ok_or(StoreError::InvalidExpiry(expires_days))?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO snippets (title, content, created, expires)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(created)
        .bind(expires)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("insert_snippet error: {:?}", e);
            StoreError::from(e)
        })?;

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Snippet, StoreError> {
        sqlx::query_as::<_, Snippet>(
            r#"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE id = ? AND expires > ?
            "#,
        )
        .bind(id)
        .bind(self.now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NoRecord)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, StoreError> {
        let snippets = sqlx::query_as::<_, Snippet>(
            r#"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(self.now())
        .bind(LATEST_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(snippets)
    }
}

// --- Credential Store ---

/// UserRepository
///
/// Persistence contract for accounts. Plaintext passwords go in, only hashes are stored.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates an account. Fails with `StoreError::DuplicateEmail` if the email is taken.
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), StoreError>;
    /// Returns the user id when the email and password match. An unknown email and a wrong
    /// password both fail with `StoreError::InvalidCredentials`.
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, StoreError>;
    async fn exists(&self, id: i64) -> Result<bool, StoreError>;
}

pub type UserState = Arc<dyn UserRepository>;

/// SqliteUserRepository
///
/// The `UserRepository` backed by the `users` table. Hashing and verification run on the
/// blocking thread pool since bcrypt is deliberately slow.
pub struct SqliteUserRepository {
    pool: SqlitePool,
    clock: ClockState,
    cost: u32,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool, clock: ClockState, cost: u32) -> Self {
        Self { pool, clock, cost }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    /// insert
    ///
    /// The `users_uc_email` constraint is the only arbiter of uniqueness, so two concurrent
    /// signups for one address cannot both succeed.
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), StoreError> {
        let password = password.to_owned();
        let cost = self.cost;
        let hashed_password = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, hashed_password, created)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .bind(self.clock.now().trunc_subsecs(0))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() && db_err.message().contains("users.email") =>
            {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => {
                tracing::error!("insert_user error: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, StoreError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, hashed_password FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, hashed_password)) = row else {
            return Err(StoreError::InvalidCredentials);
        };

        let password = password.to_owned();
        let matched =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed_password)).await??;

        if matched {
            Ok(id)
        } else {
            Err(StoreError::InvalidCredentials)
        }
    }

    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(found != 0)
    }
}
