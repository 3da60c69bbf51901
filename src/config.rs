use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers and middleware via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie hardening.
    pub env: Env,
    // TCP port the HTTP server listens on.
    pub port: u16,
    // Data-source name for the SQLite database (e.g. `sqlite:snippetbox.db?mode=rwc`).
    pub db_url: String,
    // Directory served under `/static`.
    pub static_dir: PathBuf,
    // bcrypt work factor used when hashing new passwords.
    pub bcrypt_cost: u32,
    // Longest a request may take before it is answered with 408.
    pub request_timeout: Duration,
}

/// Env
///
/// Defines the runtime context: pretty logs and plain cookies locally,
/// JSON logs and `Secure` cookies in production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ConfigError
///
/// Reasons `AppConfig::load` refuses to produce a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_DB_URL: &str = "sqlite:snippetbox.db?mode=rwc";
const DEFAULT_STATIC_DIR: &str = "./ui/static";
const DEFAULT_BCRYPT_COST: u32 = 12;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

impl Default for AppConfig {
    /// default
    ///
    /// Provides a non-panicking AppConfig for test setup: an in-memory database
    /// and local-mode defaults, without touching the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: DEFAULT_PORT,
            db_url: "sqlite::memory:".to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (after `.env` has been applied
    /// by the caller) and implements the **fail-fast** principle.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` when `DATABASE_URL` is absent in production, and
    /// `ConfigError::Invalid` when `PORT`, `BCRYPT_COST` or `REQUEST_TIMEOUT_SECS` cannot
    /// be parsed, the cost is outside bcrypt's supported range, or the timeout is zero.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        // The production database must be named explicitly.
        let db_url = match (env, env::var("DATABASE_URL")) {
            (_, Ok(url)) => url,
            (Env::Production, Err(_)) => return Err(ConfigError::Missing("DATABASE_URL")),
            (Env::Local, Err(_)) => DEFAULT_DB_URL.to_string(),
        };

        let port = parse_var("PORT", DEFAULT_PORT)?;

        let bcrypt_cost = parse_var("BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
            });
        }

        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR));

        Ok(Self {
            env,
            port,
            db_url,
            static_dir,
            bcrypt_cost,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// The socket address the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Session cookies only travel over HTTPS in production.
    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
