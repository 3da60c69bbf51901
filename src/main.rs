use std::{sync::Arc, time::Duration};

use snippetbox::{
    AppState, ClockState, SystemClock,
    config::{AppConfig, Env},
    create_router, open_db,
};
use tokio::net::TcpListener;
use tower_sessions::session_store::ExpiredDeletion;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// How often expired sessions are purged from the store.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// main
///
/// Initializes configuration, logging and the database, then serves HTTP until the
/// process is stopped. Any startup failure ends the process with an error.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging filter: RUST_LOG wins, otherwise verbose for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "snippetbox=debug,tower_http=info,axum=trace".into());

    // 3. Log format follows the environment.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database
    let pool = open_db(&config.db_url).await.inspect_err(|e| {
        tracing::error!("failed to open database: {:?}", e);
    })?;

    // 5. Shared state
    let clock: ClockState = Arc::new(SystemClock);
    let app_state = AppState::from_pool(pool, config.clone(), clock);

    // 6. Expired-session cleanup
    let session_store = app_state.session_store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match session_store.delete_expired().await {
                Ok(()) => tracing::debug!("expired sessions purged"),
                Err(e) => tracing::error!("session cleanup failed: {:?}", e),
            }
        }
    });

    // 7. Router and server
    let app = create_router(app_state);
    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;

    tracing::info!("Listening on {}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
