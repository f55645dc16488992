//! dashguard REST API Server
//!
//! Run with: cargo run --features server --bin dashguard-server
//!
//! Configuration comes from the environment (and `.env`):
//!   DASHGUARD_DB, DASHGUARD_MAP_SIZE, DASHGUARD_BIND, DASHGUARD_LOG,
//!   DASHGUARD_SESSION_TTL, DASHGUARD_ADMIN_EMAIL, DASHGUARD_ADMIN_PASSWORD

use std::sync::Arc;

use dashguard::auth::Argon2Hasher;
use dashguard::server::{router, AppState};
use dashguard::{bootstrap, logging, Config, LmdbStore};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    logging::init_logger(&config.log_level);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(LmdbStore::open_with_map_size(&config.db_path, config.map_size)?);
    let hasher = Arc::new(Argon2Hasher::default());
    tracing::info!(path = %config.db_path.display(), "database ready");

    if let Some((email, password)) = config.admin_credentials() {
        if !bootstrap::is_bootstrapped(store.as_ref())? {
            let r = bootstrap::seed(store.as_ref(), hasher.as_ref(), email, password)?;
            tracing::info!(admin = r.admin_user, permissions = r.permissions, "seeded");
        }
    }

    let app = router(AppState::new(store, hasher, config.session_ttl_secs));
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("dashguard-server v{} listening on {}", env!("CARGO_PKG_VERSION"), config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
