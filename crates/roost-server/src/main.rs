//! Backend entry point.
//!
//! Loads configuration from the environment, opens the database, and
//! serves the provisioning API until shut down.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use roost_server::{AppState, Server, ServerConfig, TokeninfoVerifier};
use roost_store::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    if let Some(parent) = config.db_path.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open_and_migrate(config.db_path.clone()).await?;

    let verifier = Arc::new(TokeninfoVerifier::new(
        config.tokeninfo_url.clone(),
        config.oauth_client_id.clone(),
    ));

    let state = Arc::new(AppState::new(&config, db, verifier));
    Server::new(config, state).start().await
}
