use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ohmnyom_api::config::{self, AppConfig};
use ohmnyom_api::database::{MemoryStore, PgStore};
use ohmnyom_api::state::AppState;
use ohmnyom_api::storage::{LocalMediaStore, MediaStore, MemoryMediaStore};

#[derive(Parser)]
#[command(name = "ohmnyom-api")]
#[command(about = "Ohmnyom API - shared pet care backend")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Use in-memory store and media, ignoring DATABASE_URL and MEDIA_ROOT")]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ohmnyom_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting Ohmnyom API in {:?} mode", config.environment);

    let media = media_store(config, args.memory);
    let state = match config.database.url.as_deref() {
        Some(url) if !args.memory => {
            let store = PgStore::connect(url, &config.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            AppState::new(Arc::new(store), media, &config.security)
        }
        _ => {
            tracing::warn!("no DATABASE_URL, using the in-memory store");
            AppState::new(Arc::new(MemoryStore::new()), media, &config.security)
        }
    }
    .context("invalid security configuration (is JWT_SECRET set?)")?;

    let app = ohmnyom_api::app_with_layers(state, &config.api, &config.security);

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Ohmnyom API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}

fn media_store(config: &AppConfig, memory: bool) -> Arc<dyn MediaStore> {
    match config.storage.media_root.as_deref() {
        Some(root) if !memory => {
            tracing::info!("media stored under {}", root);
            Arc::new(LocalMediaStore::new(root, config.storage.public_base_url.clone()))
        }
        _ => Arc::new(MemoryMediaStore::new()),
    }
}
