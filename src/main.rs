//! Brief Service: Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_brief::api::{create_router, AppState};
use ai_brief::config::AppConfig;
use ai_brief::engine::Pipeline;
use ai_brief::generate::OpenAiGenerator;
use ai_brief::ingest::feed::FeedFetcher;
use ai_brief::ingest::FeedClient;
use ai_brief::metrics::Metrics;
use ai_brief::store::FileStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ai_brief=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load()?;
    let metrics = Metrics::init();

    let store = Arc::new(FileStore::new(config.data_dir.clone()));
    let feeds: Arc<dyn FeedClient> = Arc::new(FeedFetcher::new());
    let generator = Arc::new(OpenAiGenerator::new());
    let pipeline = Arc::new(Pipeline::new(feeds.clone(), generator, store));

    let state = AppState {
        pipeline,
        config: Arc::new(config.clone()),
        feeds,
    };
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "brief service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
