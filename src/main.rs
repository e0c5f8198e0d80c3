mod config;
mod db;
mod error;
mod middleware;
mod models;
mod pipeline;
mod routes;
mod services;
mod state;

use crate::config::Config;
use crate::db::OperationLog;
use crate::pipeline::cost::PricingTable;
use crate::services::openai::OpenAiClient;
use crate::state::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photolab=info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    let port = config.port;

    tracing::info!("Starting photolab on port {}", port);

    // Operation log
    let operations = OperationLog::new(&config.database_path);
    operations.init()?;
    tracing::info!("Operation log ready at {}", config.database_path.display());

    // Upload and output directories
    std::fs::create_dir_all(config.upload_dir())?;
    std::fs::create_dir_all(config.processed_dir())?;

    // Pricing
    let pricing = match &config.pricing_file {
        Some(path) => {
            let table = PricingTable::from_json_file(path)?;
            tracing::info!("Loaded pricing from {}", path.display());
            table
        }
        None => PricingTable::default(),
    };

    // AI client
    let openai = OpenAiClient::new(&config)?;
    if !openai.is_configured() {
        tracing::warn!("OPENAI_API_KEY is not set; descriptions and generation will return errors");
    }

    // Load templates
    let tera = tera::Tera::new(&config.templates_glob)?;
    tracing::info!("Templates loaded: {:?}", tera.get_template_names().collect::<Vec<_>>());

    // Build state
    let state = AppState {
        tera: Arc::new(tera),
        openai: Arc::new(openai),
        pricing: Arc::new(pricing),
        config: Arc::new(config),
        operations,
    };

    // Init health tracking
    routes::health::init_start_time();

    // Build router
    let app = routes::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Listening on 0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
