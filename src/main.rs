// src/main.rs

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use annai::config::CONFIG;
use annai::provider::GeminiProvider;
use annai::server::{self, AppState};
use annai::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "annai", about = "Streaming AI travel-advisor backend", version)]
struct Args {
    /// Bind host (overrides ANNAI_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides ANNAI_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Itinerary file (overrides ANNAI_JOURNEY_FILE)
    #[arg(long)]
    journey_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = Level::from_str(&CONFIG.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting annai backend");
    info!("Model: {}", CONFIG.gemini_model);
    info!("Session TTL: {} minutes", CONFIG.session_ttl_minutes);

    if !CONFIG.has_api_key() {
        warn!("GEMINI_API_KEY not set - chat endpoints will refuse requests");
    }

    let journey_path = args
        .journey_file
        .unwrap_or_else(|| PathBuf::from(&CONFIG.journey_file));
    if !journey_path.exists() {
        warn!(path = %journey_path.display(), "Itinerary file not found - advisor runs without it");
    }

    let provider = GeminiProvider::new(
        CONFIG.gemini_api_key.clone(),
        CONFIG.gemini_base_url.clone(),
        CONFIG.gemini_model.clone(),
    )
    .with_timeout(CONFIG.upstream_timeout());

    let state = AppState {
        sessions: Arc::new(SessionStore::new()),
        provider: Arc::new(provider),
        journey_path,
        api_key: CONFIG.gemini_api_key.clone(),
        session_ttl: CONFIG.session_ttl(),
    };

    let bind_address = format!(
        "{}:{}",
        args.host.as_deref().unwrap_or(&CONFIG.host),
        args.port.unwrap_or(CONFIG.port)
    );

    server::run(&bind_address, state).await
}
