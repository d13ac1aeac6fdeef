use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use topiclens::config::Config;
use topiclens::dashboard::server::start_dashboard_server;
use topiclens::TopicLensEngine;

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() {
    let config = Config::global();

    let filter = EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let engine = TopicLensEngine::new(config);

    tracing::info!(
        "🚀 TopicLens v{} starting (live buffer {}, fetch limit {})",
        env!("CARGO_PKG_VERSION"),
        config.inspector.live_buffer_capacity,
        config.inspector.max_fetch_count,
    );

    if let Err(e) = start_dashboard_server(engine.clone(), &config.server.host, config.server.port).await {
        tracing::error!("[Server] {}", e);
        engine.live.stop_all();
        std::process::exit(1);
    }

    engine.live.stop_all();
}
