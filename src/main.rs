use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use resale_scanner::api::{router, ApiState, HealthState, LatencyStats};
use resale_scanner::config::Config;
use resale_scanner::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        "Scanner config: ship_mode={} top_n={} api_port={}",
        cfg.ship_mode, cfg.top_n, cfg.api_port,
    );

    let api_state = ApiState {
        ship_mode: cfg.ship_mode,
        top_n: cfg.top_n,
        health: Arc::new(HealthState::new()),
        latency: Arc::new(LatencyStats::new()),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
