use anyhow::{Context, Result};
use clap::Parser;
use resendpit::server::{self, probe_health, AppState};
use resendpit::Config;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    // Container HEALTHCHECK mode.
    if config.healthcheck {
        let healthy = probe_health(&config.health_url()).await;
        std::process::exit(if healthy { 0 } else { 1 });
    }

    init_tracing();
    config.validate()?;

    let state = AppState::from_config(&config);
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    info!(
        addr = %listener.local_addr()?,
        max_emails = config.max_emails,
        keepalive_secs = config.keepalive_secs,
        "Resend-Pit listening"
    );

    server::serve(listener, state).await?;
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,resendpit=debug,tower_http=debug"));

    let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
