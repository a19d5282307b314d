use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use motorent_web::availability::HttpAvailabilityFetcher;
use motorent_web::config::Config;
use motorent_web::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("motorent_web=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let fetcher = HttpAvailabilityFetcher::new(
        &config.availability_api_url,
        config.availability_api_timeout,
    )?;
    tracing::info!(
        backend = %config.availability_api_url,
        retries = config.retry_policy.max_retries,
        "Availability Service configured"
    );

    let addr: SocketAddr = config.listen_addr.parse()?;
    let state = AppState::new(config, Arc::new(fetcher));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
