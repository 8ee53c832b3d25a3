use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use venue_booking::{config::Config, controllers, services::ExpiryService, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting venue booking engine ({})", config.app.environment);

    let app_state = AppState::new(config.clone())
        .await
        .context("failed to initialise booking engine")?;

    // --- Background tasks ---

    // Free pending holds that were never confirmed
    let sweep_every = Duration::from_secs(config.booking.expiry_sweep_seconds);
    let expiry = ExpiryService::new(app_state.clone());
    task::spawn(async move {
        loop {
            expiry.run_expiry().await;
            tokio::time::sleep(sweep_every).await;
        }
    });

    // --- Web server ---

    let app = Router::new()
        .route("/", get(|| async { "Venue booking engine v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let host: std::net::IpAddr = config.app.host.parse().context("HOST must be an IP address")?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
