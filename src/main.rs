//! Duty scheduling service entry point.
//!
//! Run with: cargo run
//! Then POST a request to http://localhost:8080/schedule/compute

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use duty_scheduling::{api, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("duty_scheduling=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!(
        time_limit_s = config.time_limit_seconds,
        seed = config.random_seed,
        "starting duty scheduling service"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(api::AppState::new(config));
    let app = api::router(state).layer(cors);

    tracing::info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
