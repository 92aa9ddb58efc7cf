use std::env;

use anyhow::{Context, Result};
use trip_api::build_app;
use trip_observability::init_tracing;
use trip_service::{PlannerConfig, DEFAULT_BIND};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("trip_api");

    let config = PlannerConfig::from_env();
    let bind = env::var("TRIP_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

    let app = build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(
        bind = %bind,
        dataset = %config.dataset_path.display(),
        "trip budget api started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
