use std::net::SocketAddr;

use anyhow::Context;
use placement_roster::app::{AppState, create_app};
use placement_roster::config::{APP_CONFIG, PipelineSettings};
use placement_roster::roster::RosterPipeline;
use placement_roster::{db, utils::tracing::init_standard_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    init_standard_tracing(env!("CARGO_CRATE_NAME"), &APP_CONFIG.log_level);

    tracing::info!(app_env = %APP_CONFIG.app_env, "Starting application...");

    let db_connection = db::connect(&APP_CONFIG).await?;

    let settings = PipelineSettings::from(&*APP_CONFIG);
    tracing::info!(
        auto_approve_uploads = settings.auto_approve_uploads,
        processing_lease_secs = settings.processing_lease.as_secs(),
        "roster pipeline configured"
    );
    let pipeline = RosterPipeline::new(db_connection, settings);

    let app = create_app(AppState::new(pipeline), &APP_CONFIG);

    let http_address = format!("0.0.0.0:{}", APP_CONFIG.port);
    let listener = tokio::net::TcpListener::bind(&http_address)
        .await
        .with_context(|| format!("failed to bind {http_address}"))?;

    tracing::info!("HTTP server listening on {}", &http_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server stopped")?;

    Ok(())
}
