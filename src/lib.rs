pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};

async fn bootstrap() -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    Ok(AppState::new(settings, db_pool))
}

pub async fn run() -> anyhow::Result<()> {
    let state = bootstrap().await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Exam Gate API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    let state = bootstrap().await?;
    tasks::scheduler::run(state).await
}

/// Runs a single reconciliation pass and returns its summary as JSON. Failed
/// writes turn the result into an error that still carries the summary.
pub async fn run_reconcile_once() -> anyhow::Result<String> {
    let state = bootstrap().await?;
    let summary = tasks::reconciliation::run_pass(&state).await?;
    let rendered = serde_json::to_string_pretty(&summary)?;

    if !summary.failed.is_empty() {
        anyhow::bail!("{} exam(s) could not be closed\n{rendered}", summary.failed.len());
    }
    Ok(rendered)
}
