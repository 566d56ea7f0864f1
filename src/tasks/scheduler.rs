use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::tasks::reconciliation;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let shutdown_rx = crate::core::shutdown::watch_shutdown();
    let handle = tokio::spawn(reconcile_loop(state, shutdown_rx));

    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Background task join failed");
    }

    Ok(())
}

async fn reconcile_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.settings().reconciler().interval_seconds);
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_seconds = period.as_secs(), "Reconciler loop started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match reconciliation::run_pass(&state).await {
                    Ok(summary) if !summary.failed.is_empty() => {
                        tracing::error!(
                            failed = summary.failed.len(),
                            "Reconcile pass left exams published; retrying next tick"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "reconcile pass failed"),
                }
            }
        }
    }

    tracing::info!("Reconciler loop stopped");
}
