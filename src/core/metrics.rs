use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;
        let _ = PROM_HANDLE.set(handle);
    }
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!("http_requests_total", "HTTP responses by status code");
    describe_histogram!("http_request_duration_seconds", Unit::Seconds, "HTTP request latency");
    describe_counter!("eligibility_decisions_total", "Eligibility decisions by reason");
    describe_counter!(
        "targeting_integrity_warnings_total",
        "Decisions made on exams carrying both a course and a class list"
    );
    describe_counter!("reconciler_runs_total", "Completed reconciliation passes");
    describe_counter!("reconciler_exams_closed_total", "Exams moved from published to closed");
    describe_counter!(
        "reconciler_write_conflicts_total",
        "Close attempts skipped because the exam was no longer published"
    );
    describe_counter!(
        "reconciler_write_failures_total",
        "Close attempts that failed in storage; retried on the next pass"
    );
}
