use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::Exam;
use crate::repositories;
use crate::services::activation_reconciler::{self, FailedWrite, StatusChange};
use crate::services::eligibility::ExamRecord;

#[derive(Debug, Serialize)]
pub(crate) struct ClosedExam {
    pub(crate) exam_id: String,
    pub(crate) from: &'static str,
    pub(crate) to: &'static str,
    pub(crate) window_end: String,
    pub(crate) closed_at: String,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct PassSummary {
    pub(crate) observed_at: String,
    pub(crate) scanned: usize,
    pub(crate) closed: Vec<ClosedExam>,
    pub(crate) conflicts: Vec<String>,
    pub(crate) failed: Vec<FailedWrite>,
}

impl From<StatusChange> for ClosedExam {
    fn from(change: StatusChange) -> Self {
        Self {
            exam_id: change.exam_id,
            from: change.from.as_str(),
            to: change.to.as_str(),
            window_end: format_primitive(change.window_end),
            closed_at: format_primitive(change.observed_at),
        }
    }
}

pub(crate) async fn run_pass(state: &AppState) -> Result<PassSummary> {
    run_pass_at(state.db(), state.settings().reconciler().batch_size, primitive_now_utc()).await
}

/// Pages through published exams and closes the expired ones with one `now`
/// for the whole pass. Failed writes are collected in the summary; only a
/// failed page read aborts the pass.
pub(crate) async fn run_pass_at(
    pool: &PgPool,
    batch_size: i64,
    now: PrimitiveDateTime,
) -> Result<PassSummary> {
    let mut summary = PassSummary { observed_at: format_primitive(now), ..Default::default() };
    let page_size = batch_size.clamp(1, repositories::exams::MAX_PAGE_SIZE);
    let mut after_id: Option<String> = None;

    loop {
        let page = repositories::exams::list_published_page(pool, after_id.as_deref(), page_size)
            .await
            .context("Failed to fetch published exams")?;

        let Some(last) = page.last() else {
            break;
        };
        after_id = Some(last.id.clone());

        let records: Vec<ExamRecord> = page.iter().map(Exam::to_record).collect();
        let changes = activation_reconciler::reconcile(&records, now);
        let report = activation_reconciler::apply_changes(pool, changes, now).await;

        summary.scanned += page.len();
        summary.closed.extend(report.applied.into_iter().map(ClosedExam::from));
        summary.conflicts.extend(report.conflicts);
        summary.failed.extend(report.failed);

        if (page.len() as i64) < page_size {
            break;
        }
    }

    tracing::info!(
        scanned = summary.scanned,
        closed = summary.closed.len(),
        conflicts = summary.conflicts.len(),
        failed = summary.failed.len(),
        "Reconciled exam activation status"
    );
    metrics::counter!("reconciler_runs_total").increment(1);
    metrics::counter!("reconciler_exams_closed_total").increment(summary.closed.len() as u64);
    metrics::counter!("reconciler_write_conflicts_total")
        .increment(summary.conflicts.len() as u64);
    metrics::counter!("reconciler_write_failures_total").increment(summary.failed.len() as u64);

    Ok(summary)
}
