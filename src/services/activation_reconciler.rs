use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use time::PrimitiveDateTime;

use crate::db::types::ExamStatus;
use crate::services::activation_clock::ActivationState;
use crate::services::eligibility::ExamRecord;

/// A persisted status transition the reconciler wants written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusChange {
    pub(crate) exam_id: String,
    pub(crate) from: ExamStatus,
    pub(crate) to: ExamStatus,
    pub(crate) window_end: PrimitiveDateTime,
    pub(crate) observed_at: PrimitiveDateTime,
}

/// Storage seam for the conditional status write.
#[async_trait]
pub(crate) trait ExamStatusStore: Send + Sync {
    /// Moves the exam to `Closed` only while it is still `Published`.
    /// Returns `false` when another writer got there first.
    async fn close_if_published(&self, exam_id: &str, now: PrimitiveDateTime) -> Result<bool>;
}

/// A close attempt the store rejected with an error. The exam stays
/// published until a later pass succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FailedWrite {
    pub(crate) exam_id: String,
    pub(crate) error: String,
}

#[derive(Debug, Default)]
pub(crate) struct ReconcileReport {
    pub(crate) applied: Vec<StatusChange>,
    pub(crate) conflicts: Vec<String>,
    pub(crate) failed: Vec<FailedWrite>,
}

/// Published exams whose window has expired are closed. Nothing else moves:
/// drafts and closed exams are skipped, and windows are never touched.
pub(crate) fn reconcile(exams: &[ExamRecord], now: PrimitiveDateTime) -> Vec<StatusChange> {
    exams
        .iter()
        .filter(|exam| exam.status == ExamStatus::Published)
        .filter(|exam| exam.activation(now) == ActivationState::Expired)
        .map(|exam| StatusChange {
            exam_id: exam.id.clone(),
            from: ExamStatus::Published,
            to: ExamStatus::Closed,
            window_end: exam.window_end,
            observed_at: now,
        })
        .collect()
}

/// Writes each change through `store`. Exams are independent: a failed write
/// is recorded and the remaining changes are still attempted.
pub(crate) async fn apply_changes<S>(
    store: &S,
    changes: Vec<StatusChange>,
    now: PrimitiveDateTime,
) -> ReconcileReport
where
    S: ExamStatusStore + ?Sized,
{
    let mut report = ReconcileReport::default();

    for change in changes {
        match store.close_if_published(&change.exam_id, now).await {
            Ok(true) => {
                tracing::info!(
                    exam_id = %change.exam_id,
                    from = change.from.as_str(),
                    to = change.to.as_str(),
                    window_end = %change.window_end,
                    "Closed expired exam"
                );
                report.applied.push(change);
            }
            Ok(false) => {
                tracing::debug!(exam_id = %change.exam_id, "Exam status changed concurrently; skipping");
                report.conflicts.push(change.exam_id);
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::error!(exam_id = %change.exam_id, error = %error, "Failed to close exam");
                report.failed.push(FailedWrite { exam_id: change.exam_id, error });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use time::macros::datetime;
    use time::Duration;

    use super::*;
    use crate::services::target_resolver::TargetingDeclaration;

    const T0: PrimitiveDateTime = datetime!(2025-03-10 09:00:00);

    struct MemoryStore {
        statuses: Mutex<HashMap<String, ExamStatus>>,
        broken: Option<&'static str>,
    }

    impl MemoryStore {
        fn new(exams: &[ExamRecord]) -> Self {
            let statuses = exams.iter().map(|exam| (exam.id.clone(), exam.status)).collect();
            Self { statuses: Mutex::new(statuses), broken: None }
        }

        /// Every write for `exam_id` fails.
        fn failing_on(exams: &[ExamRecord], exam_id: &'static str) -> Self {
            Self { broken: Some(exam_id), ..Self::new(exams) }
        }

        fn status(&self, exam_id: &str) -> ExamStatus {
            self.statuses.lock().unwrap()[exam_id]
        }

        fn apply_to(&self, exams: &mut [ExamRecord]) {
            let statuses = self.statuses.lock().unwrap();
            for exam in exams {
                exam.status = statuses[&exam.id];
            }
        }
    }

    #[async_trait]
    impl ExamStatusStore for MemoryStore {
        async fn close_if_published(&self, exam_id: &str, _now: PrimitiveDateTime) -> Result<bool> {
            tokio::task::yield_now().await;
            if self.broken == Some(exam_id) {
                anyhow::bail!("connection reset while closing {exam_id}");
            }
            let mut statuses = self.statuses.lock().unwrap();
            match statuses.get_mut(exam_id) {
                Some(status) if *status == ExamStatus::Published => {
                    *status = ExamStatus::Closed;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn exam(id: &str, status: ExamStatus, end_offset_seconds: i64) -> ExamRecord {
        ExamRecord {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            status,
            window_start: T0,
            window_end: T0 + Duration::seconds(end_offset_seconds),
            targeting: TargetingDeclaration::unrestricted(),
        }
    }

    #[test]
    fn closes_only_published_expired_exams() {
        let exams = vec![
            exam("published-expired", ExamStatus::Published, 3600),
            exam("published-open", ExamStatus::Published, 7200),
            exam("draft-expired", ExamStatus::Draft, 3600),
            exam("closed-expired", ExamStatus::Closed, 3600),
        ];
        let now = T0 + Duration::seconds(3601);

        let changes = reconcile(&exams, now);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].exam_id, "published-expired");
        assert_eq!(changes[0].from, ExamStatus::Published);
        assert_eq!(changes[0].to, ExamStatus::Closed);
        assert_eq!(changes[0].window_end, T0 + Duration::seconds(3600));
        assert_eq!(changes[0].observed_at, now);
    }

    #[test]
    fn window_end_instant_is_still_open() {
        let exams = vec![exam("edge", ExamStatus::Published, 3600)];
        assert!(reconcile(&exams, T0 + Duration::seconds(3600)).is_empty());
    }

    #[test]
    fn inverted_window_on_published_exam_is_closed() {
        let mut broken = exam("broken", ExamStatus::Published, 3600);
        broken.window_start = T0 + Duration::hours(5);
        let changes = reconcile(&[broken], T0);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn reconcile_never_touches_windows_or_drafts() {
        let exams = vec![
            exam("a", ExamStatus::Draft, -10),
            exam("b", ExamStatus::Closed, -10),
            exam("c", ExamStatus::Published, -10),
        ];
        let before = exams.clone();
        let changes = reconcile(&exams, T0);

        assert_eq!(exams, before);
        assert!(changes.iter().all(|change| change.exam_id == "c"));
    }

    #[tokio::test]
    async fn second_run_after_apply_emits_nothing() {
        let mut exams = vec![
            exam("expired", ExamStatus::Published, 3600),
            exam("open", ExamStatus::Published, 7200),
        ];
        let now = T0 + Duration::seconds(3601);
        let store = MemoryStore::new(&exams);

        let report = apply_changes(&store, reconcile(&exams, now), now).await;
        assert_eq!(report.applied.len(), 1);
        assert!(report.conflicts.is_empty());
        assert_eq!(store.status("expired"), ExamStatus::Closed);
        assert_eq!(store.status("open"), ExamStatus::Published);

        store.apply_to(&mut exams);
        assert!(reconcile(&exams, now).is_empty());
    }

    #[tokio::test]
    async fn stale_change_is_reported_as_conflict() {
        let exams = vec![exam("expired", ExamStatus::Published, 10)];
        let now = T0 + Duration::hours(1);
        let changes = reconcile(&exams, now);

        let store = MemoryStore::new(&exams);
        store.close_if_published("expired", now).await.unwrap();

        let report = apply_changes(&store, changes, now).await;
        assert!(report.applied.is_empty());
        assert_eq!(report.conflicts, vec!["expired".to_string()]);
        assert_eq!(store.status("expired"), ExamStatus::Closed);
    }

    #[tokio::test]
    async fn concurrent_runs_write_each_exam_once() {
        let exams: Vec<_> = (0..20)
            .map(|i| exam(&format!("exam-{i}"), ExamStatus::Published, 60))
            .collect();
        let now = T0 + Duration::hours(1);
        let store = MemoryStore::new(&exams);

        let (first, second) = tokio::join!(
            apply_changes(&store, reconcile(&exams, now), now),
            apply_changes(&store, reconcile(&exams, now), now),
        );

        assert_eq!(first.applied.len() + second.applied.len(), exams.len());
        assert_eq!(first.conflicts.len() + second.conflicts.len(), exams.len());
        assert!(exams.iter().all(|exam| store.status(&exam.id) == ExamStatus::Closed));
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_remaining_changes() {
        let exams = vec![
            exam("exam-a", ExamStatus::Published, 60),
            exam("exam-b", ExamStatus::Published, 60),
            exam("exam-c", ExamStatus::Published, 60),
        ];
        let now = T0 + Duration::hours(1);
        let store = MemoryStore::failing_on(&exams, "exam-b");

        let report = apply_changes(&store, reconcile(&exams, now), now).await;

        let applied: Vec<_> = report.applied.iter().map(|change| change.exam_id.as_str()).collect();
        assert_eq!(applied, vec!["exam-a", "exam-c"]);
        assert!(report.conflicts.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].exam_id, "exam-b");
        assert!(report.failed[0].error.contains("connection reset"));
        assert_eq!(store.status("exam-b"), ExamStatus::Published);
        assert_eq!(store.status("exam-c"), ExamStatus::Closed);
    }
}
