use axum::extract::{Path, Query, State};
use axum::Json;
use time::PrimitiveDateTime;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::Exam;
use crate::repositories;
use crate::schemas::eligibility::{DecideRequest, DecisionResponse};
use crate::services::eligibility::{self, EligibilityDecision, ExamRecord};
use crate::services::target_resolver::StudentFacts;

use super::queries::ListStudentExamsQuery;

pub(super) async fn decide(
    Json(payload): Json<DecideRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = payload.now.map(to_primitive_utc).unwrap_or_else(primitive_now_utc);
    let exam = payload.exam.to_record();
    let student = payload.student.to_facts();

    let decision = observe_decision(&exam, &student, now, None);
    Ok(Json(DecisionResponse::new(&exam, decision, now)))
}

pub(super) async fn exam_eligibility(
    Path((exam_id, student_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let student = repositories::students::load_facts(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student enrollment"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let now = primitive_now_utc();
    let record = exam.to_record();
    let decision = observe_decision(&record, &student, now, Some(&student_id));

    Ok(Json(
        DecisionResponse::new(&record, decision, now)
            .with_title(exam.title)
            .with_student(student_id),
    ))
}

/// Published exams with the student's decision, ordered by window start.
/// With `only_eligible` the filter runs over every published exam before
/// paging, so `total_count` is the number of eligible exams.
pub(super) async fn list_student_exams(
    Path(student_id): Path<String>,
    Query(params): Query<ListStudentExamsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<DecisionResponse>>, ApiError> {
    let (skip, limit) = pagination::normalize(params.skip, params.limit);

    let student = repositories::students::load_facts(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student enrollment"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let now = primitive_now_utc();
    let respond = |exam: Exam, record: &ExamRecord, decision: EligibilityDecision| {
        DecisionResponse::new(record, decision, now)
            .with_title(exam.title)
            .with_student(student_id.clone())
    };

    if !params.only_eligible {
        let exams = repositories::exams::list_published(state.db(), skip, limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
        let total_count = repositories::exams::count_published(state.db())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;

        let items = exams
            .into_iter()
            .map(|exam| {
                let record = exam.to_record();
                let decision = observe_decision(&record, &student, now, Some(&student_id));
                respond(exam, &record, decision)
            })
            .collect();
        return Ok(Json(PaginatedResponse { items, total_count, skip, limit }));
    }

    let mut eligible = Vec::new();
    let mut after_id: Option<String> = None;
    loop {
        let page = repositories::exams::list_published_page(
            state.db(),
            after_id.as_deref(),
            repositories::exams::MAX_PAGE_SIZE,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
        let Some(last) = page.last() else {
            break;
        };
        after_id = Some(last.id.clone());
        let full_page = page.len() as i64 == repositories::exams::MAX_PAGE_SIZE;

        for exam in page {
            let record = exam.to_record();
            let decision = observe_decision(&record, &student, now, Some(&student_id));
            if decision.eligible {
                eligible.push((exam, record, decision));
            }
        }

        if !full_page {
            break;
        }
    }

    eligible.sort_by(|(a, ..), (b, ..)| (a.window_start, &a.id).cmp(&(b.window_start, &b.id)));
    let total_count = eligible.len() as i64;
    let items = eligible
        .into_iter()
        .skip(skip as usize)
        .take(limit as usize)
        .map(|(exam, record, decision)| respond(exam, &record, decision))
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

fn observe_decision(
    exam: &ExamRecord,
    student: &StudentFacts,
    now: PrimitiveDateTime,
    student_id: Option<&str>,
) -> EligibilityDecision {
    let decision = eligibility::decide(exam, student, now);

    if let Some(warning) = decision.warning {
        tracing::warn!(
            exam_id = %exam.id,
            owner_id = %exam.owner_id,
            warning = warning.as_str(),
            "Exam declares both a course and a class list; class list applied"
        );
        metrics::counter!("targeting_integrity_warnings_total").increment(1);
    }

    tracing::debug!(
        exam_id = %exam.id,
        student_id = student_id.unwrap_or("-"),
        eligible = decision.eligible,
        activation = decision.activation.as_str(),
        reason = decision.reason.as_str(),
        "Eligibility decided"
    );
    metrics::counter!("eligibility_decisions_total", "reason" => decision.reason.as_str())
        .increment(1);

    decision
}
