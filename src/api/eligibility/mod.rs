mod handlers;
mod queries;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/eligibility/decide", post(handlers::decide))
        .route("/exams/:exam_id/eligibility/:student_id", get(handlers::exam_eligibility))
        .route("/students/:student_id/exams", get(handlers::list_student_exams))
}
