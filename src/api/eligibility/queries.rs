use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct ListStudentExamsQuery {
    #[serde(default)]
    pub(super) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(super) limit: i64,
    /// Filters before `skip`/`limit` apply; `total_count` then counts
    /// eligible exams only.
    #[serde(default)]
    #[serde(alias = "onlyEligible")]
    pub(super) only_eligible: bool,
}
