use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::ExamStatus;
use crate::services::eligibility::ExamRecord;
use crate::services::target_resolver::TargetingDeclaration;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) title: String,
    pub(crate) status: ExamStatus,
    pub(crate) window_start: PrimitiveDateTime,
    pub(crate) window_end: PrimitiveDateTime,
    pub(crate) course_id: Option<String>,
    pub(crate) class_ids: Vec<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) closed_at: Option<PrimitiveDateTime>,
}

impl Exam {
    /// Targeting columns are copied as stored; ambiguity is left for the
    /// resolver to detect.
    pub(crate) fn to_record(&self) -> ExamRecord {
        ExamRecord {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            status: self.status,
            window_start: self.window_start,
            window_end: self.window_end,
            targeting: TargetingDeclaration {
                course_id: self.course_id.clone(),
                class_ids: self.class_ids.iter().cloned().collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Student {
    pub(crate) id: String,
    pub(crate) full_name: String,
    pub(crate) class_id: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
