use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::core::time::{format_primitive, to_primitive_utc};
use crate::db::types::ExamStatus;
use crate::services::activation_clock::ActivationState;
use crate::services::eligibility::{DecisionReason, EligibilityDecision, ExamRecord};
use crate::services::target_resolver::{IntegrityWarning, StudentFacts, TargetingDeclaration};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamInput {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub(crate) id: String,
    #[serde(default, alias = "ownerId")]
    pub(crate) owner_id: String,
    pub(crate) status: ExamStatus,
    #[serde(alias = "windowStart", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) window_start: OffsetDateTime,
    #[serde(alias = "windowEnd", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) window_end: OffsetDateTime,
    #[serde(default, alias = "courseId")]
    pub(crate) course_id: Option<String>,
    #[serde(default, alias = "classIds")]
    pub(crate) class_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StudentInput {
    #[serde(default, alias = "classId")]
    pub(crate) class_id: Option<String>,
    #[serde(default, alias = "courseIds")]
    pub(crate) course_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct DecideRequest {
    #[validate(nested)]
    pub(crate) exam: ExamInput,
    #[serde(default)]
    pub(crate) student: StudentInput,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) now: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DecisionResponse {
    pub(crate) exam_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_id: Option<String>,
    pub(crate) eligible: bool,
    pub(crate) activation: ActivationState,
    pub(crate) in_audience: bool,
    pub(crate) reason: DecisionReason,
    pub(crate) warning: Option<IntegrityWarning>,
    pub(crate) window_start: String,
    pub(crate) window_end: String,
    pub(crate) evaluated_at: String,
}

impl ExamInput {
    pub(crate) fn to_record(&self) -> ExamRecord {
        ExamRecord {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            status: self.status,
            window_start: to_primitive_utc(self.window_start),
            window_end: to_primitive_utc(self.window_end),
            targeting: TargetingDeclaration {
                course_id: self.course_id.clone(),
                class_ids: self.class_ids.iter().cloned().collect(),
            },
        }
    }
}

impl StudentInput {
    pub(crate) fn to_facts(&self) -> StudentFacts {
        StudentFacts {
            class_id: self.class_id.clone(),
            course_ids: self.course_ids.iter().cloned().collect(),
        }
    }
}

impl DecisionResponse {
    pub(crate) fn new(
        exam: &ExamRecord,
        decision: EligibilityDecision,
        evaluated_at: PrimitiveDateTime,
    ) -> Self {
        Self {
            exam_id: exam.id.clone(),
            title: None,
            student_id: None,
            eligible: decision.eligible,
            activation: decision.activation,
            in_audience: decision.in_audience,
            reason: decision.reason,
            warning: decision.warning,
            window_start: format_primitive(exam.window_start),
            window_end: format_primitive(exam.window_end),
            evaluated_at: format_primitive(evaluated_at),
        }
    }

    pub(crate) fn with_title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    pub(crate) fn with_student(mut self, student_id: String) -> Self {
        self.student_id = Some(student_id);
        self
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Naive timestamps are read as UTC.
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }
    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}
