use serde::Serialize;
use time::PrimitiveDateTime;

use crate::db::types::ExamStatus;
use crate::services::activation_clock::{self, ActivationState};
use crate::services::target_resolver::{self, IntegrityWarning, StudentFacts, TargetingDeclaration};

/// The fields of an exam the engine reads. Built from storage rows by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExamRecord {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) status: ExamStatus,
    pub(crate) window_start: PrimitiveDateTime,
    pub(crate) window_end: PrimitiveDateTime,
    pub(crate) targeting: TargetingDeclaration,
}

impl ExamRecord {
    pub(crate) fn activation(&self, now: PrimitiveDateTime) -> ActivationState {
        activation_clock::compute(now, self.window_start, self.window_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum DecisionReason {
    NotPublished,
    NotYetOpen,
    Expired,
    NotTargeted,
    Ok,
}

impl DecisionReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DecisionReason::NotPublished => "NOT_PUBLISHED",
            DecisionReason::NotYetOpen => "NOT_YET_OPEN",
            DecisionReason::Expired => "EXPIRED",
            DecisionReason::NotTargeted => "NOT_TARGETED",
            DecisionReason::Ok => "OK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct EligibilityDecision {
    pub(crate) eligible: bool,
    pub(crate) activation: ActivationState,
    pub(crate) in_audience: bool,
    pub(crate) reason: DecisionReason,
    pub(crate) warning: Option<IntegrityWarning>,
}

/// Decides whether `student` may attempt `exam` at `now`.
///
/// Exactly one reason is reported, by priority: publication status, then the
/// activation window, then targeting. The student snapshot and `now` are taken
/// by the caller so both halves of the decision describe the same moment.
pub(crate) fn decide(
    exam: &ExamRecord,
    student: &StudentFacts,
    now: PrimitiveDateTime,
) -> EligibilityDecision {
    let activation = exam.activation(now);
    let audience = target_resolver::is_in_audience(&exam.targeting, student);

    let reason = if exam.status != ExamStatus::Published {
        DecisionReason::NotPublished
    } else {
        match activation {
            ActivationState::NotYetOpen => DecisionReason::NotYetOpen,
            ActivationState::Expired => DecisionReason::Expired,
            ActivationState::Open if !audience.in_audience => DecisionReason::NotTargeted,
            ActivationState::Open => DecisionReason::Ok,
        }
    };

    EligibilityDecision {
        eligible: reason == DecisionReason::Ok,
        activation,
        in_audience: audience.in_audience,
        reason,
        warning: audience.warning,
    }
}
