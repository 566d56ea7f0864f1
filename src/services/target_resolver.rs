use std::collections::BTreeSet;

use serde::Serialize;

/// Targeting columns as stored on an exam. Both fields may be populated on
/// malformed records, so normalisation happens in [`TargetingDeclaration::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TargetingDeclaration {
    pub(crate) course_id: Option<String>,
    pub(crate) class_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Targeting<'a> {
    CourseBound(&'a str),
    ClassListBound(&'a BTreeSet<String>),
    Unrestricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum IntegrityWarning {
    /// Course and class list were both set; the class list was applied.
    DualTargeting,
}

impl IntegrityWarning {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            IntegrityWarning::DualTargeting => "DUAL_TARGETING",
        }
    }
}

/// Enrollment snapshot of one student, captured once per decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StudentFacts {
    pub(crate) class_id: Option<String>,
    pub(crate) course_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AudienceCheck {
    pub(crate) in_audience: bool,
    pub(crate) warning: Option<IntegrityWarning>,
}

impl TargetingDeclaration {
    pub(crate) fn is_ambiguous(&self) -> bool {
        self.course_id.is_some() && !self.class_ids.is_empty()
    }

    /// Class list wins over course when both are present.
    pub(crate) fn resolve(&self) -> (Targeting<'_>, Option<IntegrityWarning>) {
        let warning = self.is_ambiguous().then_some(IntegrityWarning::DualTargeting);

        let targeting = if !self.class_ids.is_empty() {
            Targeting::ClassListBound(&self.class_ids)
        } else if let Some(course_id) = self.course_id.as_deref() {
            Targeting::CourseBound(course_id)
        } else {
            Targeting::Unrestricted
        };

        (targeting, warning)
    }
}

impl Targeting<'_> {
    pub(crate) fn includes(&self, student: &StudentFacts) -> bool {
        match self {
            Targeting::CourseBound(course_id) => student.course_ids.contains(*course_id),
            Targeting::ClassListBound(class_ids) => {
                student.class_id.as_ref().is_some_and(|class_id| class_ids.contains(class_id))
            }
            Targeting::Unrestricted => true,
        }
    }
}

pub(crate) fn is_in_audience(
    declaration: &TargetingDeclaration,
    student: &StudentFacts,
) -> AudienceCheck {
    let (targeting, warning) = declaration.resolve();
    AudienceCheck { in_audience: targeting.includes(student), warning }
}

#[cfg(test)]
impl TargetingDeclaration {
    pub(crate) fn course(course_id: impl Into<String>) -> Self {
        Self { course_id: Some(course_id.into()), class_ids: BTreeSet::new() }
    }

    pub(crate) fn classes<I, S>(class_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { course_id: None, class_ids: class_ids.into_iter().map(Into::into).collect() }
    }

    pub(crate) fn unrestricted() -> Self {
        Self::default()
    }
}
