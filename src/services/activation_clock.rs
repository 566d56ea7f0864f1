use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// Time-window openness of an exam, derived from the clock only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ActivationState {
    NotYetOpen,
    Open,
    Expired,
}

impl ActivationState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ActivationState::NotYetOpen => "NOT_YET_OPEN",
            ActivationState::Open => "OPEN",
            ActivationState::Expired => "EXPIRED",
        }
    }
}

/// Both window bounds are inclusive. A window whose start is after its end is
/// never open.
pub(crate) fn compute(
    now: PrimitiveDateTime,
    window_start: PrimitiveDateTime,
    window_end: PrimitiveDateTime,
) -> ActivationState {
    if window_start > window_end {
        return ActivationState::Expired;
    }

    if now < window_start {
        ActivationState::NotYetOpen
    } else if now > window_end {
        ActivationState::Expired
    } else {
        ActivationState::Open
    }
}
