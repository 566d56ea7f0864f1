pub(crate) mod activation_clock;
pub(crate) mod activation_reconciler;
pub(crate) mod eligibility;
pub(crate) mod target_resolver;
