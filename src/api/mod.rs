pub(crate) mod eligibility;
pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
