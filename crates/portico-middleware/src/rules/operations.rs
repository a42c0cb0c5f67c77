//! Operations access for the administration application.

use super::{segments, RuleOutcome, RuleSet};
use crate::backend::{BackendResult, RegistrationBackend};
use crate::stage::BoxFuture;
use portico_core::BusinessRuleContext;

/// Operations pages require an operator that is Pending or Approved.
///
/// | Facts | Outcome |
/// |---|---|
/// | no record | redirect to app root |
/// | operator Draft / Declined | redirect to app root |
/// | operator Pending / Approved | continue |
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationsAccess;

impl OperationsAccess {
    /// The protected segment.
    pub const SEGMENT: &'static str = "operations";
}

impl RuleSet for OperationsAccess {
    fn name(&self) -> &'static str {
        "operations_access"
    }

    fn protects(&self, rest: &str) -> bool {
        segments(rest).any(|s| s == Self::SEGMENT)
    }

    fn fetch_facts<'a>(
        &'a self,
        backend: &'a dyn RegistrationBackend,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
        backend.current_user_operator(user_id)
    }

    fn decide(&self, _rest: &str, facts: Option<&BusinessRuleContext>) -> RuleOutcome {
        match facts {
            Some(facts) if facts.operator_status.permits_operations() => RuleOutcome::Continue,
            _ => RuleOutcome::redirect("/"),
        }
    }
}
