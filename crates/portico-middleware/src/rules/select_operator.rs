//! The select-operator flow of the registration application.

use super::{segments, RuleOutcome, RuleSet};
use crate::backend::{BackendResult, RegistrationBackend};
use crate::stage::BoxFuture;
use portico_core::{BusinessRuleContext, OperatorStatus, UserOperatorStatus};

/// Keeps users who already belong to an operator out of the
/// select-operator flow.
///
/// Facts come from the current record, falling back to the pending request
/// when there is no current record.
///
/// | Facts | Outcome |
/// |---|---|
/// | user-operator Approved | redirect to `/my-operator` |
/// | user-operator Pending, or operator Draft | redirect to `/select-operator/received/request-access/{id}?title={name}` |
/// | anything else, or no record | continue |
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOperator;

impl SelectOperator {
    /// First segment of the protected family.
    pub const SEGMENT: &'static str = "select-operator";

    /// Confirmation pages under the family that stay reachable.
    pub const RECEIVED: &'static str = "received";
}

impl RuleSet for SelectOperator {
    fn name(&self) -> &'static str {
        "select_operator"
    }

    fn protects(&self, rest: &str) -> bool {
        let mut parts = segments(rest);
        parts.next() == Some(Self::SEGMENT) && parts.next() != Some(Self::RECEIVED)
    }

    fn fetch_facts<'a>(
        &'a self,
        backend: &'a dyn RegistrationBackend,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
        Box::pin(async move {
            match backend.current_user_operator(user_id).await? {
                Some(current) => Ok(Some(current)),
                None => backend.pending_user_operator(user_id).await,
            }
        })
    }

    fn decide(&self, _rest: &str, facts: Option<&BusinessRuleContext>) -> RuleOutcome {
        let Some(facts) = facts else {
            return RuleOutcome::Continue;
        };

        if facts.user_operator_status == UserOperatorStatus::Approved {
            return RuleOutcome::redirect("/my-operator");
        }

        if facts.user_operator_status == UserOperatorStatus::Pending
            || facts.operator_status == OperatorStatus::Draft
        {
            let path = format!(
                "/{}/{}/request-access/{}",
                Self::SEGMENT,
                Self::RECEIVED,
                facts.operator_id
            );
            return RuleOutcome::redirect_with_query(
                path,
                [("title", facts.operator_legal_name.as_str())],
            );
        }

        RuleOutcome::Continue
    }
}
