//! Per-application business rules.
//!
//! Each hosting application contributes at most one [`RuleSet`]. A rule set
//! names its protected path family, knows which backend facts it needs and
//! owns a pure decision table over those facts. The
//! [`BusinessRuleStage`](crate::stages::BusinessRuleStage) supplies the
//! plumbing: claims, timeouts, fail-safe redirects and URL materialisation.
//!
//! Paths handed to a rule set are app-relative (the base path is stripped)
//! and redirect targets are app-relative too.

mod operations;
mod select_operator;

pub use operations::OperationsAccess;
pub use select_operator::SelectOperator;

use crate::backend::{BackendResult, RegistrationBackend};
use crate::stage::BoxFuture;
use portico_core::BusinessRuleContext;

/// What a rule set decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The path is consistent with the facts.
    Continue,
    /// Send the caller elsewhere.
    Redirect {
        /// App-relative target path.
        path: String,
        /// Encoded query string, without `?`.
        query: Option<String>,
    },
}

impl RuleOutcome {
    /// A redirect to an app-relative path.
    #[must_use]
    pub fn redirect(path: impl Into<String>) -> Self {
        Self::Redirect {
            path: path.into(),
            query: None,
        }
    }

    /// A redirect carrying encoded query parameters.
    #[must_use]
    pub fn redirect_with_query<'p>(
        path: impl Into<String>,
        params: impl IntoIterator<Item = (&'p str, &'p str)>,
    ) -> Self {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        Self::Redirect {
            path: path.into(),
            query: (!query.is_empty()).then_some(query),
        }
    }
}

/// A protected path family plus its decision table.
pub trait RuleSet: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// True when `rest` (app-relative) belongs to the protected family.
    fn protects(&self, rest: &str) -> bool;

    /// Fetches the facts the decision table needs.
    fn fetch_facts<'a>(
        &'a self,
        backend: &'a dyn RegistrationBackend,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>>;

    /// Applies the decision table. `facts` is `None` when the user has no
    /// record at all.
    fn decide(&self, rest: &str, facts: Option<&BusinessRuleContext>) -> RuleOutcome;
}

/// App-relative path segments, skipping empties.
pub(crate) fn segments(rest: &str) -> impl Iterator<Item = &str> {
    rest.split('/').filter(|s| !s.is_empty())
}
