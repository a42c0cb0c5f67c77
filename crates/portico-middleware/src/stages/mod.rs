//! The routing stages.
//!
//! Every application chain runs, in order:
//!
//! 1. [`authorization`] - session gate, allow-list and role rewrite
//! 2. [`business_rules`] - backend-driven redirects (only where the
//!    application has a rule set)
//! 3. [`response`] - response headers

pub mod authorization;
pub mod business_rules;
pub mod response;

pub use authorization::AuthorizationStage;
pub use business_rules::BusinessRuleStage;
pub use response::ResponseStage;
