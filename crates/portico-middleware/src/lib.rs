//! # Portico Middleware
//!
//! The request routing layer: an ordered chain of stages that turns every
//! inbound request into exactly one [`RouteDecision`](portico_core::RouteDecision).
//!
//! ```text
//! Request → Authorization ──→ BusinessRules ──→ Response → terminal
//!               │                  │                          │
//!               ├ Redirect(onboarding)                        ├ Rewrite(role path)
//!               └ PassThrough (onboarding, exempt prefix)     └ PassThrough
//!                                  └ Redirect(rule / fail-safe)
//! ```
//!
//! | Stage | Purpose |
//! |-------|---------|
//! | [`AuthorizationStage`] | Skip exempt routes, resolve the session, apply the allow-list, record the role rewrite |
//! | [`BusinessRuleStage`] | Fetch backend facts and redirect where they forbid the path |
//! | [`ResponseStage`] | Attach `cache-control` and `x-request-id` |
//!
//! ## Example
//!
//! ```ignore
//! use portico_middleware::{AppProfile, StageContext, SessionTokenResolver, HttpRegistrationBackend};
//!
//! let chain = AppProfile::administration().build_chain(
//!     Arc::new(SessionTokenResolver::new(secret)),
//!     Arc::new(HttpRegistrationBackend::new(api_url, timeout)?),
//! );
//!
//! let mut ctx = StageContext::new();
//! let response = chain.process(&mut ctx, &request).await;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod chain;
pub mod context;
pub mod paths;
pub mod profile;
pub mod rules;
pub mod stage;
pub mod stages;
pub mod token;

pub use backend::{BackendError, BackendResult, HttpRegistrationBackend, InMemoryBackend, RegistrationBackend};
pub use chain::{BoxedStage, StageChain, StageChainBuilder};
pub use context::StageContext;
pub use profile::AppProfile;
pub use rules::{OperationsAccess, RuleOutcome, RuleSet, SelectOperator};
pub use stage::{BoxFuture, Next, Stage};
pub use stages::{AuthorizationStage, BusinessRuleStage, ResponseStage};
pub use token::{SessionClaims, SessionError, SessionTokenResolver, StaticTokenResolver, TokenResolver};
