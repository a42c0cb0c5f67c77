//! # Portico Core
//!
//! Core types shared by every crate in the Portico routing layer.
//!
//! Portico runs in front of every page of the registration applications and
//! decides, per request, whether the caller is authenticated, which role- and
//! provider-specific page tree serves them, and whether backend business
//! rules allow the requested path.
//!
//! This crate provides the vocabulary those decisions are expressed in:
//!
//! - [`AuthClaims`] - Validated session claims (provider, role, user id)
//! - [`IdentityProvider`] / [`AppRole`] - Finite enumerations keyed into the
//!   role namespace dispatch table
//! - [`RouteRequest`] - The read-only view of an inbound request
//! - [`RouteDecision`] / [`RouteResponse`] - The single terminal outcome
//! - [`BusinessRuleContext`] - Backend facts about a user's operator access
//! - [`PorticoError`] - The error taxonomy

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod claims;
mod error;
mod facts;
mod request_id;
mod route;

pub use claims::{AppRole, AuthClaims, ClaimsError, IdentityProvider, RoleNamespace};
pub use error::{ErrorCategory, PorticoError, PorticoResult};
pub use facts::{BusinessRuleContext, OperatorStatus, UnknownStatus, UserOperatorStatus};
pub use request_id::RequestId;
pub use route::{join_path, RouteDecision, RouteRequest, RouteResponse, REQUEST_ID_HEADER};
