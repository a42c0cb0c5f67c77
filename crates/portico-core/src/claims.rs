//! Session claims and the role namespace dispatch table.
//!
//! Every authenticated page lives under a folder named after the caller's
//! identity provider and application role (for example
//! `bceidbusiness/industry_user_admin`). Instead of concatenating raw claim
//! strings, the valid (provider, role) pairs are listed once in
//! [`ROLE_TABLE`]; a pair that is not in the table cannot be turned into
//! [`AuthClaims`] at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The authentication source asserted in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    /// Government staff directory.
    Idir,
    /// Business credential service.
    #[serde(rename = "bceidbusiness")]
    BceidBusiness,
}

impl IdentityProvider {
    /// Returns the wire / folder name of the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idir => "idir",
            Self::BceidBusiness => "bceidbusiness",
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityProvider {
    type Err = ClaimsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idir" => Ok(Self::Idir),
            "bceidbusiness" => Ok(Self::BceidBusiness),
            other => Err(ClaimsError::UnknownProvider(other.to_string())),
        }
    }
}

/// The application role carried in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    /// Staff administrator.
    CasAdmin,
    /// Staff analyst.
    CasAnalyst,
    /// Staff director.
    CasDirector,
    /// Staff member awaiting a role assignment.
    CasPending,
    /// Staff member with read-only access.
    CasViewOnly,
    /// Industry user.
    IndustryUser,
    /// Industry user administering their operator.
    IndustryUserAdmin,
}

impl AppRole {
    /// Returns the wire / folder name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CasAdmin => "cas_admin",
            Self::CasAnalyst => "cas_analyst",
            Self::CasDirector => "cas_director",
            Self::CasPending => "cas_pending",
            Self::CasViewOnly => "cas_view_only",
            Self::IndustryUser => "industry_user",
            Self::IndustryUserAdmin => "industry_user_admin",
        }
    }
}

impl fmt::Display for AppRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppRole {
    type Err = ClaimsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cas_admin" => Ok(Self::CasAdmin),
            "cas_analyst" => Ok(Self::CasAnalyst),
            "cas_director" => Ok(Self::CasDirector),
            "cas_pending" => Ok(Self::CasPending),
            "cas_view_only" => Ok(Self::CasViewOnly),
            "industry_user" => Ok(Self::IndustryUser),
            "industry_user_admin" => Ok(Self::IndustryUserAdmin),
            other => Err(ClaimsError::UnknownRole(other.to_string())),
        }
    }
}

/// Errors produced while validating session claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// The identity provider is not one Portico serves.
    #[error("unknown identity provider: {0}")]
    UnknownProvider(String),

    /// The application role is not one Portico serves.
    #[error("unknown application role: {0}")]
    UnknownRole(String),

    /// The role exists but is not issued by this provider.
    #[error("role {role} is not valid for identity provider {provider}")]
    ProviderMismatch {
        /// The asserted provider.
        provider: IdentityProvider,
        /// The asserted role.
        role: AppRole,
    },

    /// The user identifier is blank.
    #[error("user identifier is empty")]
    EmptyUserId,
}

/// A folder namespace selected by a valid (provider, role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleNamespace {
    provider: IdentityProvider,
    role: AppRole,
    path: &'static str,
}

impl RoleNamespace {
    /// Looks up the namespace for a (provider, role) pair.
    pub fn resolve(provider: IdentityProvider, role: AppRole) -> Result<Self, ClaimsError> {
        ROLE_TABLE
            .iter()
            .find(|ns| ns.provider == provider && ns.role == role)
            .copied()
            .ok_or(ClaimsError::ProviderMismatch { provider, role })
    }

    /// Returns the namespace path without leading or trailing slash,
    /// e.g. `idir/cas_admin`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.path
    }

    /// Returns every valid namespace.
    #[must_use]
    pub fn all() -> &'static [RoleNamespace] {
        &ROLE_TABLE
    }
}

impl fmt::Display for RoleNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path)
    }
}

const fn ns(provider: IdentityProvider, role: AppRole, path: &'static str) -> RoleNamespace {
    RoleNamespace { provider, role, path }
}

static ROLE_TABLE: [RoleNamespace; 7] = [
    ns(IdentityProvider::Idir, AppRole::CasAdmin, "idir/cas_admin"),
    ns(IdentityProvider::Idir, AppRole::CasAnalyst, "idir/cas_analyst"),
    ns(IdentityProvider::Idir, AppRole::CasDirector, "idir/cas_director"),
    ns(IdentityProvider::Idir, AppRole::CasPending, "idir/cas_pending"),
    ns(IdentityProvider::Idir, AppRole::CasViewOnly, "idir/cas_view_only"),
    ns(IdentityProvider::BceidBusiness, AppRole::IndustryUser, "bceidbusiness/industry_user"),
    ns(
        IdentityProvider::BceidBusiness,
        AppRole::IndustryUserAdmin,
        "bceidbusiness/industry_user_admin",
    ),
];

/// Validated claims extracted from a session credential.
///
/// Claims are produced once per request and never mutated. A value of this
/// type always carries a (provider, role) pair present in the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthClaims {
    namespace: RoleNamespace,
    user_id: String,
}

impl AuthClaims {
    /// Builds claims after checking the pair against the dispatch table.
    pub fn new(
        provider: IdentityProvider,
        role: AppRole,
        user_id: impl Into<String>,
    ) -> Result<Self, ClaimsError> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(ClaimsError::EmptyUserId);
        }
        let namespace = RoleNamespace::resolve(provider, role)?;
        Ok(Self { namespace, user_id })
    }

    /// Parses raw claim strings.
    pub fn parse(provider: &str, role: &str, user_id: &str) -> Result<Self, ClaimsError> {
        Self::new(provider.parse()?, role.parse()?, user_id)
    }

    /// Returns the identity provider.
    #[must_use]
    pub const fn identity_provider(&self) -> IdentityProvider {
        self.namespace.provider
    }

    /// Returns the application role.
    #[must_use]
    pub const fn app_role(&self) -> AppRole {
        self.namespace.role
    }

    /// Returns the user identifier (the provider's user GUID).
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the page namespace for these claims.
    #[must_use]
    pub const fn namespace(&self) -> RoleNamespace {
        self.namespace
    }

    /// True for business (industry) callers.
    #[must_use]
    pub fn is_industry_user(&self) -> bool {
        self.identity_provider() == IdentityProvider::BceidBusiness
    }
}
