//! Backend facts used by business-rule evaluation.
//!
//! These are fetched fresh for every evaluation and never cached.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a status string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Approval state of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorStatus {
    /// Registration started but not submitted.
    Draft,
    /// Submitted and awaiting review.
    Pending,
    /// Approved by staff.
    Approved,
    /// Declined by staff.
    Declined,
}

impl OperatorStatus {
    /// Returns the backend name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Declined => "Declined",
        }
    }

    /// Operations pages are reachable only for these states.
    #[must_use]
    pub const fn permits_operations(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for OperatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Declined" => Ok(Self::Declined),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// State of a user's access request to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserOperatorStatus {
    /// Access requested, awaiting the operator admin.
    Pending,
    /// Access granted.
    Approved,
    /// Access declined.
    Declined,
}

impl UserOperatorStatus {
    /// Returns the backend name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Declined => "Declined",
        }
    }
}

impl fmt::Display for UserOperatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserOperatorStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Declined" => Ok(Self::Declined),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A user's relationship to an operator, as reported by the backend.
///
/// The backend payload is accepted with either camelCase or snake_case keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRuleContext {
    /// State of the user-operator access request.
    #[serde(rename = "status")]
    pub user_operator_status: UserOperatorStatus,

    /// Operator identifier. The backend may send it as a string or a number.
    #[serde(alias = "operator_id", deserialize_with = "operator_id_text")]
    pub operator_id: String,

    /// Approval state of the operator itself.
    #[serde(alias = "operator_status")]
    pub operator_status: OperatorStatus,

    /// Legal name shown to the user.
    #[serde(alias = "operator_legal_name", default)]
    pub operator_legal_name: String,
}

impl BusinessRuleContext {
    /// Creates a context from its parts.
    #[must_use]
    pub fn new(
        user_operator_status: UserOperatorStatus,
        operator_id: impl Into<String>,
        operator_status: OperatorStatus,
        operator_legal_name: impl Into<String>,
    ) -> Self {
        Self {
            user_operator_status,
            operator_id: operator_id.into(),
            operator_status,
            operator_legal_name: operator_legal_name.into(),
        }
    }
}

fn operator_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OperatorId {
        Text(String),
        Number(u64),
    }

    Ok(match OperatorId::deserialize(deserializer)? {
        OperatorId::Text(text) => text,
        OperatorId::Number(number) => number.to_string(),
    })
}
