#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Review status of a time submission.
///
/// `Pending` is the only non-terminal state. When the `sea-orm` feature is
/// enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Waiting for a reviewer.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Accepted by a reviewer; counts towards the leaderboard.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "approved"))]
    Approved,
    /// Refused by a reviewer.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
    /// Removed for a rules violation.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "disqualified"))]
    Disqualified,
}

impl SubmissionStatus {
    /// Returns true once a reviewer has acted on the submission.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Disqualified,
    ];

    /// Returns the string representation (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Disqualified => "disqualified",
        }
    }

    /// Apply a reviewer decision, returning the resulting status.
    ///
    /// Only `Pending` submissions can be reviewed; every other state is terminal.
    pub fn review(self, decision: ReviewDecision) -> Result<SubmissionStatus, TransitionError> {
        if self.is_final() {
            return Err(TransitionError {
                from: self,
                decision,
            });
        }
        Ok(decision.target())
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// A reviewer's verdict on a pending submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Disqualify,
}

impl ReviewDecision {
    /// Status a pending submission moves to under this decision.
    pub fn target(&self) -> SubmissionStatus {
        match self {
            Self::Approve => SubmissionStatus::Approved,
            Self::Reject => SubmissionStatus::Rejected,
            Self::Disqualify => SubmissionStatus::Disqualified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Disqualify => "disqualify",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A review attempted on a submission that is no longer pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot {decision} a submission that is already {from}")]
pub struct TransitionError {
    pub from: SubmissionStatus,
    pub decision: ReviewDecision,
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status '{invalid}'. Valid values: pending, approved, rejected, disqualified")]
pub struct ParseStatusError {
    invalid: String,
}

impl FromStr for SubmissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "disqualified" => Ok(Self::Disqualified),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
