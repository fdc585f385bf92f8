#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle status of a competition event.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "draft"))]
    Draft,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "upcoming"))]
    Upcoming,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "cancelled"))]
    Cancelled,
}

/// Explicit organizer action on an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// `draft` -> `upcoming`
    Publish,
    /// `upcoming` -> `active`
    Start,
    /// `active` -> `completed`
    Complete,
    /// any non-terminal state -> `cancelled`
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot {action:?} an event that is {from}")]
pub struct EventTransitionError {
    pub from: EventStatus,
    pub action: EventAction,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Apply an organizer action.
    pub fn apply(self, action: EventAction) -> Result<EventStatus, EventTransitionError> {
        use EventAction::*;
        use EventStatus::*;

        match (self, action) {
            (Draft, Publish) => Ok(Upcoming),
            (Upcoming, Start) => Ok(Active),
            (Active, Complete) => Ok(Completed),
            (from, Cancel) if !from.is_terminal() => Ok(Cancelled),
            (from, action) => Err(EventTransitionError { from, action }),
        }
    }

    /// The status as observed at `now`: published events advance with their
    /// time window, drafts and terminal states never move on their own.
    pub fn at(self, start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> EventStatus {
        match self {
            Self::Upcoming | Self::Active => {
                if now >= end {
                    Self::Completed
                } else if now >= start {
                    Self::Active
                } else {
                    self
                }
            }
            other => other,
        }
    }

    /// Whether the event is open for submissions at `now`.
    ///
    /// Drafts, cancelled events and events completed early by an organizer
    /// are closed regardless of the clock.
    ///
    /// The window is half-open: `start` is inside, `end` is outside.
    pub fn accepts_submissions(
        self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        !matches!(self, Self::Draft | Self::Cancelled | Self::Completed) && start <= now && now < end
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
