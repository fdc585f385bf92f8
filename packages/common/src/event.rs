//! Domain notifications emitted when submissions change.
//!
//! Delivery (websocket push, e-mail, ...) is left to whoever consumes
//! [`DomainEvent`]s; this module only defines their shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::classification::ClassificationResult;
use crate::region::Region;
use crate::submission_status::ReviewDecision;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SubmissionCreated,
    SubmissionClassified,
    SubmissionApproved,
    SubmissionRejected,
    SubmissionDisqualified,
    SubmissionWithdrawn,
}

impl NotificationKind {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::SubmissionCreated => "submission.created",
            Self::SubmissionClassified => "submission.classified",
            Self::SubmissionApproved => "submission.approved",
            Self::SubmissionRejected => "submission.rejected",
            Self::SubmissionDisqualified => "submission.disqualified",
            Self::SubmissionWithdrawn => "submission.withdrawn",
        }
    }
}

/// Typed notification payload.
pub trait Notification: Serialize + DeserializeOwned + Send + Sync {
    fn kind(&self) -> NotificationKind;
    fn event_id(&self) -> i32;
    fn submission_id(&self) -> i32;

    /// Wrap into the transport envelope.
    fn to_domain_event(&self, emitted_at: DateTime<Utc>) -> DomainEvent {
        DomainEvent {
            id: Uuid::new_v4().to_string(),
            event_id: self.event_id(),
            submission_id: self.submission_id(),
            kind: self.kind(),
            payload: serde_json::to_value(self).unwrap_or_default(),
            emitted_at,
        }
    }

    /// Recover the typed payload from an envelope.
    fn from_domain_event(e: &DomainEvent) -> Result<Self, serde_json::Error> {
        serde_json::from_value(e.payload.clone())
    }
}

/// Transport envelope `{event_id, submission_id, kind, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub event_id: i32,
    pub submission_id: i32,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        self.kind.topic()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionCreated {
    pub event_id: i32,
    pub submission_id: i32,
    pub participant_id: i32,
    pub time_text: String,
    pub region: Region,
    pub has_proof: bool,
}

impl Notification for SubmissionCreated {
    fn kind(&self) -> NotificationKind {
        NotificationKind::SubmissionCreated
    }
    fn event_id(&self) -> i32 {
        self.event_id
    }
    fn submission_id(&self) -> i32 {
        self.submission_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionClassified {
    pub event_id: i32,
    pub submission_id: i32,
    pub classification: ClassificationResult,
}

impl Notification for SubmissionClassified {
    fn kind(&self) -> NotificationKind {
        NotificationKind::SubmissionClassified
    }
    fn event_id(&self) -> i32 {
        self.event_id
    }
    fn submission_id(&self) -> i32 {
        self.submission_id
    }
}

/// A reviewer decision. `rank` and `points` are set only for approvals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReviewed {
    pub event_id: i32,
    pub submission_id: i32,
    pub participant_id: i32,
    pub decision: ReviewDecision,
    pub time_text: String,
    pub rank: Option<u32>,
    pub points: Option<i32>,
    pub notes: Option<String>,
}

impl Notification for SubmissionReviewed {
    fn kind(&self) -> NotificationKind {
        match self.decision {
            ReviewDecision::Approve => NotificationKind::SubmissionApproved,
            ReviewDecision::Reject => NotificationKind::SubmissionRejected,
            ReviewDecision::Disqualify => NotificationKind::SubmissionDisqualified,
        }
    }
    fn event_id(&self) -> i32 {
        self.event_id
    }
    fn submission_id(&self) -> i32 {
        self.submission_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionWithdrawn {
    pub event_id: i32,
    pub submission_id: i32,
    pub participant_id: i32,
}

impl Notification for SubmissionWithdrawn {
    fn kind(&self) -> NotificationKind {
        NotificationKind::SubmissionWithdrawn
    }
    fn event_id(&self) -> i32 {
        self.event_id
    }
    fn submission_id(&self) -> i32 {
        self.submission_id
    }
}
