//! Persistence boundary.
//!
//! Handlers and services only talk to [`Store`]. Two implementations exist:
//! [`postgres::PgStore`] on SeaORM and [`memory::MemoryStore`] for
//! database-less runs and tests. Both provide the two atomic operations the
//! competition depends on: insert-if-below-limit for admission and
//! review-and-rerank for approvals.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ranking::{self, RankCandidate};
use common::submission_status::TransitionError;
use common::{
    ClassificationResult, EventAction, EventStatus, LeaderboardEntry, Region, RegionConstraint,
    ReviewDecision, ScoringPolicy, SubmissionStatus,
};
use common::event_status::EventTransitionError;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("participant is not registered for this event")]
    NotParticipating,
    #[error("submission limit of {max} reached")]
    LimitReached { max: u32 },
    #[error("event is not accepting submissions")]
    EventClosed,
    #[error("event requires a proof image")]
    ProofRequired,
    #[error("region {region} is not allowed ({allowed:?} only)")]
    RegionMismatch {
        region: Region,
        allowed: RegionConstraint,
    },
    #[error("submission is already {0}")]
    NotPending(SubmissionStatus),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    EventTransition(#[from] EventTransitionError),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Game metadata shown alongside an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GameInfo {
    #[schema(example = "Super Mario 64")]
    pub name: String,
    #[schema(example = "Bob-omb Battlefield")]
    pub stage: String,
    /// One of `Any%`, `100%`, `Glitchless`, `Custom`.
    #[serde(default = "default_category")]
    #[schema(example = "Any%")]
    pub category: String,
}

/// Run categories an event can be held in.
pub const CATEGORIES: &[&str] = &["Any%", "100%", "Glitchless", "Custom"];

fn default_category() -> String {
    CATEGORIES[0].to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub game: GameInfo,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub region: RegionConstraint,
    pub proof_required: bool,
    pub max_submissions: u32,
    pub scoring: ScoringPolicy,
    /// Status as last set by an organizer; see [`Event::status_at`].
    pub status: EventStatus,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub featured: bool,
    pub tags: Vec<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn status_at(&self, now: DateTime<Utc>) -> EventStatus {
        self.status.at(self.start_time, self.end_time, now)
    }

    pub fn accepts_submissions(&self, now: DateTime<Utc>) -> bool {
        self.status
            .accepts_submissions(self.start_time, self.end_time, now)
    }

    /// Rules checked against the locked event row when a submission is stored.
    pub fn admits(&self, new: &NewSubmission) -> Result<(), StoreError> {
        if !self.accepts_submissions(new.created_at) {
            return Err(StoreError::EventClosed);
        }
        if self.proof_required && new.proof_image.is_none() {
            return Err(StoreError::ProofRequired);
        }
        if !self.region.allows(new.region) {
            return Err(StoreError::RegionMismatch {
                region: new.region,
                allowed: self.region,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub game: GameInfo,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub region: RegionConstraint,
    pub proof_required: bool,
    pub max_submissions: u32,
    pub scoring: ScoringPolicy,
    pub status: EventStatus,
    pub featured: bool,
    pub tags: Vec<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

/// Partial update of event metadata. Absent fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub game: Option<GameInfo>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub region: Option<RegionConstraint>,
    pub proof_required: Option<bool>,
    pub max_submissions: Option<u32>,
    pub scoring: Option<ScoringPolicy>,
    pub featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl EventPatch {
    /// Whether the patch touches rules that existing submissions were admitted under.
    pub fn changes_rules(&self) -> bool {
        self.start_time.is_some()
            || self.end_time.is_some()
            || self.region.is_some()
            || self.proof_required.is_some()
            || self.max_submissions.is_some()
            || self.scoring.is_some()
    }

    pub(crate) fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(game) = self.game {
            event.game = game;
        }
        if let Some(start_time) = self.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            event.end_time = end_time;
        }
        if let Some(region) = self.region {
            event.region = region;
        }
        if let Some(proof_required) = self.proof_required {
            event.proof_required = proof_required;
        }
        if let Some(max_submissions) = self.max_submissions {
            event.max_submissions = max_submissions;
        }
        if let Some(scoring) = self.scoring {
            event.scoring = scoring;
        }
        if let Some(featured) = self.featured {
            event.featured = featured;
        }
        if let Some(tags) = self.tags {
            event.tags = tags;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub event_id: i32,
    pub user_id: i32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub id: i32,
    pub event_id: i32,
    pub participant_id: i32,
    pub time_ms: u64,
    pub time_text: String,
    pub proof_image: Option<String>,
    pub classification: Option<ClassificationResult>,
    pub status: SubmissionStatus,
    pub region: Region,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub rank: Option<u32>,
    pub points: Option<i32>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    fn rank_candidate(&self) -> Option<RankCandidate> {
        match (self.status, self.reviewed_at) {
            (SubmissionStatus::Approved, Some(approved_at)) => Some(RankCandidate {
                submission_id: self.id,
                participant_id: self.participant_id,
                time_ms: self.time_ms,
                region: self.region,
                approved_at,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewSubmission {
    pub event_id: i32,
    pub participant_id: i32,
    pub time_ms: u64,
    pub proof_image: Option<String>,
    pub classification: Option<ClassificationResult>,
    pub region: Region,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A reviewer decision about to be applied.
#[derive(Clone, Debug)]
pub struct Review {
    pub submission_id: i32,
    pub decision: ReviewDecision,
    pub reviewer_id: i32,
    pub admin_notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ReviewOutcome {
    pub submission: Submission,
    /// The rebuilt leaderboard, present only when an approval changed it.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct SubmissionStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub disqualified: u64,
}

impl SubmissionStats {
    pub(crate) fn add(&mut self, status: SubmissionStatus, n: u64) {
        self.total += n;
        match status {
            SubmissionStatus::Pending => self.pending += n,
            SubmissionStatus::Approved => self.approved += n,
            SubmissionStatus::Rejected => self.rejected += n,
            SubmissionStatus::Disqualified => self.disqualified += n,
        }
    }
}

/// A page of pending submissions, oldest first.
#[derive(Clone, Debug)]
pub struct PendingPage {
    pub items: Vec<Submission>,
    pub total: u64,
}

/// Rebuild the leaderboard for one event's submissions.
///
/// Returns the new entries; callers write them to the event and mirror
/// rank/points onto every approved submission.
pub(crate) fn rerank<'a>(
    submissions: impl IntoIterator<Item = &'a Submission>,
    policy: &ScoringPolicy,
) -> Vec<LeaderboardEntry> {
    let candidates = submissions
        .into_iter()
        .filter_map(Submission::rank_candidate)
        .collect();
    ranking::recompute(candidates, policy)
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_event(&self, new: NewEvent) -> Result<Event, StoreError>;

    async fn find_event(&self, id: i32) -> Result<Option<Event>, StoreError>;

    /// Events ordered by start time. `status` filters on the stored status.
    async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, StoreError>;

    /// Rule changes are refused with `Conflict` once submissions exist.
    async fn update_event(
        &self,
        id: i32,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError>;

    async fn apply_event_action(
        &self,
        id: i32,
        action: EventAction,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError>;

    /// Refused with `Conflict` while any submission references the event.
    async fn delete_event(&self, id: i32) -> Result<(), StoreError>;

    /// `Conflict` when already registered.
    async fn join_event(
        &self,
        event_id: i32,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Participant, StoreError>;

    /// Refused with `Conflict` once the participant has submissions.
    async fn leave_event(&self, event_id: i32, user_id: i32) -> Result<(), StoreError>;

    async fn is_participant(&self, event_id: i32, user_id: i32) -> Result<bool, StoreError>;

    async fn list_participants(&self, event_id: i32) -> Result<Vec<Participant>, StoreError>;

    async fn count_submissions(&self, event_id: i32, user_id: i32) -> Result<u32, StoreError>;

    /// Insert a pending submission if the participant is still registered, the
    /// event still [`admits`](Event::admits) it and the participant has fewer
    /// than the event's `max_submissions`.
    ///
    /// The count and the insert are one atomic step per (event, participant).
    /// Holds the event shared, so rule changes and deletion wait for it.
    async fn insert_submission_within_limit(
        &self,
        new: NewSubmission,
    ) -> Result<Submission, StoreError>;

    async fn find_submission(&self, id: i32) -> Result<Option<Submission>, StoreError>;

    /// A participant's submissions for an event, newest first.
    async fn list_participant_submissions(
        &self,
        event_id: i32,
        user_id: i32,
    ) -> Result<Vec<Submission>, StoreError>;

    /// Review queue, optionally scoped to one event.
    async fn list_pending(
        &self,
        event_id: Option<i32>,
        offset: u64,
        limit: u64,
    ) -> Result<PendingPage, StoreError>;

    /// Annotate a pending submission with its classification result. Never
    /// changes the declared time or the status. `NotPending` once reviewed.
    async fn set_classification(
        &self,
        id: i32,
        result: ClassificationResult,
    ) -> Result<Submission, StoreError>;

    /// Only allowed while pending.
    async fn update_notes(&self, id: i32, notes: Option<String>) -> Result<Submission, StoreError>;

    /// Remove a pending submission, freeing its slot under the limit.
    async fn withdraw_submission(&self, id: i32) -> Result<Submission, StoreError>;

    /// Apply a reviewer decision. On approval the event leaderboard is
    /// rebuilt and every approved submission's rank and points rewritten in
    /// the same atomic unit. Approvals for one event are serialized.
    async fn apply_review(&self, review: Review) -> Result<ReviewOutcome, StoreError>;

    async fn submission_stats(&self, event_id: i32) -> Result<SubmissionStats, StoreError>;
}
