//! Gate in front of submission persistence.
//!
//! Rules are checked in a fixed order and the first failure wins. The window,
//! proof, region and limit rules are checked again by
//! [`Store::insert_submission_within_limit`] against the locked event, which
//! is what holds under concurrency. The early check only gives the caller the
//! right error before the proof is looked at.

use chrono::{DateTime, Utc};
use common::event::SubmissionCreated;
use common::race_time::{self, DecodeError};
use common::{Region, RegionConstraint};
use thiserror::Error;
use tracing::{info, instrument};

use super::classification::{PendingClassification, spawn_annotation};
use crate::config::ClassificationMode;
use crate::state::AppState;
use crate::store::{Event, NewSubmission, Store, StoreError, Submission};
use crate::utils::media;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Event is not accepting submissions")]
    EventNotActive,
    #[error("You must join the event before submitting")]
    NotParticipating,
    #[error("Maximum of {max} submissions reached for this event")]
    SubmissionLimitReached { max: u32 },
    #[error("This event requires a proof image")]
    ProofRequired,
    #[error(transparent)]
    InvalidTimeFormat(#[from] DecodeError),
    #[error("Region {region} is not allowed in this event ({allowed:?} only)")]
    RegionMismatch {
        region: Region,
        allowed: RegionConstraint,
    },
    #[error("{0}")]
    InvalidProof(String),
    #[error(transparent)]
    Store(StoreError),
}

impl AdmissionError {
    /// Machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EventNotActive => "EVENT_NOT_ACTIVE",
            Self::NotParticipating => "NOT_PARTICIPATING",
            Self::SubmissionLimitReached { .. } => "SUBMISSION_LIMIT_REACHED",
            Self::ProofRequired => "PROOF_REQUIRED",
            Self::InvalidTimeFormat(_) => "INVALID_TIME_FORMAT",
            Self::RegionMismatch { .. } => "REGION_MISMATCH",
            Self::InvalidProof(_) => "VALIDATION_ERROR",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LimitReached { max } => Self::SubmissionLimitReached { max },
            StoreError::NotParticipating => Self::NotParticipating,
            // The event changed or disappeared between the check and the insert.
            StoreError::NotFound("event") | StoreError::EventClosed => Self::EventNotActive,
            StoreError::ProofRequired => Self::ProofRequired,
            StoreError::RegionMismatch { region, allowed } => Self::RegionMismatch { region, allowed },
            other => Self::Store(other),
        }
    }
}

/// A candidate submission as received from a participant.
#[derive(Clone, Debug)]
pub struct SubmissionRequest {
    pub event_id: i32,
    pub participant_id: i32,
    pub declared_time: String,
    pub region: Region,
    pub proof_image: Option<String>,
    pub notes: Option<String>,
}

/// A request that passed every rule.
#[derive(Debug)]
pub struct Admitted {
    pub event: Event,
    pub time_ms: u64,
}

/// Run the admission rules against the current store state.
pub async fn check(
    store: &dyn Store,
    now: DateTime<Utc>,
    req: &SubmissionRequest,
) -> Result<Admitted, AdmissionError> {
    let event = store
        .find_event(req.event_id)
        .await?
        .filter(|e| e.accepts_submissions(now))
        .ok_or(AdmissionError::EventNotActive)?;

    if !store
        .is_participant(req.event_id, req.participant_id)
        .await?
    {
        return Err(AdmissionError::NotParticipating);
    }

    let count = store
        .count_submissions(req.event_id, req.participant_id)
        .await?;
    if count >= event.max_submissions {
        return Err(AdmissionError::SubmissionLimitReached {
            max: event.max_submissions,
        });
    }

    let has_proof = req
        .proof_image
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    if event.proof_required && !has_proof {
        return Err(AdmissionError::ProofRequired);
    }

    let time_ms = race_time::decode(req.declared_time.trim())?;

    if !event.region.allows(req.region) {
        return Err(AdmissionError::RegionMismatch {
            region: req.region,
            allowed: event.region,
        });
    }

    Ok(Admitted { event, time_ms })
}

/// Admit and persist a submission, then classify its proof.
///
/// In inline mode the classification result is stored with the submission;
/// in background mode it is attached by a spawned task after this returns.
#[instrument(
    skip(state, req),
    fields(event_id = req.event_id, user_id = req.participant_id)
)]
pub async fn submit(state: &AppState, req: SubmissionRequest) -> Result<Submission, AdmissionError> {
    let now = state.clock.now();
    let Admitted { event, time_ms } = check(state.store.as_ref(), now, &req).await?;

    let proof = match req.proof_image.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            let path = media::resolve_proof(&state.config.submission.media_root, name)
                .map_err(|e| AdmissionError::InvalidProof(e.to_string()))?;
            Some((name.to_string(), path))
        }
        _ => None,
    };

    let mode = state.config.submission.classification_mode;
    let classification = match (&proof, mode) {
        (Some((_, path)), ClassificationMode::Inline) => {
            Some(state.classifier.classify(path, time_ms).await)
        }
        _ => None,
    };

    let submission = state
        .store
        .insert_submission_within_limit(NewSubmission {
            event_id: event.id,
            participant_id: req.participant_id,
            time_ms,
            proof_image: proof.as_ref().map(|(name, _)| name.clone()),
            classification,
            region: req.region,
            notes: req.notes,
            created_at: now,
        })
        .await?;

    info!(
        submission_id = submission.id,
        time = %submission.time_text,
        "Submission admitted"
    );

    if let (Some((_, path)), ClassificationMode::Background) = (proof, mode) {
        spawn_annotation(
            state.classifier.clone(),
            state.store.clone(),
            state.notifier.clone(),
            PendingClassification {
                event_id: submission.event_id,
                submission_id: submission.id,
                image: path,
                declared_ms: submission.time_ms,
            },
        );
    }

    state
        .notifier
        .emit(&SubmissionCreated {
            event_id: submission.event_id,
            submission_id: submission.id,
            participant_id: submission.participant_id,
            time_text: submission.time_text.clone(),
            region: submission.region,
            has_proof: submission.proof_image.is_some(),
        })
        .await;

    Ok(submission)
}
