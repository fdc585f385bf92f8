//! Reviewer decisions on submissions and the participant-side edits allowed
//! while a submission is still pending.

use common::ReviewDecision;
use common::event::{SubmissionReviewed, SubmissionWithdrawn};
use thiserror::Error;
use tracing::{info, instrument};

use crate::extractors::auth::AuthUser;
use crate::state::AppState;
use crate::store::{Review, ReviewOutcome, StoreError, Submission};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Only reviewers can review submissions")]
    NotReviewer,
    #[error("{0}")]
    InvalidNotes(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Who is acting on a submission.
#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub user_id: i32,
    pub is_reviewer: bool,
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.user_id,
            is_reviewer: user.is_reviewer(),
        }
    }
}

fn check_notes_len(notes: Option<&str>, max: usize) -> Result<(), LifecycleError> {
    match notes {
        Some(n) if n.chars().count() > max => Err(LifecycleError::InvalidNotes(format!(
            "Notes must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Apply a reviewer decision.
///
/// Nothing is written unless the actor is a reviewer and the submission is
/// still pending. On approval the leaderboard is rebuilt by the store in the
/// same atomic step.
#[instrument(skip(state, admin_notes), fields(user_id = actor.user_id, decision = decision.as_str()))]
pub async fn review(
    state: &AppState,
    actor: Actor,
    submission_id: i32,
    decision: ReviewDecision,
    admin_notes: Option<String>,
) -> Result<ReviewOutcome, LifecycleError> {
    if !actor.is_reviewer {
        return Err(LifecycleError::NotReviewer);
    }
    check_notes_len(admin_notes.as_deref(), state.config.submission.max_notes_len)?;

    let outcome = state
        .store
        .apply_review(Review {
            submission_id,
            decision,
            reviewer_id: actor.user_id,
            admin_notes,
            reviewed_at: state.clock.now(),
        })
        .await?;

    let sub = &outcome.submission;
    info!(
        event_id = sub.event_id,
        submission_id = sub.id,
        status = %sub.status,
        rank = sub.rank,
        "Submission reviewed"
    );

    state
        .notifier
        .emit(&SubmissionReviewed {
            event_id: sub.event_id,
            submission_id: sub.id,
            participant_id: sub.participant_id,
            decision,
            time_text: sub.time_text.clone(),
            rank: sub.rank,
            points: sub.points,
            notes: sub.admin_notes.clone(),
        })
        .await;

    Ok(outcome)
}

/// Replace the participant notes on a pending submission.
pub async fn update_notes(
    state: &AppState,
    submission_id: i32,
    notes: Option<String>,
) -> Result<Submission, LifecycleError> {
    check_notes_len(notes.as_deref(), state.config.submission.max_notes_len)?;
    Ok(state.store.update_notes(submission_id, notes).await?)
}

/// Withdraw a pending submission. The slot under the event's limit is freed.
#[instrument(skip(state))]
pub async fn withdraw(state: &AppState, submission_id: i32) -> Result<Submission, LifecycleError> {
    let removed = state.store.withdraw_submission(submission_id).await?;
    info!(event_id = removed.event_id, "Submission withdrawn");

    state
        .notifier
        .emit(&SubmissionWithdrawn {
            event_id: removed.event_id,
            submission_id: removed.id,
            participant_id: removed.participant_id,
        })
        .await;

    Ok(removed)
}
