use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::ReviewDecision;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::shared::{Pagination, validate_text_len};
use crate::models::submission::*;
use crate::services::admission::{self, SubmissionRequest};
use crate::services::lifecycle::{self, Actor};
use crate::state::AppState;
use crate::store::{Store, Submission};

use super::event::find_event;

/// Load a submission the caller may see: their own, or any for reviewers.
///
/// Returns 404 rather than 403 so ids of other participants' runs are not
/// disclosed.
async fn find_visible_submission(
    store: &dyn Store,
    auth_user: &AuthUser,
    id: i32,
) -> Result<Submission, AppError> {
    store
        .find_submission(id)
        .await?
        .filter(|s| s.participant_id == auth_user.user_id || auth_user.is_reviewer())
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))
}

/// Like [`find_visible_submission`] but only for the owner.
async fn find_own_submission(
    store: &dyn Store,
    auth_user: &AuthUser,
    id: i32,
) -> Result<Submission, AppError> {
    store
        .find_submission(id)
        .await?
        .filter(|s| s.participant_id == auth_user.user_id)
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))
}

#[utoipa::path(
    post,
    path = "/{id}/submissions",
    tag = "Submissions",
    operation_id = "createSubmission",
    summary = "Submit a run to an event",
    description = "Admits a run for the caller. Checks, in order: the event is open (`EVENT_NOT_ACTIVE`), the caller joined it (`NOT_PARTICIPATING`), the per-participant cap (`SUBMISSION_LIMIT_REACHED`), the proof image when required (`PROOF_REQUIRED`), the time format (`INVALID_TIME_FORMAT`) and the region (`REGION_MISMATCH`). The run is stored as `pending`; the proof image is run through text recognition as an advisory cross-check.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission created", body = SubmissionResponse),
        (status = 400, description = "Refused by admission (EVENT_NOT_ACTIVE, NOT_PARTICIPATING, SUBMISSION_LIMIT_REACHED, PROOF_REQUIRED, INVALID_TIME_FORMAT, REGION_MISMATCH, VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id, user_id = auth_user.user_id, username = %auth_user.username))]
pub async fn create_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_text_len(
        "Notes",
        payload.notes.as_deref(),
        state.config.submission.max_notes_len,
    )?;

    let submission = admission::submit(
        &state,
        SubmissionRequest {
            event_id,
            participant_id: auth_user.user_id,
            declared_time: payload.time,
            region: payload.region,
            proof_image: payload.proof_image,
            notes: payload.notes,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse::from(submission)),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/submissions/me",
    tag = "Submissions",
    operation_id = "listMyEventSubmissions",
    summary = "List the caller's submissions for an event",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Submissions, newest first", body = SubmissionListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(event_id, user_id = auth_user.user_id))]
pub async fn list_my_submissions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<SubmissionListResponse>, AppError> {
    find_event(state.store.as_ref(), event_id).await?;
    let data = state
        .store
        .list_participant_submissions(event_id, auth_user.user_id)
        .await?
        .into_iter()
        .map(SubmissionResponse::from)
        .collect();
    Ok(Json(SubmissionListResponse { data }))
}

#[utoipa::path(
    get,
    path = "/pending",
    tag = "Review",
    operation_id = "listPendingSubmissions",
    summary = "Review queue",
    description = "Pending submissions, oldest first. Requires `submission:review` permission.",
    params(PendingQuery),
    responses(
        (status = 200, description = "Pending submissions", body = PendingListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_pending(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PendingQuery>,
) -> Result<Json<PendingListResponse>, AppError> {
    if !auth_user.is_reviewer() {
        return Err(AppError::PermissionDenied);
    }
    let (page, per_page) = Pagination::clamp(query.page, query.per_page);

    let result = state
        .store
        .list_pending(query.event_id, Pagination::offset(page, per_page), per_page)
        .await?;

    Ok(Json(PendingListResponse {
        data: result
            .items
            .into_iter()
            .map(SubmissionResponse::from)
            .collect(),
        pagination: Pagination::new(page, per_page, result.total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Submissions",
    operation_id = "getSubmission",
    summary = "Get a submission by ID",
    description = "Visible to its owner and to reviewers. Returns 404 for anyone else.",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission details", body = SubmissionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let submission = find_visible_submission(state.store.as_ref(), &auth_user, id).await?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    patch,
    path = "/{id}/notes",
    tag = "Submissions",
    operation_id = "updateSubmissionNotes",
    summary = "Edit notes on a pending submission",
    description = "Owner only. Refused with 409 once the submission has been reviewed.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body = UpdateNotesRequest,
    responses(
        (status = 200, description = "Submission updated", body = SubmissionResponse),
        (status = 400, description = "Notes too long (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Submission already reviewed (STATE_CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_notes(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateNotesRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let existing = find_own_submission(state.store.as_ref(), &auth_user, id).await?;
    let Some(notes) = payload.notes else {
        return Ok(Json(existing.into()));
    };
    let updated = lifecycle::update_notes(&state, id, notes).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Submissions",
    operation_id = "withdrawSubmission",
    summary = "Withdraw a pending submission",
    description = "Owner only. The submission is removed and no longer counts towards the event's per-participant cap. Refused with 409 once reviewed.",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 204, description = "Submission withdrawn"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Submission already reviewed (STATE_CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn withdraw_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    find_own_submission(state.store.as_ref(), &auth_user, id).await?;
    lifecycle::withdraw(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn review(
    auth_user: &AuthUser,
    state: &AppState,
    id: i32,
    decision: ReviewDecision,
    payload: Option<ReviewRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let admin_notes = payload.and_then(|p| p.admin_notes);
    let outcome =
        lifecycle::review(state, Actor::from(auth_user), id, decision, admin_notes).await?;
    Ok(Json(outcome.submission.into()))
}

#[utoipa::path(
    post,
    path = "/{id}/approve",
    tag = "Review",
    operation_id = "approveSubmission",
    summary = "Approve a pending submission",
    description = "Requires `submission:review` permission. Rebuilds the event leaderboard and rewrites rank and points of every approved submission in the same step.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body(content = ReviewRequest, description = "Optional reviewer notes"),
    responses(
        (status = 200, description = "Submission approved", body = SubmissionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Caller is not a reviewer or submission is not pending (STATE_CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, reviewer = auth_user.user_id, reviewer_name = %auth_user.username))]
pub async fn approve_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Option<AppJson<ReviewRequest>>,
) -> Result<Json<SubmissionResponse>, AppError> {
    review(
        &auth_user,
        &state,
        id,
        ReviewDecision::Approve,
        payload.map(|AppJson(p)| p),
    )
    .await
}

#[utoipa::path(
    post,
    path = "/{id}/reject",
    tag = "Review",
    operation_id = "rejectSubmission",
    summary = "Reject a pending submission",
    description = "Requires `submission:review` permission.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body(content = ReviewRequest, description = "Optional reviewer notes"),
    responses(
        (status = 200, description = "Submission rejected", body = SubmissionResponse),
        (status = 400, description = "Notes too long (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Caller is not a reviewer or submission is not pending (STATE_CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, reviewer = auth_user.user_id, reviewer_name = %auth_user.username))]
pub async fn reject_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Option<AppJson<ReviewRequest>>,
) -> Result<Json<SubmissionResponse>, AppError> {
    review(
        &auth_user,
        &state,
        id,
        ReviewDecision::Reject,
        payload.map(|AppJson(p)| p),
    )
    .await
}

#[utoipa::path(
    post,
    path = "/{id}/disqualify",
    tag = "Review",
    operation_id = "disqualifySubmission",
    summary = "Disqualify a pending submission",
    description = "Requires `submission:review` permission.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body(content = ReviewRequest, description = "Optional reviewer notes"),
    responses(
        (status = 200, description = "Submission disqualified", body = SubmissionResponse),
        (status = 400, description = "Notes too long (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Caller is not a reviewer or submission is not pending (STATE_CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, reviewer = auth_user.user_id, reviewer_name = %auth_user.username))]
pub async fn disqualify_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Option<AppJson<ReviewRequest>>,
) -> Result<Json<SubmissionResponse>, AppError> {
    review(
        &auth_user,
        &state,
        id,
        ReviewDecision::Disqualify,
        payload.map(|AppJson(p)| p),
    )
    .await
}
