use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::EventStatus;
use common::ranking::filter_region;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::event::*;
use crate::services::admission::AdmissionError;
use crate::state::AppState;
use crate::store::{Event, Store};
use crate::utils::jwt::{PERM_EVENT_MANAGE, PERM_SUBMISSION_REVIEW};

pub(crate) async fn find_event(store: &dyn Store, id: i32) -> Result<Event, AppError> {
    store
        .find_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Events",
    operation_id = "createEvent",
    summary = "Create a new event",
    description = "Creates an event in `draft` (default) or `upcoming` status. Requires `event:manage` permission. Omitted rules fall back to: region `Both`, proof required, 3 submissions per participant, 100/75/50/10 points.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title = %payload.title, organizer = %auth_user.username))]
pub async fn create_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(PERM_EVENT_MANAGE)?;
    validate_create_event(&payload)?;

    let now = state.clock.now();
    let event = state
        .store
        .create_event(payload.into_new_event(auth_user.user_id, now))
        .await?;
    info!(event_id = event.id, "Event created");

    Ok((StatusCode::CREATED, Json(EventResponse::at(event, now))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List events",
    description = "Returns events ordered by start time. `status` filters on the organizer-set status; the returned `status` is advanced by the event window.",
    params(EventListQuery),
    responses(
        (status = 200, description = "List of events", body = EventListResponse),
        (status = 400, description = "Unknown status (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_events(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventListQuery>,
) -> Result<Json<EventListResponse>, AppError> {
    let now = state.clock.now();
    let data = state
        .store
        .list_events(query.status)
        .await?
        .into_iter()
        .map(|e| EventResponse::at(e, now))
        .collect();
    Ok(Json(EventListResponse { data }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Events",
    operation_id = "getEvent",
    summary = "Get an event by ID",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = EventResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EventResponse>, AppError> {
    let event = find_event(state.store.as_ref(), id).await?;
    Ok(Json(EventResponse::at(event, state.clock.now())))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Events",
    operation_id = "updateEvent",
    summary = "Update an existing event",
    description = "Partially updates an event using PATCH semantics. Requires `event:manage` permission. Window, region, proof, limit and scoring changes are refused with 409 once the event has submissions.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Rules locked by existing submissions (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    auth_user.require_permission(PERM_EVENT_MANAGE)?;
    let existing = find_event(state.store.as_ref(), id).await?;
    validate_update_event(&payload, &existing)?;

    let now = state.clock.now();
    let event = state.store.update_event(id, payload.into(), now).await?;
    Ok(Json(EventResponse::at(event, now)))
}

#[utoipa::path(
    post,
    path = "/{id}/actions",
    tag = "Events",
    operation_id = "applyEventAction",
    summary = "Move an event through its lifecycle",
    description = "Applies `publish` (draft to upcoming), `start` (upcoming to active), `complete` (active to completed) or `cancel`. Requires `event:manage` permission.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = EventActionRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Action not allowed from the current status (STATE_CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, action = ?payload.action))]
pub async fn apply_event_action(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<EventActionRequest>,
) -> Result<Json<EventResponse>, AppError> {
    auth_user.require_permission(PERM_EVENT_MANAGE)?;

    let now = state.clock.now();
    let event = state
        .store
        .apply_event_action(id, payload.action, now)
        .await?;
    info!(event_id = id, status = %event.status, "Event status changed");

    Ok(Json(EventResponse::at(event, now)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Events",
    operation_id = "deleteEvent",
    summary = "Delete an event by ID",
    description = "Deletes an event and its registrations. Requires `event:manage` permission. Refused with 409 while any submission references the event.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Event has submissions (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(PERM_EVENT_MANAGE)?;
    state.store.delete_event(id).await?;
    info!(event_id = id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/join",
    tag = "Event Participants",
    operation_id = "joinEvent",
    summary = "Join an event",
    description = "Registers the caller as a participant. Drafts, cancelled events and events whose window has passed cannot be joined.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 201, description = "Joined", body = ParticipantResponse),
        (status = 400, description = "Event closed (EVENT_NOT_ACTIVE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already a participant (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id, username = %auth_user.username))]
pub async fn join_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let event = find_event(state.store.as_ref(), id).await?;
    let now = state.clock.now();
    if matches!(
        event.status_at(now),
        EventStatus::Draft | EventStatus::Completed | EventStatus::Cancelled
    ) {
        return Err(AdmissionError::EventNotActive.into());
    }

    let participant = state.store.join_event(id, auth_user.user_id, now).await?;
    info!(event_id = id, user_id = auth_user.user_id, "Participant joined");

    Ok((StatusCode::CREATED, Json(ParticipantResponse::from(participant))))
}

#[utoipa::path(
    post,
    path = "/{id}/leave",
    tag = "Event Participants",
    operation_id = "leaveEvent",
    summary = "Leave an event",
    description = "Removes the caller's registration. Refused with 409 once the caller has submissions for the event.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Left the event"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not a participant (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Participant has submissions (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id))]
pub async fn leave_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    state.store.leave_event(id, auth_user.user_id).await?;
    info!(event_id = id, user_id = auth_user.user_id, "Participant left");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/participants",
    tag = "Event Participants",
    operation_id = "listEventParticipants",
    summary = "List participants of an event",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Participants in join order", body = Vec<ParticipantResponse>),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ParticipantResponse>>, AppError> {
    find_event(state.store.as_ref(), id).await?;
    let participants = state
        .store
        .list_participants(id)
        .await?
        .into_iter()
        .map(ParticipantResponse::from)
        .collect();
    Ok(Json(participants))
}

#[utoipa::path(
    get,
    path = "/{id}/leaderboard",
    tag = "Leaderboard",
    operation_id = "getLeaderboard",
    summary = "Get the event leaderboard",
    description = "Approved runs ordered by time, then approval time, then submission id. With `region`, only runs on that region are listed; ranks and points stay event-wide.",
    params(("id" = i32, Path, description = "Event ID"), LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard", body = LeaderboardResponse),
        (status = 400, description = "Unknown region (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(id))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppQuery(query): AppQuery<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let event = find_event(state.store.as_ref(), id).await?;
    Ok(Json(LeaderboardResponse {
        event_id: event.id,
        region: query.region,
        entries: filter_region(&event.leaderboard, query.region),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/best",
    tag = "Leaderboard",
    operation_id = "getMyBestTime",
    summary = "Get the caller's best approved run",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Best run, or null", body = BestTimeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user_id = auth_user.user_id))]
pub async fn get_my_best(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<BestTimeResponse>, AppError> {
    let event = find_event(state.store.as_ref(), id).await?;
    // Entries are in rank order, so the first match is the fastest.
    let best = event
        .leaderboard
        .into_iter()
        .find(|e| e.participant_id == auth_user.user_id);
    Ok(Json(BestTimeResponse {
        event_id: id,
        user_id: auth_user.user_id,
        best,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/stats",
    tag = "Events",
    operation_id = "getEventStats",
    summary = "Submission counts for an event",
    description = "Counts submissions by status. Requires `submission:review` or `event:manage` permission.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Statistics", body = EventStatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_event_stats(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EventStatsResponse>, AppError> {
    if !(auth_user.has_permission(PERM_SUBMISSION_REVIEW)
        || auth_user.has_permission(PERM_EVENT_MANAGE))
    {
        return Err(AppError::PermissionDenied);
    }
    find_event(state.store.as_ref(), id).await?;

    let participants = state.store.list_participants(id).await?.len() as u64;
    let submissions = state.store.submission_stats(id).await?;
    Ok(Json(EventStatsResponse {
        event_id: id,
        participants,
        submissions,
    }))
}
