use chrono::{DateTime, Utc};
use common::{
    EventAction, EventStatus, LeaderboardEntry, Region, RegionConstraint, ScoringPolicy,
};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_text_len, validate_title};
use crate::error::AppError;
use crate::store::{CATEGORIES, Event, EventPatch, GameInfo, Participant, SubmissionStats};

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 32;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "Bob-omb Battlefield sprint")]
    pub title: String,
    pub description: Option<String>,
    pub game: GameInfo,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Default: `Both`.
    pub region: Option<RegionConstraint>,
    /// Default: true.
    pub proof_required: Option<bool>,
    /// Per-participant cap. Default: 3.
    #[schema(example = 3)]
    pub max_submissions: Option<u32>,
    pub scoring: Option<ScoringPolicy>,
    /// `draft` (default) or `upcoming`.
    pub status: Option<EventStatus>,
    pub featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
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

#[derive(Deserialize, utoipa::ToSchema)]
pub struct EventActionRequest {
    pub action: EventAction,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventListQuery {
    /// Filter by organizer-set status.
    pub status: Option<EventStatus>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Only entries run on this region. Ranks stay event-wide.
    pub region: Option<Region>,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventResponse {
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
    /// Status at the time of the request, advanced by the event window.
    pub status: EventStatus,
    pub featured: bool,
    pub tags: Vec<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventResponse {
    pub fn at(event: Event, now: DateTime<Utc>) -> Self {
        Self {
            status: event.status_at(now),
            id: event.id,
            title: event.title,
            description: event.description,
            game: event.game,
            start_time: event.start_time,
            end_time: event.end_time,
            region: event.region,
            proof_required: event.proof_required,
            max_submissions: event.max_submissions,
            scoring: event.scoring,
            featured: event.featured,
            tags: event.tags,
            created_by: event.created_by,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventListResponse {
    pub data: Vec<EventResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ParticipantResponse {
    pub event_id: i32,
    pub user_id: i32,
    pub joined_at: DateTime<Utc>,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        Self {
            event_id: p.event_id,
            user_id: p.user_id,
            joined_at: p.joined_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LeaderboardResponse {
    pub event_id: i32,
    pub region: Option<Region>,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BestTimeResponse {
    pub event_id: i32,
    pub user_id: i32,
    /// Fastest approved run, or null when none is approved yet.
    pub best: Option<LeaderboardEntry>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventStatsResponse {
    pub event_id: i32,
    pub participants: u64,
    pub submissions: SubmissionStats,
}

fn validate_category(category: &str) -> Result<(), AppError> {
    if !CATEGORIES.contains(&category) {
        return Err(AppError::Validation(format!(
            "Category must be one of: {}",
            CATEGORIES.join(", ")
        )));
    }
    Ok(())
}

fn validate_game(game: &GameInfo) -> Result<(), AppError> {
    if game.name.trim().is_empty() || game.stage.trim().is_empty() {
        return Err(AppError::Validation(
            "Game name and stage are required".into(),
        ));
    }
    validate_category(&game.category)
}

fn validate_tags(tags: &[String]) -> Result<(), AppError> {
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!("At most {MAX_TAGS} tags")));
    }
    if tags
        .iter()
        .any(|t| t.trim().is_empty() || t.chars().count() > MAX_TAG_LEN)
    {
        return Err(AppError::Validation(format!(
            "Tags must be 1-{MAX_TAG_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_scoring(scoring: &ScoringPolicy) -> Result<(), AppError> {
    let p = &scoring.points;
    if [p.first, p.second, p.third, p.participation]
        .iter()
        .any(|v| *v < 0)
        || scoring.time_bonus.points < 0
    {
        return Err(AppError::Validation("Points must be >= 0".into()));
    }
    Ok(())
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::Validation(
            "end_time must be after start_time".into(),
        ));
    }
    Ok(())
}

fn validate_max_submissions(max: u32) -> Result<(), AppError> {
    if max == 0 {
        return Err(AppError::Validation("max_submissions must be >= 1".into()));
    }
    Ok(())
}

pub fn validate_create_event(req: &CreateEventRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    validate_text_len("Description", req.description.as_deref(), MAX_DESCRIPTION_LEN)?;
    validate_game(&req.game)?;
    validate_window(req.start_time, req.end_time)?;
    if let Some(max) = req.max_submissions {
        validate_max_submissions(max)?;
    }
    if let Some(ref scoring) = req.scoring {
        validate_scoring(scoring)?;
    }
    if let Some(ref tags) = req.tags {
        validate_tags(tags)?;
    }
    if let Some(status) = req.status
        && !matches!(status, EventStatus::Draft | EventStatus::Upcoming)
    {
        return Err(AppError::Validation(
            "New events start as draft or upcoming".into(),
        ));
    }
    Ok(())
}

/// Validate an update against the event it applies to, so a one-sided
/// window change is checked against the other stored bound.
pub fn validate_update_event(req: &UpdateEventRequest, current: &Event) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(Some(ref description)) = req.description {
        validate_text_len("Description", Some(description.as_str()), MAX_DESCRIPTION_LEN)?;
    }
    if let Some(ref game) = req.game {
        validate_game(game)?;
    }
    validate_window(
        req.start_time.unwrap_or(current.start_time),
        req.end_time.unwrap_or(current.end_time),
    )?;
    if let Some(max) = req.max_submissions {
        validate_max_submissions(max)?;
    }
    if let Some(ref scoring) = req.scoring {
        validate_scoring(scoring)?;
    }
    if let Some(ref tags) = req.tags {
        validate_tags(tags)?;
    }
    Ok(())
}

fn trim_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter().map(|t| t.trim().to_string()).collect()
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(req: UpdateEventRequest) -> Self {
        Self {
            title: req.title.map(|t| t.trim().to_string()),
            description: req.description,
            game: req.game,
            start_time: req.start_time,
            end_time: req.end_time,
            region: req.region,
            proof_required: req.proof_required,
            max_submissions: req.max_submissions,
            scoring: req.scoring,
            featured: req.featured,
            tags: req.tags.map(trim_tags),
        }
    }
}

impl CreateEventRequest {
    pub(crate) fn into_new_event(
        self,
        created_by: i32,
        now: DateTime<Utc>,
    ) -> crate::store::NewEvent {
        crate::store::NewEvent {
            title: self.title.trim().to_string(),
            description: self.description,
            game: self.game,
            start_time: self.start_time,
            end_time: self.end_time,
            region: self.region.unwrap_or_default(),
            proof_required: self.proof_required.unwrap_or(true),
            max_submissions: self.max_submissions.unwrap_or(3),
            scoring: self.scoring.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            featured: self.featured.unwrap_or(false),
            tags: self.tags.map(trim_tags).unwrap_or_default(),
            created_by,
            created_at: now,
        }
    }
}
