use chrono::{DateTime, Utc};
use common::{ClassificationResult, Region, SubmissionStatus};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, double_option};
use crate::store::Submission;

/// Request body for submitting a run.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSubmissionRequest {
    /// Declared time as `M:SS.mmm` (two-digit fraction read as hundredths).
    #[schema(example = "2:15.50")]
    pub time: String,
    pub region: Region,
    /// File name of an already uploaded proof image. No path separators allowed.
    #[schema(example = "run-0301.png")]
    pub proof_image: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateNotesRequest {
    /// New notes; null clears them.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

/// Optional reviewer comment attached to a decision.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct ReviewRequest {
    #[schema(example = "Timer obscured at the final frame")]
    pub admin_notes: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PendingQuery {
    /// Restrict the queue to one event.
    pub event_id: Option<i32>,
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

/// Full submission details.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub event_id: i32,
    pub participant_id: i32,
    /// Canonical time in milliseconds.
    #[schema(example = 135500)]
    pub time_ms: u64,
    #[schema(example = "2:15.500")]
    pub time_text: String,
    pub proof_image: Option<String>,
    /// Advisory text-recognition result. Null until classified.
    pub classification: Option<ClassificationResult>,
    /// True when recognition found a time that disagrees with the declared one.
    pub flagged: bool,
    pub status: SubmissionStatus,
    pub region: Region,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    /// Set only while approved.
    pub rank: Option<u32>,
    pub points: Option<i32>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionResponse {
    fn from(s: Submission) -> Self {
        Self {
            flagged: s
                .classification
                .as_ref()
                .is_some_and(ClassificationResult::is_suspicious),
            id: s.id,
            event_id: s.event_id,
            participant_id: s.participant_id,
            time_ms: s.time_ms,
            time_text: s.time_text,
            proof_image: s.proof_image,
            classification: s.classification,
            status: s.status,
            region: s.region,
            notes: s.notes,
            admin_notes: s.admin_notes,
            rank: s.rank,
            points: s.points,
            reviewed_by: s.reviewed_by,
            reviewed_at: s.reviewed_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionListResponse {
    pub data: Vec<SubmissionResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PendingListResponse {
    pub data: Vec<SubmissionResponse>,
    pub pagination: Pagination,
}
