use common::{Region, SubmissionStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    pub user_id: i32,

    /// Declared time in milliseconds. Never overwritten after insert.
    pub time_ms: i64,
    pub time_text: String,
    /// Flat file name under the media root.
    pub proof_image: Option<String>,
    /// `ClassificationResult` as JSON, NULL until recognition ran.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub classification: Option<serde_json::Value>,

    pub status: SubmissionStatus,
    pub region: Region,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,

    /// Mirrors the event leaderboard; NULL unless approved.
    pub rank: Option<i32>,
    pub points: Option<i32>,

    pub reviewed_by: Option<i32>,
    /// Doubles as the approval timestamp for tie-breaks.
    pub reviewed_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
