use common::{EventStatus, RegionConstraint};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    pub description: Option<String>,
    pub game_name: String,
    pub game_stage: String,
    pub game_category: String,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub region: RegionConstraint,
    pub proof_required: bool,
    pub max_submissions: i32,

    /// `ScoringPolicy` as JSON.
    #[sea_orm(column_type = "JsonBinary")]
    pub scoring: serde_json::Value,

    /// Status last set by an organizer. The reported status also follows the clock.
    pub status: EventStatus,

    /// Ordered `LeaderboardEntry` array, replaced wholesale on every approval.
    #[sea_orm(column_type = "JsonBinary")]
    pub leaderboard: serde_json::Value,

    pub featured: bool,
    /// JSON array of strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    pub created_by: i32,

    #[sea_orm(has_many)]
    pub participants: HasMany<super::event_participant::Entity>,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::submission::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
