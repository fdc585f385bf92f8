use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    ClassificationResult, EventAction, EventStatus, LeaderboardEntry, ScoringPolicy,
    SubmissionStatus, race_time,
};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::*;
use tracing::debug;

use super::{
    Event, EventPatch, GameInfo, NewEvent, NewSubmission, Participant, PendingPage, Review,
    ReviewOutcome, Store, StoreError, Submission, SubmissionStats, rerank,
};
use crate::entity::{event, event_participant, submission};

/// [`Store`] backed by PostgreSQL through SeaORM.
///
/// Admission holds the event row `FOR SHARE` and locks the participant
/// registration row `FOR UPDATE`. Reviews and event mutations lock the event
/// row `FOR UPDATE`. Lock order is event, then participant or submission.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {e}"))
}

fn event_from_model(m: event::Model) -> Result<Event, StoreError> {
    let scoring: ScoringPolicy =
        serde_json::from_value(m.scoring).map_err(|e| corrupt("event scoring", e))?;
    let leaderboard: Vec<LeaderboardEntry> =
        serde_json::from_value(m.leaderboard).map_err(|e| corrupt("event leaderboard", e))?;
    let tags: Vec<String> = serde_json::from_value(m.tags).map_err(|e| corrupt("event tags", e))?;
    let max_submissions =
        u32::try_from(m.max_submissions).map_err(|e| corrupt("max_submissions", e))?;

    Ok(Event {
        id: m.id,
        title: m.title,
        description: m.description,
        game: GameInfo {
            name: m.game_name,
            stage: m.game_stage,
            category: m.game_category,
        },
        start_time: m.start_time,
        end_time: m.end_time,
        region: m.region,
        proof_required: m.proof_required,
        max_submissions,
        scoring,
        status: m.status,
        leaderboard,
        featured: m.featured,
        tags,
        created_by: m.created_by,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn submission_from_model(m: submission::Model) -> Result<Submission, StoreError> {
    let classification = m
        .classification
        .map(serde_json::from_value::<ClassificationResult>)
        .transpose()
        .map_err(|e| corrupt("submission classification", e))?;
    let time_ms = u64::try_from(m.time_ms).map_err(|e| corrupt("time_ms", e))?;
    let rank = m
        .rank
        .map(u32::try_from)
        .transpose()
        .map_err(|e| corrupt("rank", e))?;

    Ok(Submission {
        id: m.id,
        event_id: m.event_id,
        participant_id: m.user_id,
        time_ms,
        time_text: m.time_text,
        proof_image: m.proof_image,
        classification,
        status: m.status,
        region: m.region,
        notes: m.notes,
        admin_notes: m.admin_notes,
        rank,
        points: m.points,
        reviewed_by: m.reviewed_by,
        reviewed_at: m.reviewed_at,
        created_at: m.created_at,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn max_submissions_value(max: u32) -> Result<i32, StoreError> {
    i32::try_from(max).map_err(|_| StoreError::OutOfRange("max_submissions"))
}

async fn find_event_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<event::Model, StoreError> {
    event::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(StoreError::NotFound("event"))
}

async fn has_submissions<C: ConnectionTrait>(db: &C, event_id: i32) -> Result<bool, StoreError> {
    let count = submission::Entity::find()
        .filter(submission::Column::EventId.eq(event_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

async fn find_submission_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<submission::Model, StoreError> {
    submission::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(StoreError::NotFound("submission"))
}

#[async_trait]
impl Store for PgStore {
    async fn create_event(&self, new: NewEvent) -> Result<Event, StoreError> {
        let model = event::ActiveModel {
            title: Set(new.title),
            description: Set(new.description),
            game_name: Set(new.game.name),
            game_stage: Set(new.game.stage),
            game_category: Set(new.game.category),
            start_time: Set(new.start_time),
            end_time: Set(new.end_time),
            region: Set(new.region),
            proof_required: Set(new.proof_required),
            max_submissions: Set(max_submissions_value(new.max_submissions)?),
            scoring: Set(to_json(&new.scoring)?),
            status: Set(new.status),
            leaderboard: Set(serde_json::json!([])),
            featured: Set(new.featured),
            tags: Set(to_json(&new.tags)?),
            created_by: Set(new.created_by),
            created_at: Set(new.created_at),
            updated_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        event_from_model(model)
    }

    async fn find_event(&self, id: i32) -> Result<Option<Event>, StoreError> {
        event::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(event_from_model)
            .transpose()
    }

    async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, StoreError> {
        let mut query = event::Entity::find();
        if let Some(status) = status {
            query = query.filter(event::Column::Status.eq(status));
        }
        query
            .order_by_asc(event::Column::StartTime)
            .order_by_asc(event::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(event_from_model)
            .collect()
    }

    async fn update_event(
        &self,
        id: i32,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let txn = self.db.begin().await?;
        let existing = find_event_for_update(&txn, id).await?;

        if patch.changes_rules() && has_submissions(&txn, id).await? {
            return Err(StoreError::Conflict(
                "Event rules cannot change once submissions exist".into(),
            ));
        }

        let mut active: event::ActiveModel = existing.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(game) = patch.game {
            active.game_name = Set(game.name);
            active.game_stage = Set(game.stage);
            active.game_category = Set(game.category);
        }
        if let Some(start_time) = patch.start_time {
            active.start_time = Set(start_time);
        }
        if let Some(end_time) = patch.end_time {
            active.end_time = Set(end_time);
        }
        if let Some(region) = patch.region {
            active.region = Set(region);
        }
        if let Some(proof_required) = patch.proof_required {
            active.proof_required = Set(proof_required);
        }
        if let Some(max) = patch.max_submissions {
            active.max_submissions = Set(max_submissions_value(max)?);
        }
        if let Some(scoring) = patch.scoring {
            active.scoring = Set(to_json(&scoring)?);
        }
        if let Some(featured) = patch.featured {
            active.featured = Set(featured);
        }
        if let Some(tags) = patch.tags {
            active.tags = Set(to_json(&tags)?);
        }
        active.updated_at = Set(now);

        let model = active.update(&txn).await?;
        txn.commit().await?;
        event_from_model(model)
    }

    async fn apply_event_action(
        &self,
        id: i32,
        action: EventAction,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let txn = self.db.begin().await?;
        let existing = find_event_for_update(&txn, id).await?;
        let next = existing.status.apply(action)?;

        let mut active: event::ActiveModel = existing.into();
        active.status = Set(next);
        active.updated_at = Set(now);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        event_from_model(model)
    }

    async fn delete_event(&self, id: i32) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;
        find_event_for_update(&txn, id).await?;

        if has_submissions(&txn, id).await? {
            return Err(StoreError::Conflict(
                "Event has submissions and cannot be deleted".into(),
            ));
        }

        event_participant::Entity::delete_many()
            .filter(event_participant::Column::EventId.eq(id))
            .exec(&txn)
            .await?;
        event::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn join_event(
        &self,
        event_id: i32,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        if event::Entity::find_by_id(event_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(StoreError::NotFound("event"));
        }

        let row = event_participant::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            joined_at: Set(now),
        };
        match row.insert(&self.db).await {
            Ok(model) => Ok(Participant {
                event_id: model.event_id,
                user_id: model.user_id,
                joined_at: model.joined_at,
            }),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::Conflict("Already a participant".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn leave_event(&self, event_id: i32, user_id: i32) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;
        event_participant::Entity::find_by_id((event_id, user_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound("participant"))?;

        let submitted = submission::Entity::find()
            .filter(submission::Column::EventId.eq(event_id))
            .filter(submission::Column::UserId.eq(user_id))
            .count(&txn)
            .await?;
        if submitted > 0 {
            return Err(StoreError::Conflict(
                "Cannot leave an event after submitting".into(),
            ));
        }

        event_participant::Entity::delete_by_id((event_id, user_id))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    async fn is_participant(&self, event_id: i32, user_id: i32) -> Result<bool, StoreError> {
        Ok(event_participant::Entity::find_by_id((event_id, user_id))
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn list_participants(&self, event_id: i32) -> Result<Vec<Participant>, StoreError> {
        Ok(event_participant::Entity::find()
            .filter(event_participant::Column::EventId.eq(event_id))
            .order_by_asc(event_participant::Column::JoinedAt)
            .order_by_asc(event_participant::Column::UserId)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| Participant {
                event_id: p.event_id,
                user_id: p.user_id,
                joined_at: p.joined_at,
            })
            .collect())
    }

    async fn count_submissions(&self, event_id: i32, user_id: i32) -> Result<u32, StoreError> {
        let count = submission::Entity::find()
            .filter(submission::Column::EventId.eq(event_id))
            .filter(submission::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_submission_within_limit(
        &self,
        new: NewSubmission,
    ) -> Result<Submission, StoreError> {
        let time_ms = i64::try_from(new.time_ms).map_err(|_| StoreError::OutOfRange("time"))?;
        let classification = new.classification.as_ref().map(to_json).transpose()?;

        let txn = self.db.begin().await?;

        let event = event::Entity::find_by_id(new.event_id)
            .lock(LockType::Share)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound("event"))?;
        let event = event_from_model(event)?;
        event.admits(&new)?;
        let max = event.max_submissions;

        // The registration row is the per-(event, participant) lock.
        event_participant::Entity::find_by_id((new.event_id, new.participant_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotParticipating)?;

        let existing = submission::Entity::find()
            .filter(submission::Column::EventId.eq(new.event_id))
            .filter(submission::Column::UserId.eq(new.participant_id))
            .count(&txn)
            .await?;
        if existing >= u64::from(max) {
            debug!(
                event_id = new.event_id,
                user_id = new.participant_id,
                existing,
                "Submission limit reached under lock"
            );
            return Err(StoreError::LimitReached { max });
        }

        let model = submission::ActiveModel {
            event_id: Set(new.event_id),
            user_id: Set(new.participant_id),
            time_ms: Set(time_ms),
            time_text: Set(race_time::encode(new.time_ms)),
            proof_image: Set(new.proof_image),
            classification: Set(classification),
            status: Set(SubmissionStatus::Pending),
            region: Set(new.region),
            notes: Set(new.notes),
            admin_notes: Set(None),
            rank: Set(None),
            points: Set(None),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            created_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        submission_from_model(model)
    }

    async fn find_submission(&self, id: i32) -> Result<Option<Submission>, StoreError> {
        submission::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(submission_from_model)
            .transpose()
    }

    async fn list_participant_submissions(
        &self,
        event_id: i32,
        user_id: i32,
    ) -> Result<Vec<Submission>, StoreError> {
        submission::Entity::find()
            .filter(submission::Column::EventId.eq(event_id))
            .filter(submission::Column::UserId.eq(user_id))
            .order_by_desc(submission::Column::CreatedAt)
            .order_by_desc(submission::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(submission_from_model)
            .collect()
    }

    async fn list_pending(
        &self,
        event_id: Option<i32>,
        offset: u64,
        limit: u64,
    ) -> Result<PendingPage, StoreError> {
        let mut query =
            submission::Entity::find().filter(submission::Column::Status.eq(SubmissionStatus::Pending));
        if let Some(event_id) = event_id {
            query = query.filter(submission::Column::EventId.eq(event_id));
        }

        let total = query.clone().count(&self.db).await?;
        let items = query
            .order_by_asc(submission::Column::CreatedAt)
            .order_by_asc(submission::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(submission_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PendingPage { items, total })
    }

    async fn set_classification(
        &self,
        id: i32,
        result: ClassificationResult,
    ) -> Result<Submission, StoreError> {
        let classification = to_json(&result)?;
        let txn = self.db.begin().await?;
        let existing = find_submission_for_update(&txn, id).await?;
        if existing.status != SubmissionStatus::Pending {
            return Err(StoreError::NotPending(existing.status));
        }

        let mut active: submission::ActiveModel = existing.into();
        active.classification = Set(Some(classification));
        let model = active.update(&txn).await?;
        txn.commit().await?;
        submission_from_model(model)
    }

    async fn update_notes(&self, id: i32, notes: Option<String>) -> Result<Submission, StoreError> {
        let txn = self.db.begin().await?;
        let existing = find_submission_for_update(&txn, id).await?;
        if existing.status != SubmissionStatus::Pending {
            return Err(StoreError::NotPending(existing.status));
        }

        let mut active: submission::ActiveModel = existing.into();
        active.notes = Set(notes);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        submission_from_model(model)
    }

    async fn withdraw_submission(&self, id: i32) -> Result<Submission, StoreError> {
        let txn = self.db.begin().await?;
        let existing = find_submission_for_update(&txn, id).await?;
        if existing.status != SubmissionStatus::Pending {
            return Err(StoreError::NotPending(existing.status));
        }

        submission::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        submission_from_model(existing)
    }

    async fn apply_review(&self, review: Review) -> Result<ReviewOutcome, StoreError> {
        let txn = self.db.begin().await?;

        let target = submission::Entity::find_by_id(review.submission_id)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound("submission"))?;

        // Event row first, then the submission: one lock order for every reviewer.
        let event_model = find_event_for_update(&txn, target.event_id).await?;
        let target = find_submission_for_update(&txn, review.submission_id).await?;
        let next = target.status.review(review.decision)?;

        let mut active: submission::ActiveModel = target.into();
        active.status = Set(next);
        active.reviewed_by = Set(Some(review.reviewer_id));
        active.reviewed_at = Set(Some(review.reviewed_at));
        if review.admin_notes.is_some() {
            active.admin_notes = Set(review.admin_notes.clone());
        }
        let reviewed = active.update(&txn).await?;

        if next != SubmissionStatus::Approved {
            txn.commit().await?;
            return Ok(ReviewOutcome {
                submission: submission_from_model(reviewed)?,
                leaderboard: None,
            });
        }

        let event_id = event_model.id;
        let event = event_from_model(event_model.clone())?;

        let approved = submission::Entity::find()
            .filter(submission::Column::EventId.eq(event_id))
            .filter(submission::Column::Status.eq(SubmissionStatus::Approved))
            .all(&txn)
            .await?
            .into_iter()
            .map(submission_from_model)
            .collect::<Result<Vec<_>, _>>()?;
        let entries = rerank(&approved, &event.scoring);

        for entry in &entries {
            let rank = i32::try_from(entry.rank).map_err(|_| StoreError::OutOfRange("rank"))?;
            submission::Entity::update_many()
                .filter(submission::Column::Id.eq(entry.submission_id))
                .col_expr(submission::Column::Rank, Expr::value(rank))
                .col_expr(submission::Column::Points, Expr::value(entry.points))
                .exec(&txn)
                .await?;
        }

        let mut active: event::ActiveModel = event_model.into();
        active.leaderboard = Set(to_json(&entries)?);
        active.updated_at = Set(review.reviewed_at);
        active.update(&txn).await?;

        let submission = submission::Entity::find_by_id(review.submission_id)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound("submission"))?;

        txn.commit().await?;

        Ok(ReviewOutcome {
            submission: submission_from_model(submission)?,
            leaderboard: Some(entries),
        })
    }

    async fn submission_stats(&self, event_id: i32) -> Result<SubmissionStats, StoreError> {
        let rows: Vec<(SubmissionStatus, i64)> = submission::Entity::find()
            .select_only()
            .column(submission::Column::Status)
            .column_as(submission::Column::Id.count(), "count")
            .filter(submission::Column::EventId.eq(event_id))
            .group_by(submission::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut stats = SubmissionStats::default();
        for (status, count) in rows {
            stats.add(status, u64::try_from(count).unwrap_or(0));
        }
        Ok(stats)
    }
}
