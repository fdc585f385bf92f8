use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ClassificationResult, EventAction, EventStatus, SubmissionStatus, race_time};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, RwLock};

use super::*;

/// Per-(event, participant) admission state.
#[derive(Debug)]
struct Slot {
    joined_at: DateTime<Utc>,
    submission_count: u32,
    /// Set when the participant left while a submit was waiting on the lock.
    left: bool,
}

/// In-memory [`Store`].
///
/// Admission is serialized per (event, participant) by a slot mutex and holds
/// the event lock shared. Reviews and event mutations hold it exclusively.
/// Lock order is slot, then event. DashMap guards are never held across an
/// await.
#[derive(Default)]
pub struct MemoryStore {
    next_event_id: AtomicI32,
    next_submission_id: AtomicI32,
    events: DashMap<i32, Event>,
    slots: DashMap<(i32, i32), Arc<Mutex<Slot>>>,
    submissions: DashMap<i32, Submission>,
    event_locks: DashMap<i32, Arc<RwLock<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn event_lock(&self, event_id: i32) -> Arc<RwLock<()>> {
        self.event_locks.entry(event_id).or_default().clone()
    }

    fn slot(&self, event_id: i32, user_id: i32) -> Option<Arc<Mutex<Slot>>> {
        self.slots.get(&(event_id, user_id)).map(|s| s.clone())
    }

    fn has_submissions(&self, event_id: i32) -> bool {
        self.submissions.iter().any(|s| s.event_id == event_id)
    }

    fn event_submissions(&self, event_id: i32) -> Vec<Submission> {
        self.submissions
            .iter()
            .filter(|s| s.event_id == event_id)
            .map(|s| s.clone())
            .collect()
    }

    fn find_event_cloned(&self, id: i32) -> Result<Event, StoreError> {
        self.events
            .get(&id)
            .map(|e| e.clone())
            .ok_or(StoreError::NotFound("event"))
    }

    /// Mutate a submission in place if it is still pending.
    fn modify_pending(
        &self,
        id: i32,
        f: impl FnOnce(&mut Submission),
    ) -> Result<Submission, StoreError> {
        let mut sub = self
            .submissions
            .get_mut(&id)
            .ok_or(StoreError::NotFound("submission"))?;
        if sub.status != SubmissionStatus::Pending {
            return Err(StoreError::NotPending(sub.status));
        }
        f(&mut sub);
        Ok(sub.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_event(&self, new: NewEvent) -> Result<Event, StoreError> {
        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed) + 1;
        let event = Event {
            id,
            title: new.title,
            description: new.description,
            game: new.game,
            start_time: new.start_time,
            end_time: new.end_time,
            region: new.region,
            proof_required: new.proof_required,
            max_submissions: new.max_submissions,
            scoring: new.scoring,
            status: new.status,
            leaderboard: vec![],
            featured: new.featured,
            tags: new.tags,
            created_by: new.created_by,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        self.events.insert(id, event.clone());
        Ok(event)
    }

    async fn find_event(&self, id: i32) -> Result<Option<Event>, StoreError> {
        Ok(self.events.get(&id).map(|e| e.clone()))
    }

    async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| status.is_none_or(|s| e.status == s))
            .map(|e| e.clone())
            .collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn update_event(
        &self,
        id: i32,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let lock = self.event_lock(id);
        let _guard = lock.write().await;

        if patch.changes_rules() && self.has_submissions(id) {
            return Err(StoreError::Conflict(
                "Event rules cannot change once submissions exist".into(),
            ));
        }

        let mut event = self
            .events
            .get_mut(&id)
            .ok_or(StoreError::NotFound("event"))?;
        patch.apply(&mut event);
        event.updated_at = now;
        Ok(event.clone())
    }

    async fn apply_event_action(
        &self,
        id: i32,
        action: EventAction,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let lock = self.event_lock(id);
        let _guard = lock.write().await;

        let mut event = self
            .events
            .get_mut(&id)
            .ok_or(StoreError::NotFound("event"))?;
        event.status = event.status.apply(action)?;
        event.updated_at = now;
        Ok(event.clone())
    }

    async fn delete_event(&self, id: i32) -> Result<(), StoreError> {
        let lock = self.event_lock(id);
        let _guard = lock.write().await;

        if !self.events.contains_key(&id) {
            return Err(StoreError::NotFound("event"));
        }
        if self.has_submissions(id) {
            return Err(StoreError::Conflict(
                "Event has submissions and cannot be deleted".into(),
            ));
        }
        self.events.remove(&id);
        self.slots.retain(|(event_id, _), _| *event_id != id);
        self.event_locks.remove(&id);
        Ok(())
    }

    async fn join_event(
        &self,
        event_id: i32,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Participant, StoreError> {
        if !self.events.contains_key(&event_id) {
            return Err(StoreError::NotFound("event"));
        }
        match self.slots.entry((event_id, user_id)) {
            Entry::Occupied(_) => Err(StoreError::Conflict("Already a participant".into())),
            Entry::Vacant(v) => {
                v.insert(Arc::new(Mutex::new(Slot {
                    joined_at: now,
                    submission_count: 0,
                    left: false,
                })));
                Ok(Participant {
                    event_id,
                    user_id,
                    joined_at: now,
                })
            }
        }
    }

    async fn leave_event(&self, event_id: i32, user_id: i32) -> Result<(), StoreError> {
        let slot = self
            .slot(event_id, user_id)
            .ok_or(StoreError::NotFound("participant"))?;
        let mut slot = slot.lock_owned().await;
        if slot.left {
            return Err(StoreError::NotFound("participant"));
        }
        if slot.submission_count > 0 {
            return Err(StoreError::Conflict(
                "Cannot leave an event after submitting".into(),
            ));
        }
        slot.left = true;
        self.slots.remove(&(event_id, user_id));
        Ok(())
    }

    async fn is_participant(&self, event_id: i32, user_id: i32) -> Result<bool, StoreError> {
        Ok(self.slots.contains_key(&(event_id, user_id)))
    }

    async fn list_participants(&self, event_id: i32) -> Result<Vec<Participant>, StoreError> {
        let slots: Vec<(i32, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .filter(|e| e.key().0 == event_id)
            .map(|e| (e.key().1, e.value().clone()))
            .collect();

        let mut participants = Vec::with_capacity(slots.len());
        for (user_id, slot) in slots {
            let slot = slot.lock().await;
            if !slot.left {
                participants.push(Participant {
                    event_id,
                    user_id,
                    joined_at: slot.joined_at,
                });
            }
        }
        participants.sort_by_key(|p| (p.joined_at, p.user_id));
        Ok(participants)
    }

    async fn count_submissions(&self, event_id: i32, user_id: i32) -> Result<u32, StoreError> {
        match self.slot(event_id, user_id) {
            Some(slot) => Ok(slot.lock().await.submission_count),
            None => Ok(0),
        }
    }

    async fn insert_submission_within_limit(
        &self,
        new: NewSubmission,
    ) -> Result<Submission, StoreError> {
        let mut slot = self
            .slot(new.event_id, new.participant_id)
            .ok_or(StoreError::NotParticipating)?
            .lock_owned()
            .await;
        if slot.left {
            return Err(StoreError::NotParticipating);
        }

        let lock = self.event_lock(new.event_id);
        let _event_guard = lock.read().await;

        let event = self.find_event_cloned(new.event_id)?;
        event.admits(&new)?;
        let max = event.max_submissions;
        if slot.submission_count >= max {
            return Err(StoreError::LimitReached { max });
        }

        let id = self.next_submission_id.fetch_add(1, Ordering::Relaxed) + 1;
        let submission = Submission {
            id,
            event_id: new.event_id,
            participant_id: new.participant_id,
            time_ms: new.time_ms,
            time_text: race_time::encode(new.time_ms),
            proof_image: new.proof_image,
            classification: new.classification,
            status: SubmissionStatus::Pending,
            region: new.region,
            notes: new.notes,
            admin_notes: None,
            rank: None,
            points: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: new.created_at,
        };
        self.submissions.insert(id, submission.clone());
        slot.submission_count += 1;
        Ok(submission)
    }

    async fn find_submission(&self, id: i32) -> Result<Option<Submission>, StoreError> {
        Ok(self.submissions.get(&id).map(|s| s.clone()))
    }

    async fn list_participant_submissions(
        &self,
        event_id: i32,
        user_id: i32,
    ) -> Result<Vec<Submission>, StoreError> {
        let mut subs: Vec<Submission> = self
            .submissions
            .iter()
            .filter(|s| s.event_id == event_id && s.participant_id == user_id)
            .map(|s| s.clone())
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(subs)
    }

    async fn list_pending(
        &self,
        event_id: Option<i32>,
        offset: u64,
        limit: u64,
    ) -> Result<PendingPage, StoreError> {
        let mut pending: Vec<Submission> = self
            .submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .filter(|s| event_id.is_none_or(|id| s.event_id == id))
            .map(|s| s.clone())
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = pending.len() as u64;
        let items = pending
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(PendingPage { items, total })
    }

    async fn set_classification(
        &self,
        id: i32,
        result: ClassificationResult,
    ) -> Result<Submission, StoreError> {
        self.modify_pending(id, |s| s.classification = Some(result))
    }

    async fn update_notes(&self, id: i32, notes: Option<String>) -> Result<Submission, StoreError> {
        self.modify_pending(id, |s| s.notes = notes)
    }

    async fn withdraw_submission(&self, id: i32) -> Result<Submission, StoreError> {
        let (event_id, user_id) = self
            .submissions
            .get(&id)
            .map(|s| (s.event_id, s.participant_id))
            .ok_or(StoreError::NotFound("submission"))?;

        // Same lock order as admission: slot first, then the map entry.
        let slot = self.slot(event_id, user_id);
        let mut slot_guard = match &slot {
            Some(s) => Some(s.lock().await),
            None => None,
        };

        let removed = self
            .submissions
            .remove_if(&id, |_, s| s.status == SubmissionStatus::Pending);
        match removed {
            Some((_, sub)) => {
                if let Some(guard) = slot_guard.as_mut() {
                    guard.submission_count = guard.submission_count.saturating_sub(1);
                }
                Ok(sub)
            }
            None => match self.submissions.get(&id) {
                Some(s) => Err(StoreError::NotPending(s.status)),
                None => Err(StoreError::NotFound("submission")),
            },
        }
    }

    async fn apply_review(&self, review: Review) -> Result<ReviewOutcome, StoreError> {
        let event_id = self
            .submissions
            .get(&review.submission_id)
            .map(|s| s.event_id)
            .ok_or(StoreError::NotFound("submission"))?;

        let lock = self.event_lock(event_id);
        let _guard = lock.write().await;

        let policy = self.find_event_cloned(event_id)?.scoring;

        let reviewed = {
            let mut sub = self
                .submissions
                .get_mut(&review.submission_id)
                .ok_or(StoreError::NotFound("submission"))?;
            sub.status = sub.status.review(review.decision)?;
            sub.reviewed_by = Some(review.reviewer_id);
            sub.reviewed_at = Some(review.reviewed_at);
            if review.admin_notes.is_some() {
                sub.admin_notes = review.admin_notes.clone();
            }
            sub.clone()
        };

        if reviewed.status != SubmissionStatus::Approved {
            return Ok(ReviewOutcome {
                submission: reviewed,
                leaderboard: None,
            });
        }

        let entries = rerank(&self.event_submissions(event_id), &policy);
        for entry in &entries {
            if let Some(mut sub) = self.submissions.get_mut(&entry.submission_id) {
                sub.rank = Some(entry.rank);
                sub.points = Some(entry.points);
            }
        }
        if let Some(mut event) = self.events.get_mut(&event_id) {
            event.leaderboard = entries.clone();
            event.updated_at = review.reviewed_at;
        }

        let submission = self
            .submissions
            .get(&review.submission_id)
            .map(|s| s.clone())
            .ok_or(StoreError::NotFound("submission"))?;

        Ok(ReviewOutcome {
            submission,
            leaderboard: Some(entries),
        })
    }

    async fn submission_stats(&self, event_id: i32) -> Result<SubmissionStats, StoreError> {
        let mut stats = SubmissionStats::default();
        for sub in self.submissions.iter().filter(|s| s.event_id == event_id) {
            stats.add(sub.status, 1);
        }
        Ok(stats)
    }
}
