use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use ::common::{
    EventStatus, Region, RegionConstraint, ReviewDecision, ScoringPolicy, SubmissionStatus,
};
use server::store::{
    Event, EventPatch, GameInfo, NewEvent, NewSubmission, PgStore, Review, Store, StoreError,
};

use crate::common::pg::fresh_store;

fn t(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
}

async fn open_event(store: &PgStore, max_submissions: u32) -> Event {
    store
        .create_event(NewEvent {
            title: "Wario Stadium".into(),
            description: None,
            game: GameInfo {
                name: "Mario Kart 64".into(),
                stage: "Wario Stadium".into(),
                category: "Any%".into(),
            },
            start_time: t(10),
            end_time: t(14),
            region: RegionConstraint::Both,
            proof_required: false,
            max_submissions,
            scoring: ScoringPolicy::default(),
            status: EventStatus::Upcoming,
            featured: false,
            tags: vec![],
            created_by: 1,
            created_at: t(9),
        })
        .await
        .unwrap()
}

fn run(event_id: i32, participant_id: i32, time_ms: u64) -> NewSubmission {
    NewSubmission {
        event_id,
        participant_id,
        time_ms,
        proof_image: None,
        classification: None,
        region: Region::Pal,
        notes: None,
        created_at: t(12),
    }
}

mod admission {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_stop_at_limit() {
        let store = Arc::new(fresh_store().await);
        let event = open_event(&store, 3).await;
        store.join_event(event.id, 7, t(11)).await.unwrap();

        let attempts = (0..12).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert_submission_within_limit(run(event.id, 7, 60_000 + i))
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let mut admitted = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => admitted += 1,
                Err(StoreError::LimitReached { max }) => assert_eq!(max, 3),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(store.count_submissions(event.id, 7).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rules_are_read_from_the_locked_event() {
        let store = fresh_store().await;
        let event = open_event(&store, 3).await;
        store.join_event(event.id, 7, t(11)).await.unwrap();
        store
            .update_event(
                event.id,
                EventPatch {
                    max_submissions: Some(1),
                    region: Some(RegionConstraint::Ntsc),
                    ..Default::default()
                },
                t(11),
            )
            .await
            .unwrap();

        let err = store
            .insert_submission_within_limit(run(event.id, 7, 60_000))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RegionMismatch { .. }));

        let mut ntsc = run(event.id, 7, 60_000);
        ntsc.region = Region::Ntsc;
        store.insert_submission_within_limit(ntsc.clone()).await.unwrap();
        let err = store.insert_submission_within_limit(ntsc).await.unwrap_err();
        assert!(matches!(err, StoreError::LimitReached { max: 1 }));

        let mut late = run(event.id, 8, 60_000);
        late.created_at = t(14);
        store.join_event(event.id, 8, t(11)).await.unwrap();
        let err = store.insert_submission_within_limit(late).await.unwrap_err();
        assert!(matches!(err, StoreError::EventClosed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn delete_racing_submissions_leaves_no_orphans() {
        let store = Arc::new(fresh_store().await);
        let event = open_event(&store, 3).await;
        for user_id in 1..=6 {
            store.join_event(event.id, user_id, t(11)).await.unwrap();
        }

        let inserts = (1..=6).map(|user_id| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert_submission_within_limit(run(event.id, user_id, 60_000))
                    .await
            })
        });
        let delete = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_event(event.id).await })
        };
        let inserted = futures::future::join_all(inserts)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count() as u64;
        let deleted = delete.await.unwrap().is_ok();

        let stored = store.submission_stats(event.id).await.unwrap().total;
        assert_eq!(stored, inserted);
        if deleted {
            assert_eq!(stored, 0);
        }
    }
}

mod review {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_approvals_give_contiguous_ranks() {
        let store = Arc::new(fresh_store().await);
        let event = open_event(&store, 1).await;

        let mut ids = Vec::new();
        for user_id in 1..=8 {
            store.join_event(event.id, user_id, t(11)).await.unwrap();
            // Slowest runner joins first, so approval order differs from rank order.
            let time_ms = 120_000 - 1_000 * user_id as u64;
            let sub = store
                .insert_submission_within_limit(run(event.id, user_id, time_ms))
                .await
                .unwrap();
            ids.push(sub.id);
        }

        let approvals = ids.iter().map(|&submission_id| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .apply_review(Review {
                        submission_id,
                        decision: ReviewDecision::Approve,
                        reviewer_id: 2,
                        admin_notes: None,
                        reviewed_at: t(13),
                    })
                    .await
            })
        });
        for result in futures::future::join_all(approvals).await {
            result.unwrap().unwrap();
        }

        let board = store.find_event(event.id).await.unwrap().unwrap().leaderboard;
        let ranks: Vec<u32> = board.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=8).collect::<Vec<_>>());

        // Fastest is the last runner to join.
        let expected: Vec<i32> = ids.iter().rev().copied().collect();
        let order: Vec<i32> = board.iter().map(|e| e.submission_id).collect();
        assert_eq!(order, expected);

        for entry in &board {
            let sub = store
                .find_submission(entry.submission_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sub.status, SubmissionStatus::Approved);
            assert_eq!(sub.rank, Some(entry.rank));
            assert_eq!(sub.points, Some(entry.points));
        }
    }

    #[tokio::test]
    async fn classification_after_review_is_refused() {
        let store = fresh_store().await;
        let event = open_event(&store, 1).await;
        store.join_event(event.id, 7, t(11)).await.unwrap();
        let sub = store
            .insert_submission_within_limit(run(event.id, 7, 60_000))
            .await
            .unwrap();
        store
            .apply_review(Review {
                submission_id: sub.id,
                decision: ReviewDecision::Disqualify,
                reviewer_id: 2,
                admin_notes: Some("Spliced video".into()),
                reviewed_at: t(13),
            })
            .await
            .unwrap();

        let err = store
            .set_classification(sub.id, ::common::ClassificationResult::unprocessed())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::NotPending(SubmissionStatus::Disqualified)
        ));
        let stored = store.find_submission(sub.id).await.unwrap().unwrap();
        assert!(stored.classification.is_none());
    }
}
