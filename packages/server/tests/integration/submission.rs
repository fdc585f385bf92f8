use crate::common::{PROOF, TestApp, routes};
use serde_json::json;

mod admission {
    use super::*;

    #[tokio::test]
    async fn proof_required_then_accepted() {
        let app = TestApp::spawn().await;
        let id = app
            .create_open_event(json!({ "proof_required": true }))
            .await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        let refused = app
            .submit(id, &runner, json!({ "time": "2:15.50", "region": "PAL" }))
            .await;
        assert_eq!(refused.status, 400);
        assert_eq!(refused.body["code"], "PROOF_REQUIRED");

        let res = app
            .submit(
                id,
                &runner,
                json!({ "time": "2:15.50", "region": "PAL", "proof_image": PROOF }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["time_ms"], 135500);
        assert_eq!(res.body["time_text"], "2:15.500");
        assert_eq!(res.body["status"], "pending");
        assert_eq!(res.body["participant_id"], 10);
        assert!(res.body["rank"].is_null());
        assert_eq!(
            res.body["classification"]["extracted_time_text"],
            "2:15.500"
        );
        assert_eq!(res.body["classification"]["was_processed"], true);
        assert_eq!(res.body["flagged"], false);
    }

    #[tokio::test]
    async fn disagreeing_proof_is_flagged_but_admitted() {
        let app = TestApp::spawn().await;
        app.write_proof("other.png", "TIME 3:40.00");
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        let res = app
            .submit(
                id,
                &runner,
                json!({ "time": "2:15.50", "region": "PAL", "proof_image": "other.png" }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["time_ms"], 135500);
        assert_eq!(res.body["flagged"], true);
    }

    #[tokio::test]
    async fn must_join_first() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app
            .submit(
                id,
                &app.token(10, &[]),
                json!({ "time": "1:00.00", "region": "PAL" }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "NOT_PARTICIPATING");
    }

    #[tokio::test]
    async fn limit_is_enforced() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({ "max_submissions": 2 })).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        app.submit_ok(id, &runner, "1:00.00").await;
        app.submit_ok(id, &runner, "1:01.00").await;

        let res = app
            .submit(id, &runner, json!({ "time": "1:02.00", "region": "PAL" }))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "SUBMISSION_LIMIT_REACHED");
    }

    #[tokio::test]
    async fn malformed_time() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        for time in ["1:5.00", "abc", "1:05", "", "153722867280912:55.808"] {
            let res = app
                .submit(id, &runner, json!({ "time": time, "region": "PAL" }))
                .await;
            assert_eq!(res.status, 400, "time {time:?}");
            assert_eq!(res.body["code"], "INVALID_TIME_FORMAT", "time {time:?}");
        }
    }

    #[tokio::test]
    async fn region_must_match() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({ "region": "NTSC" })).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        let res = app
            .submit(id, &runner, json!({ "time": "1:00.00", "region": "PAL" }))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "REGION_MISMATCH");
    }

    #[tokio::test]
    async fn closed_after_window() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        // Window ends at 14:00, tests start at 12:00.
        app.clock.advance(chrono::Duration::hours(2));

        let res = app
            .submit(id, &runner, json!({ "time": "1:00.00", "region": "PAL" }))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "EVENT_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn proof_name_must_stay_in_media_root() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        for name in ["../secret.png", "nested/proof.png", "missing.png"] {
            let res = app
                .submit(
                    id,
                    &runner,
                    json!({ "time": "1:00.00", "region": "PAL", "proof_image": name }),
                )
                .await;
            assert_eq!(res.status, 400, "proof {name:?}");
            assert_eq!(res.body["code"], "VALIDATION_ERROR", "proof {name:?}");
        }
    }
}

mod background {
    use super::*;
    use server::config::ClassificationMode;
    use std::time::Duration;

    #[tokio::test]
    async fn classification_is_attached_later() {
        let app = TestApp::spawn_with(ClassificationMode::Background).await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        let res = app
            .submit(
                id,
                &runner,
                json!({ "time": "2:15.50", "region": "PAL", "proof_image": PROOF }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let submission_id = res.id();

        let mut classification = serde_json::Value::Null;
        for _ in 0..50 {
            let res = app
                .get_with_token(&routes::submission(submission_id), &runner)
                .await;
            classification = res.body["classification"].clone();
            if !classification.is_null() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(classification["extracted_time_text"], "2:15.500");
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn lists_own_submissions_only() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let alice = app.token(10, &[]);
        let bob = app.token(11, &[]);
        app.join(id, &alice).await;
        app.join(id, &bob).await;
        app.submit_ok(id, &alice, "1:00.00").await;
        app.submit_ok(id, &alice, "1:01.00").await;
        app.submit_ok(id, &bob, "1:02.00").await;

        let res = app.get_with_token(&routes::my_submissions(id), &alice).await;

        assert_eq!(res.status, 200);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|s| s["participant_id"] == 10));
    }

    #[tokio::test]
    async fn other_participants_runs_are_hidden() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let alice = app.token(10, &[]);
        app.join(id, &alice).await;
        let submission_id = app.submit_ok(id, &alice, "1:00.00").await;

        let stranger = app
            .get_with_token(&routes::submission(submission_id), &app.token(11, &[]))
            .await;
        assert_eq!(stranger.status, 404);

        let reviewer = app
            .get_with_token(&routes::submission(submission_id), &app.reviewer_token())
            .await;
        assert_eq!(reviewer.status, 200);
        assert_eq!(reviewer.body["id"], submission_id);
    }
}

mod notes {
    use super::*;

    #[tokio::test]
    async fn edit_and_clear() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        let submission_id = app.submit_ok(id, &runner, "1:00.00").await;

        let res = app
            .patch_with_token(
                &routes::notes(submission_id),
                &json!({ "notes": "Used the cannon skip" }),
                &runner,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["notes"], "Used the cannon skip");

        let res = app
            .patch_with_token(&routes::notes(submission_id), &json!({}), &runner)
            .await;
        assert_eq!(res.body["notes"], "Used the cannon skip");

        let res = app
            .patch_with_token(
                &routes::notes(submission_id),
                &json!({ "notes": null }),
                &runner,
            )
            .await;
        assert!(res.body["notes"].is_null());
    }

    #[tokio::test]
    async fn too_long() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;

        let res = app
            .submit(
                id,
                &runner,
                json!({ "time": "1:00.00", "region": "PAL", "notes": "x".repeat(1001) }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn frozen_after_review() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        let submission_id = app.submit_ok(id, &runner, "1:00.00").await;
        app.approve(submission_id).await;

        let res = app
            .patch_with_token(
                &routes::notes(submission_id),
                &json!({ "notes": "late edit" }),
                &runner,
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "STATE_CONFLICT");
    }
}

mod withdraw {
    use super::*;

    #[tokio::test]
    async fn frees_a_slot() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({ "max_submissions": 1 })).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        let submission_id = app.submit_ok(id, &runner, "1:00.00").await;

        let res = app
            .delete_with_token(&routes::submission(submission_id), &runner)
            .await;
        assert_eq!(res.status, 204);

        let gone = app
            .get_with_token(&routes::submission(submission_id), &runner)
            .await;
        assert_eq!(gone.status, 404);

        app.submit_ok(id, &runner, "0:59.00").await;
    }

    #[tokio::test]
    async fn owner_only() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        let submission_id = app.submit_ok(id, &runner, "1:00.00").await;

        let res = app
            .delete_with_token(&routes::submission(submission_id), &app.token(11, &[]))
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn refused_after_review() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        let submission_id = app.submit_ok(id, &runner, "1:00.00").await;
        app.approve(submission_id).await;

        let res = app
            .delete_with_token(&routes::submission(submission_id), &runner)
            .await;

        assert_eq!(res.status, 409);
    }
}
