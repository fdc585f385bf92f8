use crate::common::{TestApp, routes};
use serde_json::json;

fn valid_event_body(title: &str) -> serde_json::Value {
    json!({
        "title": title,
        "description": "Fastest star grab wins.",
        "game": { "name": "Super Mario 64", "stage": "Whomp's Fortress" },
        "start_time": "2026-03-02T00:00:00Z",
        "end_time": "2026-03-03T00:00:00Z",
    })
}

mod create {
    use super::*;

    #[tokio::test]
    async fn applies_defaults() {
        let app = TestApp::spawn().await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &valid_event_body("Whomp sprint"),
                &app.organizer_token(),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["status"], "draft");
        assert_eq!(res.body["region"], "Both");
        assert_eq!(res.body["proof_required"], true);
        assert_eq!(res.body["max_submissions"], 3);
        assert_eq!(res.body["game"]["category"], "Any%");
        assert_eq!(res.body["scoring"]["points"]["first"], 100);
        assert_eq!(res.body["scoring"]["points"]["participation"], 10);
        assert_eq!(res.body["created_by"], 1);
    }

    #[tokio::test]
    async fn requires_manage_permission() {
        let app = TestApp::spawn().await;
        let token = app.token(10, &[]);

        let res = app
            .post_with_token(routes::EVENTS, &valid_event_body("Nope"), &token)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn requires_token() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::EVENTS, &valid_event_body("Nope"))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn rejects_inverted_window() {
        let app = TestApp::spawn().await;
        let mut body = valid_event_body("Backwards");
        body["end_time"] = json!("2026-03-01T00:00:00Z");

        let res = app
            .post_with_token(routes::EVENTS, &body, &app.organizer_token())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_unknown_category() {
        let app = TestApp::spawn().await;
        let mut body = valid_event_body("Odd category");
        body["game"]["category"] = json!("Blindfolded");

        let res = app
            .post_with_token(routes::EVENTS, &body, &app.organizer_token())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn upcoming_event_reports_active_inside_window() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app.get_without_token(&routes::event(id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "active");
    }

    #[tokio::test]
    async fn list_filters_by_stored_status() {
        let app = TestApp::spawn().await;
        app.create_open_event(json!({})).await;
        app.post_with_token(
            routes::EVENTS,
            &valid_event_body("Still a draft"),
            &app.organizer_token(),
        )
        .await;

        let all = app.get_without_token(routes::EVENTS).await;
        assert_eq!(all.status, 200);
        assert_eq!(all.body["data"].as_array().unwrap().len(), 2);

        let upcoming = app
            .get_without_token(&format!("{}?status=upcoming", routes::EVENTS))
            .await;
        let data = upcoming.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["title"], "Bob-omb Battlefield sprint");
        // Reported status follows the window.
        assert_eq!(data[0]["status"], "active");

        let bad = app
            .get_without_token(&format!("{}?status=sleeping", routes::EVENTS))
            .await;
        assert_eq!(bad.status, 400);
    }

    #[tokio::test]
    async fn missing_event_is_404() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::event(9999)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod update {
    use super::*;

    #[tokio::test]
    async fn patches_only_given_fields() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app
            .patch_with_token(
                &routes::event(id),
                &json!({ "title": "Renamed", "description": null }),
                &app.organizer_token(),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["title"], "Renamed");
        assert!(res.body["description"].is_null());
        assert_eq!(res.body["game"]["stage"], "Bob-omb Battlefield");
    }

    #[tokio::test]
    async fn rejects_end_before_existing_start() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app
            .patch_with_token(
                &routes::event(id),
                &json!({ "end_time": "2026-03-01T09:00:00Z" }),
                &app.organizer_token(),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod actions {
    use super::*;

    #[tokio::test]
    async fn publish_then_cancel() {
        let app = TestApp::spawn().await;
        let token = app.organizer_token();
        let id = app
            .post_with_token(routes::EVENTS, &valid_event_body("Lifecycle"), &token)
            .await
            .id();

        let published = app
            .post_with_token(&routes::event_action(id), &json!({ "action": "publish" }), &token)
            .await;
        assert_eq!(published.status, 200, "{}", published.text);
        assert_eq!(published.body["status"], "upcoming");

        let cancelled = app
            .post_with_token(&routes::event_action(id), &json!({ "action": "cancel" }), &token)
            .await;
        assert_eq!(cancelled.body["status"], "cancelled");

        let again = app
            .post_with_token(&routes::event_action(id), &json!({ "action": "publish" }), &token)
            .await;
        assert_eq!(again.status, 409);
        assert_eq!(again.body["code"], "STATE_CONFLICT");
    }

    #[tokio::test]
    async fn unknown_action_is_validation_error() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app
            .post_with_token(
                &routes::event_action(id),
                &json!({ "action": "explode" }),
                &app.organizer_token(),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn deletes_event_without_submissions() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app
            .delete_with_token(&routes::event(id), &app.organizer_token())
            .await;
        assert_eq!(res.status, 204);

        let gone = app.get_without_token(&routes::event(id)).await;
        assert_eq!(gone.status, 404);
    }

    #[tokio::test]
    async fn refuses_event_with_submissions() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        app.submit_ok(id, &runner, "1:00.00").await;

        let res = app
            .delete_with_token(&routes::event(id), &app.organizer_token())
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }
}

mod participation {
    use super::*;

    #[tokio::test]
    async fn join_list_and_leave() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);

        app.join(id, &runner).await;

        let dup = app.post_empty_with_token(&routes::join(id), &runner).await;
        assert_eq!(dup.status, 409);
        assert_eq!(dup.body["code"], "CONFLICT");

        let list = app.get_without_token(&routes::participants(id)).await;
        assert_eq!(list.status, 200);
        let entries = list.body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["user_id"], 10);

        let left = app.post_empty_with_token(&routes::leave(id), &runner).await;
        assert_eq!(left.status, 204);

        let list = app.get_without_token(&routes::participants(id)).await;
        assert!(list.body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cannot_join_draft() {
        let app = TestApp::spawn().await;
        let id = app
            .post_with_token(
                routes::EVENTS,
                &valid_event_body("Draft"),
                &app.organizer_token(),
            )
            .await
            .id();

        let res = app
            .post_empty_with_token(&routes::join(id), &app.token(10, &[]))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "EVENT_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn cannot_leave_after_submitting() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        app.submit_ok(id, &runner, "1:00.00").await;

        let res = app.post_empty_with_token(&routes::leave(id), &runner).await;

        assert_eq!(res.status, 409);
    }
}

mod stats {
    use super::*;

    #[tokio::test]
    async fn counts_by_status() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;
        let runner = app.token(10, &[]);
        app.join(id, &runner).await;
        let first = app.submit_ok(id, &runner, "1:00.00").await;
        app.submit_ok(id, &runner, "1:05.00").await;
        app.approve(first).await;

        let res = app
            .get_with_token(&routes::stats(id), &app.organizer_token())
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["participants"], 1);
        assert_eq!(res.body["submissions"]["total"], 2);
        assert_eq!(res.body["submissions"]["approved"], 1);
        assert_eq!(res.body["submissions"]["pending"], 1);
    }

    #[tokio::test]
    async fn hidden_from_participants() {
        let app = TestApp::spawn().await;
        let id = app.create_open_event(json!({})).await;

        let res = app
            .get_with_token(&routes::stats(id), &app.token(10, &[]))
            .await;

        assert_eq!(res.status, 403);
    }
}
