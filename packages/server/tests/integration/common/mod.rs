use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ::common::ManualClock;
use reqwest::Client;
use serde_json::{Value, json};
use tempfile::TempDir;

use server::config::{
    AppConfig, AuthConfig, ClassificationMode, CorsConfig, DatabaseConfig, ServerConfig,
    SubmissionConfig,
};
use server::services::classification::{Classifier, RecognitionError, TextRecognizer};
use server::services::notify::Notifier;
use server::state::AppState;
use server::store::MemoryStore;
use server::utils::jwt::{self, PERM_EVENT_MANAGE, PERM_SUBMISSION_REVIEW};

pub mod pg;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";

/// Proof image present in every test media root. The stub recognizer reads
/// the text stored in the file itself.
pub const PROOF: &str = "proof.png";

pub mod routes {
    pub const EVENTS: &str = "/api/v1/events";
    pub const PENDING: &str = "/api/v1/submissions/pending";

    pub fn event(id: i32) -> String {
        format!("/api/v1/events/{id}")
    }

    pub fn event_action(id: i32) -> String {
        format!("/api/v1/events/{id}/actions")
    }

    pub fn join(id: i32) -> String {
        format!("/api/v1/events/{id}/join")
    }

    pub fn leave(id: i32) -> String {
        format!("/api/v1/events/{id}/leave")
    }

    pub fn participants(id: i32) -> String {
        format!("/api/v1/events/{id}/participants")
    }

    pub fn leaderboard(id: i32) -> String {
        format!("/api/v1/events/{id}/leaderboard")
    }

    pub fn best(id: i32) -> String {
        format!("/api/v1/events/{id}/best")
    }

    pub fn stats(id: i32) -> String {
        format!("/api/v1/events/{id}/stats")
    }

    pub fn event_submissions(id: i32) -> String {
        format!("/api/v1/events/{id}/submissions")
    }

    pub fn my_submissions(id: i32) -> String {
        format!("/api/v1/events/{id}/submissions/me")
    }

    pub fn submission(id: i32) -> String {
        format!("/api/v1/submissions/{id}")
    }

    pub fn notes(id: i32) -> String {
        format!("/api/v1/submissions/{id}/notes")
    }

    pub fn review(id: i32, decision: &str) -> String {
        format!("/api/v1/submissions/{id}/{decision}")
    }
}

/// Reads the "image" as UTF-8 text, standing in for an OCR engine.
struct FileText;

#[async_trait]
impl TextRecognizer for FileText {
    async fn recognize(&self, image: &Path) -> Result<String, RecognitionError> {
        tokio::fs::read_to_string(image)
            .await
            .map_err(|e| RecognitionError::Failed(e.to_string()))
    }
}

/// Fixed "now" all tests start from.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub clock: Arc<ManualClock>,
    pub media: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(ClassificationMode::Inline).await
    }

    pub async fn spawn_with(mode: ClassificationMode) -> Self {
        let media = tempfile::tempdir().expect("Failed to create media dir");
        std::fs::write(media.path().join(PROOF), "FINAL TIME 2:15.50")
            .expect("Failed to write proof image");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig { url: None },
            auth: AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
            },
            submission: SubmissionConfig {
                media_root: media.path().to_path_buf(),
                classification_mode: mode,
                ..Default::default()
            },
            mq: Default::default(),
        };

        let clock = Arc::new(ManualClock::new(test_now()));
        let state = AppState {
            config: Arc::new(app_config),
            store: Arc::new(MemoryStore::new()),
            clock: clock.clone(),
            classifier: Classifier::new(Arc::new(FileText), Duration::from_secs(2)),
            notifier: Notifier::new(clock.clone()),
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            clock,
            media,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Put a proof image with the given recognizable text into the media root.
    pub fn write_proof(&self, name: &str, text: &str) {
        std::fs::write(self.media.path().join(name), text).expect("Failed to write proof image");
    }

    pub fn token(&self, user_id: i32, permissions: &[&str]) -> String {
        jwt::sign(JWT_SECRET, user_id, &format!("user{user_id}"), permissions)
            .expect("Failed to sign token")
    }

    pub fn organizer_token(&self) -> String {
        self.token(1, &[PERM_EVENT_MANAGE])
    }

    pub fn reviewer_token(&self) -> String {
        self.token(2, &[PERM_SUBMISSION_REVIEW])
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    /// POST with no body at all.
    pub async fn post_empty_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Create an event that is open at [`test_now`] and return its `id`.
    ///
    /// `overrides` is merged over the default body.
    pub async fn create_open_event(&self, overrides: Value) -> i32 {
        let mut body = json!({
            "title": "Bob-omb Battlefield sprint",
            "game": { "name": "Super Mario 64", "stage": "Bob-omb Battlefield", "category": "Any%" },
            "start_time": "2026-03-01T10:00:00Z",
            "end_time": "2026-03-01T14:00:00Z",
            "status": "upcoming",
            "proof_required": false,
            "max_submissions": 3,
        });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }

        let res = self
            .post_with_token(routes::EVENTS, &body, &self.organizer_token())
            .await;
        assert_eq!(res.status, 201, "create_event failed: {}", res.text);
        res.id()
    }

    pub async fn join(&self, event_id: i32, token: &str) {
        let res = self
            .post_empty_with_token(&routes::join(event_id), token)
            .await;
        assert_eq!(res.status, 201, "join failed: {}", res.text);
    }

    /// Submit a run and return the raw response.
    pub async fn submit(&self, event_id: i32, token: &str, body: Value) -> TestResponse {
        self.post_with_token(&routes::event_submissions(event_id), &body, token)
            .await
    }

    /// Submit a run that must be admitted and return its `id`.
    pub async fn submit_ok(&self, event_id: i32, token: &str, time: &str) -> i32 {
        let res = self
            .submit(event_id, token, json!({ "time": time, "region": "PAL" }))
            .await;
        assert_eq!(res.status, 201, "submit failed: {}", res.text);
        res.id()
    }

    pub async fn approve(&self, submission_id: i32) -> TestResponse {
        self.post_empty_with_token(
            &routes::review(submission_id, "approve"),
            &self.reviewer_token(),
        )
        .await
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> i32 {
        self.body["id"]
            .as_i64()
            .expect("response body should contain 'id'") as i32
    }
}
