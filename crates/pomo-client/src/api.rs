use std::time::Duration;

use pomo_core::session::{IdempotencyKey, NewSession, Recorded, Session};
use pomo_core::task::{Cleared, NewTask, Task, TaskUpdate};
use pomo_core::timer::Completion;
use pomo_core::Listing;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::sync::SessionSink;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ─── ApiClient ────────────────────────────────────────────────────────────

/// Bearer-authenticated client for the `/api/v1` surface of `pomo serve`.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ClientError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }
        if !status.is_success() {
            let message = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        Ok(self.send(req).await?.json::<T>().await?)
    }

    // ─── Tasks ────────────────────────────────────────────────────────────

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let listing: Listing<Task> = self.json(self.http.get(self.url("/tasks"))).await?;
        Ok(listing.data)
    }

    pub async fn add_task(&self, description: &str) -> Result<Task, ClientError> {
        let body = NewTask {
            description: description.to_string(),
        };
        self.json(self.http.post(self.url("/tasks")).json(&body))
            .await
    }

    pub async fn set_task_completion(
        &self,
        task_id: &str,
        is_completed: bool,
    ) -> Result<Task, ClientError> {
        let body = TaskUpdate { is_completed };
        self.json(
            self.http
                .put(self.url(&format!("/tasks/{task_id}")))
                .json(&body),
        )
        .await
    }

    pub async fn delete_completed_tasks(&self) -> Result<usize, ClientError> {
        let cleared: Cleared = self
            .json(self.http.delete(self.url("/tasks/completed")))
            .await?;
        Ok(cleared.deleted)
    }

    // ─── Sessions ─────────────────────────────────────────────────────────

    /// Record a session. The server answers 201 for a new session and 200
    /// when `key` was already used, in which case the original is returned.
    pub async fn record_session(
        &self,
        new: &NewSession,
        key: Option<&IdempotencyKey>,
    ) -> Result<Recorded, ClientError> {
        let mut req = self.http.post(self.url("/sessions")).json(new);
        if let Some(key) = key {
            req = req.header(IDEMPOTENCY_HEADER, key.as_str());
        }
        let resp = self.send(req).await?;
        let replayed = resp.status() == StatusCode::OK;
        let session: Session = resp.json().await?;
        Ok(Recorded { session, replayed })
    }

    pub async fn session_history(&self) -> Result<Vec<Session>, ClientError> {
        let listing: Listing<Session> = self.json(self.http.get(self.url("/sessions"))).await?;
        Ok(listing.data)
    }
}

impl SessionSink for ApiClient {
    async fn record(&self, completion: &Completion) -> Result<Recorded, ClientError> {
        let key = IdempotencyKey::from(completion.id);
        self.record_session(&NewSession::from(completion), Some(&key))
            .await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::Matcher;
    use pomo_core::Mode;
    use serde_json::json;
    use uuid::Uuid;

    const TOKEN: &str = "tok-123";

    fn session_json(id: Uuid, duration: u32, mode: &str) -> String {
        json!({
            "id": id,
            "owner": "alice",
            "duration": duration,
            "type": mode,
            "completedAt": "2026-10-17T09:00:00Z",
        })
        .to_string()
    }

    #[tokio::test]
    async fn list_tasks_sends_bearer_and_unwraps_envelope() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("GET", "/api/v1/tasks")
            .match_header("authorization", format!("Bearer {TOKEN}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "count": 1,
                    "data": [{
                        "id": id,
                        "owner": "alice",
                        "description": "buy milk",
                        "isCompleted": false,
                        "createdAt": "2026-10-17T09:00:00Z",
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), TOKEN).unwrap();
        let tasks = client.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].description, "buy milk");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn put_sends_camel_case_flag() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("PUT", format!("/api/v1/tasks/{id}").as_str())
            .match_body(Matcher::Json(json!({ "isCompleted": true })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": id,
                    "owner": "alice",
                    "description": "read",
                    "isCompleted": true,
                    "createdAt": "2026-10-17T09:00:00Z",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), TOKEN).unwrap();
        let task = client
            .set_task_completion(&id.to_string(), true)
            .await
            .unwrap();
        assert!(task.is_completed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_carries_server_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", Matcher::Regex(r"^/api/v1/tasks/.+$".to_string()))
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"task not found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), TOKEN).unwrap();
        match client.set_task_completion("whatever", true).await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "task not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_maps_to_unauthenticated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/sessions")
            .with_status(401)
            .with_body(r#"{"error":"unauthenticated"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), "bad").unwrap();
        let err = client.session_history().await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn clear_returns_deleted_count() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/v1/tasks/completed")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"deleted":2}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/", server.url()), TOKEN).unwrap();
        assert_eq!(client.delete_completed_tasks().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sink_sends_completion_id_as_idempotency_key() {
        let mut server = mockito::Server::new_async().await;
        let completion = Completion {
            id: Uuid::new_v4(),
            mode: Mode::LongBreak,
            duration_secs: 900,
            completed_at: Utc::now(),
        };
        let session_id = Uuid::new_v4();

        let created = server
            .mock("POST", "/api/v1/sessions")
            .match_header(IDEMPOTENCY_HEADER, completion.id.to_string().as_str())
            .match_body(Matcher::Json(json!({ "duration": 900, "type": "longBreak" })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(session_json(session_id, 900, "longBreak"))
            .expect(1)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), TOKEN).unwrap();
        let recorded = client.record(&completion).await.unwrap();
        assert!(!recorded.replayed);
        assert_eq!(recorded.session.id, session_id);
        assert_eq!(recorded.session.mode, Mode::LongBreak);
        created.assert_async().await;

        let mut replaying = mockito::Server::new_async().await;
        replaying
            .mock("POST", "/api/v1/sessions")
            .match_header(IDEMPOTENCY_HEADER, completion.id.to_string().as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(session_json(session_id, 900, "longBreak"))
            .create_async()
            .await;
        let client = ApiClient::new(&replaying.url(), TOKEN).unwrap();
        let replay = client.record(&completion).await.unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.session.id, session_id);
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/sessions")
            .with_status(503)
            .with_body(r#"{"error":"store temporarily unavailable"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), TOKEN).unwrap();
        let new = NewSession {
            duration: 60,
            mode: "pomodoro".to_string(),
        };
        let err = client.record_session(&new, None).await.unwrap_err();
        assert!(err.is_transient());
    }
}
