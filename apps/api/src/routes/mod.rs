pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session lifecycle
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/import",
            post(handlers::handle_import_session),
        )
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        // Interview actions
        .route(
            "/api/v1/sessions/:id/profile",
            post(handlers::handle_submit_profile),
        )
        .route(
            "/api/v1/sessions/:id/introduction",
            post(handlers::handle_submit_introduction),
        )
        .route(
            "/api/v1/sessions/:id/question",
            get(handlers::handle_current_question),
        )
        .route(
            "/api/v1/sessions/:id/answer",
            post(handlers::handle_submit_answer),
        )
        .route("/api/v1/sessions/:id/skip", post(handlers::handle_skip))
        .route(
            "/api/v1/sessions/:id/restart",
            post(handlers::handle_restart),
        )
        // Results
        .route(
            "/api/v1/sessions/:id/feedback",
            get(handlers::handle_feedback),
        )
        .route(
            "/api/v1/sessions/:id/transcript",
            get(handlers::handle_transcript),
        )
        .route(
            "/api/v1/sessions/:id/snapshot",
            get(handlers::handle_snapshot),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::interview::bundle::sample_bundle;
    use crate::llm_client::mock::{ScriptedConnector, ScriptedLlm};
    use crate::llm_client::{CredentialError, LlmConnector};
    use crate::state::SessionStore;

    const KEY: &str = "sk-test-key";

    fn test_state(connector: Arc<dyn LlmConnector>) -> AppState {
        AppState {
            bundle: Arc::new(sample_bundle()),
            connector,
            sessions: SessionStore::default(),
            config: Config::for_tests(),
        }
    }

    fn state_with(llm: Arc<ScriptedLlm>) -> AppState {
        test_state(Arc::new(ScriptedConnector::accepting(llm)))
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn profile_body() -> Value {
        json!({
            "age": "30",
            "current_industry": "IT",
            "current_role": "エンジニア",
            "current_title": "リーダー",
            "years_experience": "5年",
            "target_industry": "コンサルティング",
            "target_role": "データサイエンティスト"
        })
    }

    async fn create_session(state: &AppState) -> String {
        let (status, body) = send(
            state,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({ "api_key": KEY })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let (status, body) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "rollplay-api");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn test_create_session_rejects_malformed_key() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let (status, body) = send(
            &state,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({ "api_key": "not-a-key" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIAL");
        assert_eq!(body["error"]["reason"], "malformed_format");
        assert_eq!(state.sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_create_session_reports_probe_rejection() {
        let state = test_state(Arc::new(ScriptedConnector::rejecting(
            CredentialError::QuotaExceeded,
        )));
        let (status, body) = send(
            &state,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({ "api_key": KEY })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"]["reason"], "quota_exceeded");
        assert_eq!(state.sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_create_session_requires_some_key() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let (status, body) = send(&state, Method::POST, "/api/v1/sessions", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_session_uses_server_key() {
        let mut state = state_with(Arc::new(ScriptedLlm::default()));
        state.config.openai_api_key = Some(KEY.to_string());
        let (status, body) = send(&state, Method::POST, "/api/v1/sessions", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["stage"], "profile_collection");
        assert_eq!(body["total_questions"], 2);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let uri = format!("/api/v1/sessions/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_profile_and_stage_conflict() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let id = create_session(&state).await;

        let mut incomplete = profile_body();
        incomplete["target_role"] = json!("");
        let (status, body) = send(
            &state,
            Method::POST,
            &format!("/api/v1/sessions/{id}/profile"),
            Some(incomplete),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("target_role"));

        let (status, body) = send(
            &state,
            Method::POST,
            &format!("/api/v1/sessions/{id}/answer"),
            Some(json!({ "text": "早すぎる回答" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "STAGE_CONFLICT");
    }

    #[tokio::test]
    async fn test_interview_over_http() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "面接官：志望動機を教えてください。",
            "もう少し詳しく教えてください。",
            "評価はBです。次回も頑張りましょう！",
        ]));
        let state = state_with(llm.clone());
        let id = create_session(&state).await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, view) =
            send(&state, Method::POST, &format!("{base}/profile"), Some(profile_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stage"], "introduction");

        let (status, view) = send(
            &state,
            Method::POST,
            &format!("{base}/introduction"),
            Some(json!({ "text": "山田です。" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stage"], "questioning");
        assert_eq!(view["current_title"], "志望動機");
        assert_eq!(view["progress"], 1);

        let (status, question) = send(&state, Method::GET, &format!("{base}/question"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(question["text"], "志望動機を教えてください。");
        assert_eq!(question["display_text"], "志望動機を教えてください。\n");

        let (status, answer) = send(
            &state,
            Method::POST,
            &format!("{base}/answer"),
            Some(json!({ "text": "成長したいからです。" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["result"]["outcome"], "followup");
        assert_eq!(answer["result"]["followup_depth"], 1);
        assert_eq!(answer["session"]["followup_depth"], 1);

        let (status, view) = send(&state, Method::POST, &format!("{base}/skip"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stage"], "feedback");
        assert_eq!(view["interrupted"], true);

        let (status, feedback) = send(&state, Method::GET, &format!("{base}/feedback"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feedback["report"], "評価はBです。\n次回も頑張りましょう！\n");
        assert_eq!(feedback["interrupted"], true);

        let (_, again) = send(&state, Method::GET, &format!("{base}/feedback"), None).await;
        assert_eq!(again["report"], feedback["report"]);
        assert_eq!(llm.calls(), 3);

        let (status, transcript) =
            send(&state, Method::GET, &format!("{base}/transcript"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transcript["turns"].as_array().unwrap().len(), 4);
        assert!(transcript["text"]
            .as_str()
            .unwrap()
            .ends_with("面接官：志望動機を教えてください。\nあなた：成長したいからです。"));

        let (status, _) = send(&state, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&state, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_retryable_over_http() {
        let llm = Arc::new(ScriptedLlm::default());
        let state = state_with(llm.clone());
        let id = create_session(&state).await;
        let base = format!("/api/v1/sessions/{id}");
        send(&state, Method::POST, &format!("{base}/profile"), Some(profile_body())).await;
        send(
            &state,
            Method::POST,
            &format!("{base}/introduction"),
            Some(json!({ "text": "山田です。" })),
        )
        .await;

        let (status, body) = send(&state, Method::GET, &format!("{base}/question"), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "LLM_UNAVAILABLE");

        llm.push_reply("志望動機は？");
        let (status, question) = send(&state, Method::GET, &format!("{base}/question"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(question["text"], "志望動機は？");
    }

    #[tokio::test]
    async fn test_restart_keeps_profile_when_asked() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let id = create_session(&state).await;
        let base = format!("/api/v1/sessions/{id}");
        send(&state, Method::POST, &format!("{base}/profile"), Some(profile_body())).await;

        let (status, view) = send(
            &state,
            Method::POST,
            &format!("{base}/restart"),
            Some(json!({ "preserve_profile": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stage"], "profile_collection");
        assert_eq!(view["profile"]["target_role"], "データサイエンティスト");

        let (_, view) = send(
            &state,
            Method::POST,
            &format!("{base}/restart"),
            Some(json!({})),
        )
        .await;
        assert_eq!(view["profile"], Value::Null);
    }

    #[tokio::test]
    async fn test_snapshot_export_and_import() {
        let llm = Arc::new(ScriptedLlm::new(&["志望動機は？"]));
        let state = state_with(llm.clone());
        let id = create_session(&state).await;
        let base = format!("/api/v1/sessions/{id}");
        send(&state, Method::POST, &format!("{base}/profile"), Some(profile_body())).await;
        send(
            &state,
            Method::POST,
            &format!("{base}/introduction"),
            Some(json!({ "text": "山田です。" })),
        )
        .await;
        send(&state, Method::GET, &format!("{base}/question"), None).await;

        let (status, snapshot) = send(&state, Method::GET, &format!("{base}/snapshot"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["pending_question_text"], "志望動機は？");

        let (status, view) = send(
            &state,
            Method::POST,
            "/api/v1/sessions/import",
            Some(json!({ "api_key": KEY, "snapshot": snapshot })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_ne!(view["id"].as_str().unwrap(), id);
        assert_eq!(view["stage"], "questioning");

        let imported = format!("/api/v1/sessions/{}", view["id"].as_str().unwrap());
        let (_, question) = send(&state, Method::GET, &format!("{imported}/question"), None).await;
        assert_eq!(question["text"], "志望動機は？");
        assert_eq!(llm.calls(), 1, "cached question must survive the round trip");
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let id = create_session(&state).await;
        let base = format!("/api/v1/sessions/{id}");

        let ttl = state.config.session_idle_ttl;
        assert_eq!(state.sessions.sweep_idle(ttl, chrono::Utc::now()).await, 0);
        let (status, _) = send(&state, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::OK);

        let later = chrono::Utc::now() + ttl + chrono::Duration::minutes(1);
        assert_eq!(state.sessions.sweep_idle(ttl, later).await, 1);
        let (status, body) = send(&state, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_bodyless_create_and_restart() {
        let mut state = state_with(Arc::new(ScriptedLlm::default()));
        state.config.openai_api_key = Some(KEY.to_string());

        let (status, view) = send(&state, Method::POST, "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let base = format!("/api/v1/sessions/{}", view["id"].as_str().unwrap());
        send(&state, Method::POST, &format!("{base}/profile"), Some(profile_body())).await;

        let (status, view) = send(&state, Method::POST, &format!("{base}/restart"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stage"], "profile_collection");
        assert_eq!(view["profile"], Value::Null);
    }

    #[tokio::test]
    async fn test_import_rejects_broken_snapshot() {
        let state = state_with(Arc::new(ScriptedLlm::default()));
        let snapshot = json!({
            "stage": "questioning",
            "profile": profile_body(),
            "transcript": [{"speaker": "interviewer", "text": "Q"}, {"text": "A"}],
            "question_index": 0,
            "followup_depth": 0,
            "interrupted": false,
            "pending_question_text": null,
            "feedback_report": null
        });
        let (status, body) = send(
            &state,
            Method::POST,
            "/api/v1/sessions/import",
            Some(json!({ "api_key": KEY, "snapshot": snapshot })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
        assert_eq!(state.sessions.count().await, 0);
    }
}
