//! Integration tests for the chat API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use chatbot::api::public::chat::ChatSessionResponse;
    use chatbot::api::{AppState, app};
    use chatbot::openai::{Message, Role};

    use crate::test_utils::{
        Reply, StubBackend, body_to_string, test_app, test_app_with, test_config,
    };

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send_message(app: &Router, session_id: &str, message: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(post(
                "/api/chat",
                json!({"session_id": session_id, "message": message}),
            ))
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_string(response.into_body()).await)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn get_session_status(app: &Router, session_id: &str) -> StatusCode {
        let uri = format!("/api/chat/{}", session_id);
        app.clone().oneshot(get(&uri)).await.unwrap().status()
    }

    async fn get_session(app: &Router, session_id: &str) -> ChatSessionResponse {
        let uri = format!("/api/chat/{}", session_id);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        serde_json::from_str(&body).unwrap()
    }

    /// Tests that a session opened from the page starts with the default
    /// settings
    #[tokio::test]
    async fn it_gets_a_new_session() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(get("/?session_id=new-session"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = get_session(&app, "new-session").await;

        assert_eq!(session.session_id, "new-session");
        assert_eq!(session.model, "llama-3.1-8b-instant");
        assert_eq!(session.system_message, "You are a helpful assistant.");
        assert!(session.conversation.is_empty());
    }

    /// Tests that the response is streamed as growing prefixes
    #[tokio::test]
    async fn it_streams_the_response() {
        let backend = StubBackend::replying(vec![vec!["Hi", " there"]]);
        let app = test_app_with(backend);

        let (status, body) = send_message(&app, "stream-session", "hello").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("event: partial"));
        assert!(body.contains(r#"data: {"content":"Hi"}"#));
        assert!(body.contains(r#"data: {"content":"Hi there"}"#));
        assert!(body.contains("event: done"));
        assert!(!body.contains("event: error"));

        let session = get_session(&app, "stream-session").await;
        assert_eq!(
            session.conversation,
            vec![
                Message::new(Role::User, "hello"),
                Message::new(Role::Assistant, "Hi there"),
            ]
        );
    }

    /// Tests that each turn sends the whole transcript
    #[tokio::test]
    async fn it_sends_the_transcript_with_each_turn() {
        let backend = StubBackend::replying(vec![vec!["R1"], vec!["R2"]]);
        let app = test_app_with(backend.clone());

        send_message(&app, "turns", "a").await;
        send_message(&app, "turns", "b").await;

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].messages,
            vec![
                Message::new(Role::System, "You are a helpful assistant."),
                Message::new(Role::User, "a"),
                Message::new(Role::Assistant, "R1"),
                Message::new(Role::User, "b"),
            ]
        );
        assert_eq!(get_session(&app, "turns").await.conversation.len(), 4);
    }

    /// Tests that sessions don't share conversations
    #[tokio::test]
    async fn it_keeps_sessions_separate() {
        let app = test_app();

        send_message(&app, "session-a", "hello").await;

        assert_eq!(get_session(&app, "session-a").await.conversation.len(), 2);
        assert_eq!(
            get_session_status(&app, "session-b").await,
            StatusCode::NOT_FOUND
        );
    }

    /// Tests that looking up a session doesn't create it
    #[tokio::test]
    async fn it_returns_404_for_unknown_session() {
        let mut state = AppState::new(Arc::new(StubBackend::default()), test_config());
        state.session("known").unwrap();
        let state = Arc::new(RwLock::new(state));
        let app = app(Arc::clone(&state));

        for i in 0..10 {
            let status = get_session_status(&app, &format!("unknown-{}", i)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        assert_eq!(get_session_status(&app, "known").await, StatusCode::OK);
        assert_eq!(state.read().unwrap().session_count(), 1);
    }

    /// Tests that a failed turn is reported and leaves no trace
    #[tokio::test]
    async fn it_streams_backend_errors() {
        let backend = StubBackend::new(vec![Reply::RequestFails]);
        let app = test_app_with(backend);

        let (status, body) = send_message(&app, "failing", "hello").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("event: error"));
        assert!(body.contains("Invalid API Key"));
        assert!(get_session(&app, "failing").await.conversation.is_empty());
    }

    /// Tests that a response cut off part way is reported after the
    /// partial content and isn't kept
    #[tokio::test]
    async fn it_streams_errors_after_partial_content() {
        let backend = StubBackend::new(vec![Reply::FailsAfter(vec!["Hel", "lo"])]);
        let app = test_app_with(backend);

        let (status, body) = send_message(&app, "cut-off", "hello").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"data: {"content":"Hello"}"#));
        assert!(body.contains("event: error"));
        assert!(body.contains("connection reset"));
        assert!(!body.contains("event: done"));
        assert!(get_session(&app, "cut-off").await.conversation.is_empty());
    }

    /// Tests chat POST returns 400 for an empty message
    #[tokio::test]
    async fn it_returns_400_for_empty_message() {
        let app = test_app();

        let (status, _) = send_message(&app, "empty", "   ").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Tests chat POST returns 422 for missing fields
    #[tokio::test]
    async fn it_returns_422_for_missing_fields() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post("/api/chat", json!({"message": "Hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(post("/api/chat", json!({"session_id": "test-session"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    /// Tests that a second message is rejected while a turn is in flight
    #[tokio::test]
    async fn it_returns_409_while_responding() {
        let mut state = AppState::new(Arc::new(StubBackend::default()), test_config());
        let session = state.session("busy").unwrap();
        let app = app(Arc::new(RwLock::new(state)));

        let _turn_in_flight = session.lock().await;
        let (status, _) = send_message(&app, "busy", "hello").await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    /// Tests that the session can be read while a turn is in flight and
    /// shows the conversation as of the last completed turn
    #[tokio::test]
    async fn it_gets_a_session_while_responding() {
        let mut state = AppState::new(Arc::new(StubBackend::default()), test_config());
        let session = state.session("busy").unwrap();
        let app = app(Arc::new(RwLock::new(state)));
        send_message(&app, "busy", "hello").await;

        let _turn_in_flight = session.lock().await;
        let session = tokio::time::timeout(Duration::from_secs(5), get_session(&app, "busy"))
            .await
            .expect("Reading the session waited for the turn");

        assert_eq!(
            session.conversation,
            vec![
                Message::new(Role::User, "hello"),
                Message::new(Role::Assistant, "ok"),
            ]
        );
    }

    /// Tests that applying settings replaces the chatbot but keeps the
    /// displayed conversation
    #[tokio::test]
    async fn it_applies_settings() {
        let backend = StubBackend::default();
        let app = test_app_with(backend.clone());
        send_message(&app, "settings", "hello").await;

        let response = app
            .clone()
            .oneshot(post(
                "/api/chat/settings",
                json!({
                    "session_id": "settings",
                    "model": "llama-3.1-70b-versatile",
                    "system_message": "You are a pirate."
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = get_session(&app, "settings").await;
        assert_eq!(session.model, "llama-3.1-70b-versatile");
        assert_eq!(session.system_message, "You are a pirate.");
        assert_eq!(session.conversation.len(), 2);

        // The new chatbot starts from a fresh transcript
        send_message(&app, "settings", "ahoy").await;
        let requests = backend.requests();
        let last = requests.last().unwrap();
        assert_eq!(last.model, "llama-3.1-70b-versatile");
        assert_eq!(
            last.messages,
            vec![
                Message::new(Role::System, "You are a pirate."),
                Message::new(Role::User, "ahoy"),
            ]
        );
    }

    /// Tests settings POST returns 400 for a model that isn't offered
    #[tokio::test]
    async fn it_returns_400_for_unknown_model() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/chat/settings",
                json!({
                    "session_id": "unknown-model",
                    "model": "gpt-2",
                    "system_message": "S"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let session = get_session(&app, "unknown-model").await;
        assert_eq!(session.model, "llama-3.1-8b-instant");
    }

    /// Tests that resetting clears the conversation and the transcript
    #[tokio::test]
    async fn it_resets_the_conversation() {
        let backend = StubBackend::default();
        let app = test_app_with(backend.clone());
        send_message(&app, "reset", "a").await;
        send_message(&app, "reset", "b").await;

        let response = app
            .clone()
            .oneshot(post("/api/chat/reset", json!({"session_id": "reset"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(get_session(&app, "reset").await.conversation.is_empty());

        send_message(&app, "reset", "c").await;
        let requests = backend.requests();
        assert_eq!(requests.last().unwrap().messages.len(), 2);
    }

    /// Tests listing the models offered in the settings panel
    #[tokio::test]
    async fn it_lists_models() {
        let app = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
        assert_eq!(
            body["models"],
            json!(["llama-3.1-8b-instant", "llama-3.1-70b-versatile"])
        );
        assert_eq!(body["default_model"], "llama-3.1-8b-instant");
        assert_eq!(
            body["default_system_message"],
            "You are a helpful assistant."
        );
    }
}
