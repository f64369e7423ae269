//! API integration tests.
//!
//! These tests drive the router end to end against a mock database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware::from_fn_with_state,
};
use chrono::Utc;
use livepoll_api::{StreamingState, auth_middleware, middleware::AppState, router as api_router};
use livepoll_common::PollingConfig;
use livepoll_core::{
    HostService, ParticipantService, PollService, ResponseService, ResultsService, SessionService,
};
use livepoll_db::entities::{
    host,
    poll::{self, PollStatus, PollType},
    poll_option, session,
};
use livepoll_db::repositories::{
    HostRepository, ParticipantRepository, PollRepository, ResponseRepository, SessionRepository,
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-token";

/// Create app state over one mock database shared by every repository.
fn create_test_state(db: DatabaseConnection) -> AppState {
    let db = Arc::new(db);
    let polling = PollingConfig::default();

    let host_repo = HostRepository::new(Arc::clone(&db));
    let session_repo = SessionRepository::new(Arc::clone(&db));
    let participant_repo = ParticipantRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let response_repo = ResponseRepository::new(Arc::clone(&db));

    let streaming = StreamingState::new();
    let publisher: livepoll_core::EventPublisherService = Arc::new(streaming.clone());

    let mut poll_service = PollService::new(poll_repo.clone(), session_repo.clone(), &polling);
    poll_service.set_event_publisher(Arc::clone(&publisher));
    let mut response_service = ResponseService::new(
        response_repo.clone(),
        poll_repo.clone(),
        participant_repo.clone(),
        polling.resubmission,
    );
    response_service.set_event_publisher(publisher);

    AppState {
        host_service: HostService::new(host_repo),
        session_service: SessionService::new(session_repo.clone(), poll_repo.clone(), &polling),
        participant_service: ParticipantService::new(participant_repo.clone(), session_repo.clone()),
        poll_service,
        response_service,
        results_service: ResultsService::new(poll_repo, session_repo, response_repo, participant_repo),
        streaming,
    }
}

/// Create the test router with the auth middleware in place.
fn create_test_router(db: DatabaseConnection) -> Router {
    let state = create_test_state(db);
    api_router()
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn test_host(id: &str) -> host::Model {
    host::Model {
        id: id.to_string(),
        email: format!("{id}@x.com"),
        name: "Host".to_string(),
        password_hash: "hash".to_string(),
        token: TOKEN.to_string(),
        created_at: Utc::now().into(),
    }
}

fn test_session(id: &str, host_id: &str) -> session::Model {
    session::Model {
        id: id.to_string(),
        host_id: host_id.to_string(),
        join_code: "ABC123".to_string(),
        name: "Lecture 1".to_string(),
        created_at: Utc::now().into(),
    }
}

fn test_poll(id: &str, status: PollStatus) -> poll::Model {
    poll::Model {
        id: id.to_string(),
        session_id: "s1".to_string(),
        question: "Color?".to_string(),
        poll_type: PollType::SingleChoice,
        status,
        created_at: Utc::now().into(),
        published_at: None,
        closed_at: None,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

fn authed(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_router(empty_db());

    let response = app.oneshot(get("/nonexistent/endpoint")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_host_routes_require_token() {
    let app = create_test_router(empty_db());

    let response = app.oneshot(get("/host/sessions")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<host::Model>::new()])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(authed("GET", "/host/sessions", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_with_invalid_email_returns_400() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/host/register")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"name":"Teacher","email":"nope","password":"long-enough"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_session_returns_join_code() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_host("h1")]])
        .append_query_results([[test_session("s1", "h1")]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(authed("POST", "/host/sessions", r#"{"name":"Lecture 1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "Lecture 1");
    assert_eq!(body["data"]["joinCode"], "ABC123");
}

#[tokio::test]
async fn test_publish_other_hosts_poll_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_host("h2")]])
        .append_query_results([[test_poll("p1", PollStatus::Draft)]])
        .append_query_results([[test_session("s1", "h1")]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(authed("PUT", "/host/polls/p1/publish", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_close_draft_poll_is_invalid_state() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_host("h1")]])
        .append_query_results([[test_poll("p1", PollStatus::Draft)]])
        .append_query_results([[test_session("s1", "h1")]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(authed("PUT", "/host/polls/p1/close", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_lookup_session_by_code() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_session("s1", "h1")]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/participant/sessions/abc123"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], "s1");
    assert_eq!(body["data"]["joinCode"], "ABC123");
}

#[tokio::test]
async fn test_lookup_unknown_code_returns_404() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<session::Model>::new()])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/participant/sessions/ZZZZZZ"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_published_polls_include_options() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_session("s1", "h1")]])
        .append_query_results([[test_poll("p1", PollStatus::Published)]])
        .append_query_results([[
            poll_option::Model {
                id: "o1".to_string(),
                poll_id: "p1".to_string(),
                position: 0,
                text: "Red".to_string(),
            },
            poll_option::Model {
                id: "o2".to_string(),
                poll_id: "p1".to_string(),
                position: 1,
                text: "Blue".to_string(),
            },
        ]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/participant/sessions/ABC123/polls"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["status"], "published");
    assert_eq!(body["data"][0]["options"][1]["text"], "Blue");
}

#[tokio::test]
async fn test_submit_without_participant_is_rejected() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/participant/polls/p1/submit")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"optionId":"o1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_sse_session_stream() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_session("s1", "h1")]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/streaming/sse/sessions/s1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_sse_unknown_session_returns_404() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<session::Model>::new()])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(get("/streaming/sse/sessions/missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
