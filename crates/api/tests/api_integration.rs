//! API integration tests.
//!
//! Drive the router end-to-end over a mock database: authentication
//! middleware, extractors, capability checks and response envelopes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use tower::ServiceExt;
use univote_api::{
    PollBroadcaster, middleware::AppState, middleware::auth_middleware, router as api_router,
};
use univote_core::{FeedbackService, PollService, UserService, VoteService};
use univote_db::entities::{poll, user, vote};
use univote_db::repositories::{
    FeedbackRepository, PollRepository, UserRepository, VoteRepository,
};

fn make_user(role: user::UserRole) -> user::Model {
    user::Model {
        id: "u1".to_string(),
        username: "alice".to_string(),
        name: "Alice".to_string(),
        email: "alice@example.edu".to_string(),
        role,
        managed_poll_ids: None,
        token: Some("tok".to_string()),
        created_at: Utc::now().into(),
    }
}

fn test_app(db: DatabaseConnection) -> Router {
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let feedback_repo = FeedbackRepository::new(Arc::clone(&db));

    let broadcaster = PollBroadcaster::new();
    let state = AppState {
        user_service: UserService::new(user_repo),
        poll_service: PollService::new(poll_repo.clone(), vote_repo),
        vote_service: VoteService::new(poll_repo.clone(), Arc::new(broadcaster.clone())),
        feedback_service: FeedbackService::new(feedback_repo, poll_repo),
        broadcaster,
    };

    Router::new()
        .nest("/api", api_router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
    req.header(header::AUTHORIZATION, "Bearer tok")
}

#[tokio::test]
async fn test_list_polls_requires_auth() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/polls")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_polls_returns_empty_list() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // auth middleware token lookup
        .append_query_results([vec![make_user(user::UserRole::Student)]])
        // sweep's conditional UPDATE
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        // poll listing, then the requester's ledger entries
        .append_query_results([Vec::<poll::Model>::new()])
        .append_query_results([Vec::<vote::Model>::new()])
        .into_connection();
    let app = test_app(db);

    let response = app
        .oneshot(
            authed(Request::builder().uri("/api/polls"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_vote_on_missing_poll_is_404() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![make_user(user::UserRole::Student)]])
        .append_query_results([Vec::<poll::Model>::new()])
        .into_connection();
    let app = test_app(db);

    let response = app
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri("/api/polls/nope/vote")
                    .header(header::CONTENT_TYPE, "application/json"),
            )
            .body(Body::from(r#"{"optionIds":["o1"]}"#))
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_students_cannot_create_polls() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![make_user(user::UserRole::Student)]])
        .into_connection();
    let app = test_app(db);

    let body = serde_json::json!({
        "question": "Cafeteria hours?",
        "options": ["Longer", "Shorter"],
        "pollType": "SINGLE_CHOICE",
        "targetAudience": "ALL",
        "expiresAt": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
    });
    let response = app
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/polls")
                    .header(header::CONTENT_TYPE, "application/json"),
            )
            .body(Body::from(body.to_string()))
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_vote_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![make_user(user::UserRole::Admin)]])
        .into_connection();
    let app = test_app(db);

    let response = app
        .oneshot(
            authed(
                Request::builder()
                    .method("POST")
                    .uri("/api/polls/p1/vote")
                    .header(header::CONTENT_TYPE, "application/json"),
            )
            .body(Body::from(r#"{"optionIds":["o1"]}"#))
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
