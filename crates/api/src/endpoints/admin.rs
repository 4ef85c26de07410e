//! Admin poll-management endpoints.
//!
//! Authorization is per poll through the requester's capability set
//! (super-admin, admin, scope-limited sub-admin, or faculty creator),
//! resolved in the core services — never role-string matching here.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post, put},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use univote_common::AppResult;
use validator::Validate;
use univote_core::{CreatePollInput, PollView, UpdateSettingsInput};
use univote_db::entities::poll;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Create poll request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    #[validate(length(min = 2, max = 10))]
    pub options: Vec<String>,
    #[serde(default = "default_poll_type")]
    pub poll_type: poll::PollType,
    #[serde(default = "default_audience")]
    pub target_audience: poll::TargetAudience,
    pub expires_at: DateTime<Utc>,
}

const fn default_poll_type() -> poll::PollType {
    poll::PollType::SingleChoice
}

const fn default_audience() -> poll::TargetAudience {
    poll::TargetAudience::All
}

/// Create a poll.
async fn create_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<ApiResponse<PollView>> {
    req.validate()?;
    let poll = state
        .poll_service
        .create_poll(
            &user,
            CreatePollInput {
                question: req.question,
                options: req.options,
                poll_type: req.poll_type,
                target_audience: req.target_audience,
                expires_at: req.expires_at,
            },
        )
        .await?;
    Ok(ApiResponse::ok(poll))
}

/// Settings update request. Omitted fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub status: Option<poll::PollStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub target_audience: Option<poll::TargetAudience>,
}

/// Update a poll's status, deadline or audience.
async fn update_settings(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<UpdateSettingsRequest>,
) -> AppResult<ApiResponse<PollView>> {
    let poll = state
        .poll_service
        .update_settings(
            &user,
            &poll_id,
            UpdateSettingsInput {
                status: req.status,
                expires_at: req.expires_at,
                target_audience: req.target_audience,
            },
        )
        .await?;
    Ok(ApiResponse::ok(poll))
}

/// Toggle result publication. Publishing closes the poll.
async fn toggle_publish(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollView>> {
    let poll = state.poll_service.toggle_publish(&user, &poll_id).await?;
    Ok(ApiResponse::ok(poll))
}

/// Delete a poll and, through the cascades, its ledger entries.
async fn delete_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<impl axum::response::IntoResponse> {
    state.poll_service.delete_poll(&user, &poll_id).await?;
    Ok(response::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/polls", post(create_poll))
        .route("/polls/{id}/settings", put(update_settings))
        .route("/polls/{id}/publish", put(toggle_publish))
        .route("/polls/{id}", delete(delete_poll))
}
