//! Poll feedback endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use univote_common::AppResult;
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Feedback submission request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(min = 1, max = 500))]
    pub comment: String,
}

/// Feedback response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub id: String,
    pub poll_id: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: String,
}

/// Feedback status for the requester.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStatusResponse {
    pub has_given: bool,
}

/// Submit feedback on a poll (once per user per poll).
async fn submit_feedback(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> AppResult<ApiResponse<FeedbackResponse>> {
    req.validate()?;
    let feedback = state
        .feedback_service
        .submit(&user, &poll_id, req.rating, req.comment)
        .await?;
    Ok(ApiResponse::ok(FeedbackResponse {
        id: feedback.id,
        poll_id: feedback.poll_id,
        rating: feedback.rating,
        comment: feedback.comment,
        created_at: feedback.created_at.to_rfc3339(),
    }))
}

/// Whether the requester already gave feedback on the poll (drives a
/// UI prompt only).
async fn my_feedback_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<FeedbackStatusResponse>> {
    let has_given = state.feedback_service.has_given(&user.id, &poll_id).await?;
    Ok(ApiResponse::ok(FeedbackStatusResponse { has_given }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/feedback", post(submit_feedback))
        .route("/{id}/feedback/mine", get(my_feedback_status))
}
