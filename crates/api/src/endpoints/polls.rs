//! Poll endpoints: listing, detail, voting, histories.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use univote_common::AppResult;
use univote_core::{ListedPoll, PollDetail, PollView, VoteHistoryEntry};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List polls visible to the requester. Expired polls are swept to
/// CLOSED first; tallies pass the visibility gate.
async fn list_polls(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ListedPoll>>> {
    let polls = state.poll_service.list_polls(&user).await?;
    Ok(ApiResponse::ok(polls))
}

/// Get a poll's detail, including the requester's prior selection and
/// the `resultsHidden` flag.
async fn get_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollDetail>> {
    let detail = state.poll_service.get_poll(&user, &poll_id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Vote request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_ids: Vec<String>,
}

/// Cast a vote. The response carries the committed tallies regardless
/// of publication state — the voter just voted and may see the
/// immediate result.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<PollView>> {
    let poll = state
        .vote_service
        .cast_vote(&user, &poll_id, &req.option_ids)
        .await?;
    Ok(ApiResponse::ok(poll))
}

/// The requester's voting history.
async fn my_vote_history(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<VoteHistoryEntry>>> {
    let history = state.poll_service.my_vote_history(&user).await?;
    Ok(ApiResponse::ok(history))
}

/// Polls created by the requester.
async fn my_created_polls(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PollView>>> {
    let polls = state.poll_service.my_created_polls(&user).await?;
    Ok(ApiResponse::ok(polls))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_polls))
        .route("/history/my-votes", get(my_vote_history))
        .route("/history/my-polls", get(my_created_polls))
        .route("/{id}", get(get_poll))
        .route("/{id}/vote", post(vote))
}
