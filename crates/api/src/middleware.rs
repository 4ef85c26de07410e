//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use univote_core::{FeedbackService, PollService, UserService, VoteService};

use crate::streaming::PollBroadcaster;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub poll_service: PollService,
    pub vote_service: VoteService,
    pub feedback_service: FeedbackService,
    pub broadcaster: PollBroadcaster,
}

/// Authentication middleware.
///
/// Resolves a bearer token to a user and stores it in the request
/// extensions; token issuance happens outside this service.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    if let Some(token) = token {
        if let Ok(user) = state.user_service.authenticate_by_token(&token).await {
            req.extensions_mut().insert(user);
        }
    }

    next.run(req).await
}
