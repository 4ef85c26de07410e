//! Vote transaction handler.
//!
//! The central write path: validate a ballot, apply it atomically
//! (ledger append + in-place tally bump in one transaction), then hand
//! the updated poll to the realtime publisher. The voter's own response
//! carries the tallies regardless of publication state; the visibility
//! gate applies only to the general read paths.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::Set;
use serde_json::json;
use tracing::{info, warn};
use univote_common::{AppError, AppResult, IdGenerator};
use univote_db::{
    entities::{poll, user, vote},
    repositories::PollRepository,
};

use super::{
    event_publisher::PollEventPublisherService,
    visibility::{self, Capabilities, PollView},
};

/// Vote service for casting ballots.
#[derive(Clone)]
pub struct VoteService {
    poll_repo: PollRepository,
    publisher: PollEventPublisherService,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub fn new(poll_repo: PollRepository, publisher: PollEventPublisherService) -> Self {
        Self {
            poll_repo,
            publisher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Cast a ballot on a poll.
    ///
    /// Validation short-circuits in order: the poll must exist, be
    /// ACTIVE and unexpired; the selection must fit the poll type and
    /// belong to the poll. Uniqueness per (user, poll) is adjudicated
    /// by the ledger's unique index at write time, not pre-checked, so
    /// concurrent submissions from one user commit exactly once.
    pub async fn cast_vote(
        &self,
        voter: &user::Model,
        poll_id: &str,
        option_ids: &[String],
    ) -> AppResult<PollView> {
        let caps = Capabilities::resolve(voter);
        if !caps.may_vote() {
            return Err(AppError::Forbidden(
                "Only students and faculty may vote".to_string(),
            ));
        }

        let (poll, options) = self.poll_repo.get_with_options(poll_id).await?;

        if poll.status != poll::PollStatus::Active || poll.expires_at <= Utc::now() {
            return Err(AppError::PollClosed);
        }

        if option_ids.is_empty() {
            return Err(AppError::InvalidSelection(
                "Select at least one option".to_string(),
            ));
        }
        if poll.poll_type == poll::PollType::SingleChoice && option_ids.len() != 1 {
            return Err(AppError::InvalidSelection(
                "Only one option is allowed for this poll type".to_string(),
            ));
        }

        let distinct: HashSet<&str> = option_ids.iter().map(String::as_str).collect();
        if distinct.len() != option_ids.len() {
            return Err(AppError::InvalidSelection(
                "Duplicate options in selection".to_string(),
            ));
        }
        let known: HashSet<&str> = options.iter().map(|o| o.id.as_str()).collect();
        if !distinct.is_subset(&known) {
            return Err(AppError::InvalidSelection(
                "Selected options do not belong to this poll".to_string(),
            ));
        }

        let entry = vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(voter.id.clone()),
            poll_id: Set(poll.id.clone()),
            selected_option_ids: Set(json!(option_ids)),
            created_at: Set(Utc::now().into()),
        };
        self.poll_repo.apply_vote(entry, poll_id, option_ids).await?;

        info!(poll_id, voter_id = %voter.id, "Vote recorded");

        // Re-read so the returned and broadcast tallies reflect the
        // committed state, concurrent ballots included.
        let (poll, options) = self.poll_repo.get_with_options(poll_id).await?;
        let view = visibility::full_view(&poll, &options);

        let payload = serde_json::to_value(&view)
            .map_err(|e| AppError::Internal(format!("Failed to encode poll payload: {e}")))?;
        if let Err(e) = self.publisher.publish_vote_update(poll_id, payload).await {
            // Broadcast is fire-and-forget; the vote stands either way.
            warn!(error = %e, poll_id, "Failed to broadcast vote update");
        }

        Ok(view)
    }
}
