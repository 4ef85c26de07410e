//! Poll lifecycle service.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use univote_common::{AppError, AppResult, IdGenerator};
use univote_db::{
    entities::{poll, poll_option, user},
    repositories::{PollRepository, VoteRepository},
};

use super::visibility::{self, Capabilities, PollView};

const MAX_OPTIONS: usize = 10;
const MAX_OPTION_LEN: usize = 100;

/// Poll service for lifecycle and read paths.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    vote_repo: VoteRepository,
    id_gen: IdGenerator,
}

/// Input for creating a poll.
pub struct CreatePollInput {
    pub question: String,
    pub options: Vec<String>,
    pub poll_type: poll::PollType,
    pub target_audience: poll::TargetAudience,
    pub expires_at: DateTime<Utc>,
}

/// Input for an admin settings update. `None` fields are left as-is.
#[derive(Default)]
pub struct UpdateSettingsInput {
    pub status: Option<poll::PollStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub target_audience: Option<poll::TargetAudience>,
}

/// A poll in a listing, annotated with the requester's vote status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPoll {
    #[serde(flatten)]
    pub poll: PollView,
    pub has_voted: bool,
}

/// Poll detail including the requester's prior selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetail {
    #[serde(flatten)]
    pub poll: PollView,
    /// Option IDs from the requester's ledger entry, empty if none.
    pub user_vote: Vec<String>,
    pub has_voted: bool,
}

/// One entry in a voter's history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteHistoryEntry {
    pub poll_id: String,
    pub poll_question: String,
    pub voted_for: Vec<String>,
    pub voted_at: String,
}

fn selected_ids(entry_options: &JsonValue) -> Vec<String> {
    entry_options
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(poll_repo: PollRepository, vote_repo: VoteRepository) -> Self {
        Self {
            poll_repo,
            vote_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a poll with its options.
    pub async fn create_poll(
        &self,
        creator: &user::Model,
        input: CreatePollInput,
    ) -> AppResult<PollView> {
        let caps = Capabilities::resolve(creator);
        if !caps.may_create_polls() {
            return Err(AppError::Forbidden(
                "You are not allowed to create polls".to_string(),
            ));
        }

        if input.question.trim().is_empty() {
            return Err(AppError::Validation(
                "Poll question cannot be empty".to_string(),
            ));
        }
        if input.options.len() < 2 {
            return Err(AppError::Validation(
                "Poll must have at least 2 options".to_string(),
            ));
        }
        if input.options.len() > MAX_OPTIONS {
            return Err(AppError::Validation(format!(
                "Poll cannot have more than {MAX_OPTIONS} options"
            )));
        }
        for text in &input.options {
            if text.trim().is_empty() {
                return Err(AppError::Validation(
                    "Poll options cannot be empty".to_string(),
                ));
            }
            if text.len() > MAX_OPTION_LEN {
                return Err(AppError::Validation(format!(
                    "Poll option is too long (max {MAX_OPTION_LEN} chars)"
                )));
            }
        }
        if input.expires_at <= Utc::now() {
            return Err(AppError::DeadlineInPast);
        }

        let poll_id = self.id_gen.generate();
        let poll_model = poll::ActiveModel {
            id: Set(poll_id.clone()),
            question: Set(input.question),
            poll_type: Set(input.poll_type),
            target_audience: Set(input.target_audience),
            status: Set(poll::PollStatus::Active),
            expires_at: Set(input.expires_at.into()),
            results_published: Set(false),
            created_by: Set(creator.id.clone()),
            created_at: Set(Utc::now().into()),
        };

        let options = input
            .options
            .into_iter()
            .enumerate()
            .map(|(i, option_text)| poll_option::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(poll_id.clone()),
                option_text: Set(option_text),
                votes: Set(0),
                display_order: Set(i as i32),
            })
            .collect();

        let (poll, options) = self.poll_repo.create(poll_model, options).await?;
        info!(poll_id = %poll.id, created_by = %creator.id, "Poll created");

        Ok(visibility::sanitize(&poll, &options, &caps))
    }

    /// List polls visible to the requester, newest first. Expired
    /// active polls are swept to CLOSED before the read.
    pub async fn list_polls(&self, requester: &user::Model) -> AppResult<Vec<ListedPoll>> {
        self.sweep().await?;

        let caps = Capabilities::resolve(requester);
        let polls = self
            .poll_repo
            .list_for_audience(caps.audience_filter())
            .await?;

        let voted: std::collections::HashSet<String> = self
            .vote_repo
            .voted_poll_ids(caps.user_id())
            .await?
            .into_iter()
            .collect();

        let mut listed = Vec::with_capacity(polls.len());
        for poll in polls {
            let options = self.poll_repo.options_of(&poll.id).await?;
            let has_voted = voted.contains(&poll.id);
            listed.push(ListedPoll {
                poll: visibility::sanitize(&poll, &options, &caps),
                has_voted,
            });
        }
        Ok(listed)
    }

    /// Get a poll's detail with the requester's prior selection.
    pub async fn get_poll(&self, requester: &user::Model, poll_id: &str) -> AppResult<PollDetail> {
        self.sweep().await?;

        let caps = Capabilities::resolve(requester);
        let (poll, options) = self.poll_repo.get_with_options(poll_id).await?;

        let user_vote = self
            .vote_repo
            .find_by_user_and_poll(caps.user_id(), poll_id)
            .await?
            .map(|entry| selected_ids(&entry.selected_option_ids))
            .unwrap_or_default();

        let has_voted = !user_vote.is_empty();
        Ok(PollDetail {
            poll: visibility::sanitize(&poll, &options, &caps),
            user_vote,
            has_voted,
        })
    }

    /// Update a poll's status, deadline or audience.
    ///
    /// Re-activation is refused while results are published, and
    /// refused with `DeadlineInPast` when the effective deadline is not
    /// in the future.
    pub async fn update_settings(
        &self,
        requester: &user::Model,
        poll_id: &str,
        input: UpdateSettingsInput,
    ) -> AppResult<PollView> {
        let caps = Capabilities::resolve(requester);
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if !caps.may_manage(&poll) {
            return Err(AppError::Forbidden(
                "You may not manage this poll".to_string(),
            ));
        }

        let effective_status = input.status.unwrap_or(poll.status);
        let effective_expires_at = input
            .expires_at
            .unwrap_or_else(|| poll.expires_at.with_timezone(&Utc));

        if effective_status == poll::PollStatus::Active {
            if poll.results_published {
                return Err(AppError::Conflict(
                    "A poll with published results cannot be re-opened".to_string(),
                ));
            }
            if effective_expires_at <= Utc::now() {
                return Err(AppError::DeadlineInPast);
            }
        }

        let mut active: poll::ActiveModel = poll.into();
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(expires_at) = input.expires_at {
            active.expires_at = Set(expires_at.into());
        }
        if let Some(audience) = input.target_audience {
            active.target_audience = Set(audience);
        }

        let updated = self.poll_repo.update(active).await?;
        info!(poll_id = %updated.id, "Poll settings updated");

        let options = self.poll_repo.options_of(&updated.id).await?;
        Ok(visibility::sanitize(&updated, &options, &caps))
    }

    /// Toggle result publication. Publishing closes the poll in the
    /// same operation; published and ACTIVE are mutually exclusive.
    pub async fn toggle_publish(
        &self,
        requester: &user::Model,
        poll_id: &str,
    ) -> AppResult<PollView> {
        let caps = Capabilities::resolve(requester);
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if !caps.may_manage(&poll) {
            return Err(AppError::Forbidden(
                "You may not manage this poll".to_string(),
            ));
        }

        let publishing = !poll.results_published;
        let mut active: poll::ActiveModel = poll.into();
        active.results_published = Set(publishing);
        if publishing {
            active.status = Set(poll::PollStatus::Closed);
        }

        let updated = self.poll_repo.update(active).await?;
        info!(poll_id = %updated.id, published = publishing, "Poll publication toggled");

        let options = self.poll_repo.options_of(&updated.id).await?;
        Ok(visibility::sanitize(&updated, &options, &caps))
    }

    /// Delete a poll. Ledger entries, options and feedback cascade away
    /// with it.
    pub async fn delete_poll(&self, requester: &user::Model, poll_id: &str) -> AppResult<()> {
        let caps = Capabilities::resolve(requester);
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if !caps.may_manage(&poll) {
            return Err(AppError::Forbidden(
                "You may not manage this poll".to_string(),
            ));
        }

        self.poll_repo.delete(&poll.id).await?;
        info!(poll_id = %poll.id, deleted_by = %requester.id, "Poll deleted");
        Ok(())
    }

    /// Transition expired active polls to CLOSED. Returns how many
    /// polls were transitioned.
    pub async fn sweep(&self) -> AppResult<u64> {
        let swept = self.poll_repo.close_expired(Utc::now()).await?;
        if swept > 0 {
            debug!(count = swept, "Swept expired polls to CLOSED");
        }
        Ok(swept)
    }

    /// The requester's voting history, newest first.
    pub async fn my_vote_history(
        &self,
        requester: &user::Model,
    ) -> AppResult<Vec<VoteHistoryEntry>> {
        let entries = self.vote_repo.list_by_user(&requester.id).await?;

        let mut history = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(poll) = self.poll_repo.find_by_id(&entry.poll_id).await? else {
                continue;
            };
            let options = self.poll_repo.options_of(&poll.id).await?;
            let picked = selected_ids(&entry.selected_option_ids);
            let voted_for = options
                .iter()
                .filter(|o| picked.contains(&o.id))
                .map(|o| o.option_text.clone())
                .collect();

            history.push(VoteHistoryEntry {
                poll_id: poll.id,
                poll_question: poll.question,
                voted_for,
                voted_at: entry.created_at.to_rfc3339(),
            });
        }
        Ok(history)
    }

    /// Polls created by the requester, newest first.
    pub async fn my_created_polls(&self, requester: &user::Model) -> AppResult<Vec<PollView>> {
        let caps = Capabilities::resolve(requester);
        let polls = self.poll_repo.list_by_creator(&requester.id).await?;

        let mut views = Vec::with_capacity(polls.len());
        for poll in polls {
            let options = self.poll_repo.options_of(&poll.id).await?;
            views.push(visibility::sanitize(&poll, &options, &caps));
        }
        Ok(views)
    }
}
