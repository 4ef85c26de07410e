//! Feedback service (one rating + comment per user per poll).
//!
//! Peripheral to the voting core: the only consumer is a UI prompt
//! asking whether the user has already left feedback.

use chrono::Utc;
use sea_orm::Set;
use univote_common::{AppError, AppResult, IdGenerator};
use univote_db::{
    entities::{feedback, user},
    repositories::{FeedbackRepository, PollRepository},
};

const MAX_COMMENT_LEN: usize = 500;

/// Feedback service.
#[derive(Clone)]
pub struct FeedbackService {
    feedback_repo: FeedbackRepository,
    poll_repo: PollRepository,
    id_gen: IdGenerator,
}

impl FeedbackService {
    /// Create a new feedback service.
    #[must_use]
    pub const fn new(feedback_repo: FeedbackRepository, poll_repo: PollRepository) -> Self {
        Self {
            feedback_repo,
            poll_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Submit feedback on a poll. A second submission for the same poll
    /// is rejected by the unique index.
    pub async fn submit(
        &self,
        user: &user::Model,
        poll_id: &str,
        rating: i16,
        comment: String,
    ) -> AppResult<feedback::Model> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let comment = comment.trim().to_string();
        if comment.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }
        if comment.len() > MAX_COMMENT_LEN {
            return Err(AppError::Validation(format!(
                "Comment is too long (max {MAX_COMMENT_LEN} chars)"
            )));
        }

        let poll = self.poll_repo.get_by_id(poll_id).await?;

        self.feedback_repo
            .create(feedback::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user.id.clone()),
                poll_id: Set(poll.id),
                rating: Set(rating),
                comment: Set(comment),
                created_at: Set(Utc::now().into()),
            })
            .await
    }

    /// Whether the user has already given feedback on the poll.
    pub async fn has_given(&self, user_id: &str, poll_id: &str) -> AppResult<bool> {
        self.feedback_repo.has_given(user_id, poll_id).await
    }
}
