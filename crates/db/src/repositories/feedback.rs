//! Feedback repository.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    error::SqlErr,
};
use univote_common::{AppError, AppResult};

use crate::entities::{Feedback, feedback};

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Feedback repository for database operations.
#[derive(Clone)]
pub struct FeedbackRepository {
    db: Arc<DatabaseConnection>,
}

impl FeedbackRepository {
    /// Create a new feedback repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a feedback entry. The (user_id, poll_id) unique index
    /// rejects a second submission.
    pub async fn create(&self, model: feedback::ActiveModel) -> AppResult<feedback::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(
                    "Feedback already submitted for this poll".to_string(),
                ),
                _ => db_err(e),
            }
        })
    }

    /// Whether the user has already given feedback on the poll.
    pub async fn has_given(&self, user_id: &str, poll_id: &str) -> AppResult<bool> {
        let count = Feedback::find()
            .filter(feedback::Column::UserId.eq(user_id))
            .filter(feedback::Column::PollId.eq(poll_id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// List all feedback for a poll.
    pub async fn list_by_poll(&self, poll_id: &str) -> AppResult<Vec<feedback::Model>> {
        Feedback::find()
            .filter(feedback::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
