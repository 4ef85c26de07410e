//! Vote ledger repository.
//!
//! Read and delete operations over the append-only ledger. The insert
//! itself lives in [`crate::repositories::PollRepository::apply_vote`]
//! so the uniqueness adjudication and the tally bump share one
//! transaction.

use std::sync::Arc;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use univote_common::{AppError, AppResult};

use crate::entities::{Vote, vote};

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Vote ledger repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Check whether a user has a ledger entry for a poll.
    pub async fn has_voted(&self, user_id: &str, poll_id: &str) -> AppResult<bool> {
        let count = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Find a user's ledger entry for a poll, if any.
    pub async fn find_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// List a user's ledger entries, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .order_by_desc(vote::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// List all ledger entries for a poll.
    pub async fn list_by_poll(&self, poll_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// IDs of every poll the user has voted on (for list-view
    /// annotation).
    pub async fn voted_poll_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let entries = self.list_by_user(user_id).await?;
        Ok(entries.into_iter().map(|e| e.poll_id).collect())
    }

    /// Delete every ledger entry for a poll.
    pub async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::PollId.eq(poll_id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    /// Delete every ledger entry cast by a user.
    pub async fn delete_by_user(&self, user_id: &str) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}
