//! Poll repository: the poll store and the transactional vote write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
    error::SqlErr,
    sea_query::Expr,
};
use univote_common::{AppError, AppResult};

use crate::entities::{Poll, PollOption, poll, poll_option, vote};

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, poll_id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(poll_id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a poll by ID, returning an error if not found.
    pub async fn get_by_id(&self, poll_id: &str) -> AppResult<poll::Model> {
        self.find_by_id(poll_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {poll_id}")))
    }

    /// Get a poll's options in ballot display order.
    pub async fn options_of(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::DisplayOrder)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a poll together with its ordered options.
    pub async fn get_with_options(
        &self,
        poll_id: &str,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let poll = self.get_by_id(poll_id).await?;
        let options = self.options_of(poll_id).await?;
        Ok((poll, options))
    }

    /// List polls, newest first. `audience` of `None` lists every poll;
    /// otherwise only polls targeted at that audience or at ALL.
    pub async fn list_for_audience(
        &self,
        audience: Option<poll::TargetAudience>,
    ) -> AppResult<Vec<poll::Model>> {
        let mut query = Poll::find();
        if let Some(aud) = audience {
            query = query.filter(
                poll::Column::TargetAudience.is_in([aud, poll::TargetAudience::All]),
            );
        }
        query
            .order_by_desc(poll::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// List polls created by a user, newest first.
    pub async fn list_by_creator(&self, user_id: &str) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::CreatedBy.eq(user_id))
            .order_by_desc(poll::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a poll together with its options. Both commit together or
    /// neither does.
    pub async fn create(
        &self,
        poll: poll::ActiveModel,
        options: Vec<poll_option::ActiveModel>,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let poll = poll.insert(&txn).await.map_err(db_err)?;
        let mut created = Vec::with_capacity(options.len());
        for option in options {
            created.push(option.insert(&txn).await.map_err(db_err)?);
        }

        txn.commit().await.map_err(db_err)?;
        Ok((poll, created))
    }

    /// Apply one accepted ballot: append the ledger entry and bump the
    /// selected tallies, in a single transaction.
    ///
    /// The ledger insert races on the (user_id, poll_id) unique index;
    /// a violation is the authoritative duplicate-vote signal. The
    /// tally bump is one bulk in-place `votes = votes + 1` update, so
    /// concurrent ballots on the same poll never lose increments.
    pub async fn apply_vote(
        &self,
        entry: vote::ActiveModel,
        poll_id: &str,
        option_ids: &[String],
    ) -> AppResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        entry.insert(&txn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateVote,
            _ => db_err(e),
        })?;

        let result = PollOption::update_many()
            .col_expr(
                poll_option::Column::Votes,
                Expr::col(poll_option::Column::Votes).add(1),
            )
            .filter(poll_option::Column::PollId.eq(poll_id))
            .filter(poll_option::Column::Id.is_in(option_ids.to_vec()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        // A mismatch means the poll's options changed underneath the
        // ballot (concurrent delete); dropping the txn rolls back.
        if result.rows_affected != option_ids.len() as u64 {
            return Err(AppError::InvalidSelection(
                "selected options no longer exist".to_string(),
            ));
        }

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model.update(self.db.as_ref()).await.map_err(db_err)
    }

    /// Transition every ACTIVE poll whose deadline has passed to
    /// CLOSED. Idempotent single conditional UPDATE; returns how many
    /// polls were transitioned.
    pub async fn close_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = Poll::update_many()
            .col_expr(
                poll::Column::Status,
                Expr::value(poll::PollStatus::Closed),
            )
            .filter(poll::Column::Status.eq(poll::PollStatus::Active))
            .filter(poll::Column::ExpiresAt.lt(now))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    /// Delete a poll. Options, ledger entries and feedback go with it
    /// through the FK cascades, atomically with the parent DELETE.
    pub async fn delete(&self, poll_id: &str) -> AppResult<()> {
        Poll::delete_by_id(poll_id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
