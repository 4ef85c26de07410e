//! User repository.

use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use univote_common::{AppError, AppResult};

use crate::entities::{User, user};

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, user_id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, user_id: &str) -> AppResult<user::Model> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {user_id}")))
    }

    /// Resolve a session token to its user.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Delete a user. Ledger entries and feedback cascade away with the
    /// row.
    pub async fn delete(&self, user_id: &str) -> AppResult<()> {
        User::delete_by_id(user_id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
