//! User service.
//!
//! Thin seam over the user store: token resolution for the auth
//! middleware and ID lookups. Credential issuance is an external
//! collaborator.

use univote_common::{AppError, AppResult};
use univote_db::{entities::user, repositories::UserRepository};

/// User service.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Resolve a session token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, user_id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let service = UserService::new(UserRepository::new(Arc::new(db)));

        let err = service.authenticate_by_token("bogus").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_token_resolves_user() {
        let model = user::Model {
            id: "u1".to_string(),
            username: "alice".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.edu".to_string(),
            role: user::UserRole::Student,
            managed_poll_ids: None,
            token: Some("tok".to_string()),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model]])
            .into_connection();
        let service = UserService::new(UserRepository::new(Arc::new(db)));

        let user = service.authenticate_by_token("tok").await.unwrap();
        assert_eq!(user.username, "alice");
    }
}
