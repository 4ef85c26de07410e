//! API endpoints.

mod admin;
mod feedback;
mod polls;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/polls", polls::router().merge(feedback::router()))
        .nest("/admin", admin::router())
}
