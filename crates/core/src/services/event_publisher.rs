//! Poll event publisher abstraction.
//!
//! Lets the vote transaction hand off updated-poll payloads without
//! depending on the transport. The concrete implementation lives in the
//! API crate (per-poll WebSocket rooms).

use std::sync::Arc;

use async_trait::async_trait;
use univote_common::AppResult;

/// Trait for publishing real-time poll updates.
///
/// Delivery is at-most-once and fire-and-forget: a failed or absent
/// subscriber misses intermediate updates and reconciles on the next
/// full read.
#[async_trait]
pub trait PollEventPublisher: Send + Sync {
    /// Push the full updated poll payload to every subscriber of the
    /// poll's broadcast group.
    async fn publish_vote_update(&self, poll_id: &str, poll: serde_json::Value) -> AppResult<()>;
}

/// A no-op implementation for tests or when real-time updates are
/// disabled.
#[derive(Clone, Default)]
pub struct NoOpPollEventPublisher;

#[async_trait]
impl PollEventPublisher for NoOpPollEventPublisher {
    async fn publish_vote_update(&self, _poll_id: &str, _poll: serde_json::Value) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `PollEventPublisher` trait object.
pub type PollEventPublisherService = Arc<dyn PollEventPublisher>;
