//! HTTP API layer for univote.
//!
//! This crate provides the REST API and the real-time streaming
//! surface:
//!
//! - **Endpoints**: poll listing/detail/vote, admin lifecycle, feedback
//! - **Extractors**: authenticated-user extraction
//! - **Middleware**: bearer-token authentication
//! - **Streaming**: per-poll WebSocket broadcast rooms
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use endpoints::router;
pub use streaming::{PollBroadcaster, PollUpdate, streaming_handler};
