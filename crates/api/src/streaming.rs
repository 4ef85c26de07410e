//! WebSocket streaming for live poll tallies.
//!
//! Viewers of a poll's live page join that poll's broadcast room; every
//! accepted vote pushes the full updated poll payload to the room.
//! Delivery is at-most-once with no acknowledgment — a disconnected or
//! lagging viewer misses intermediate updates and reconciles on the
//! next full page load.
//!
//! The broadcast layer performs no per-recipient visibility filtering;
//! the live-tally page is an administrative surface by convention, and
//! [`PollBroadcaster::subscribe`] is the single choke point where a
//! publication gate would go.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, error, info, warn};
use univote_common::AppResult;
use univote_core::PollEventPublisher;

use crate::middleware::AppState;

/// Buffered updates per room before slow receivers start lagging.
const ROOM_CAPACITY: usize = 64;

/// Buffered outbound messages per connection.
const OUTBOX_CAPACITY: usize = 32;

/// A tally update for one poll.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    /// The poll this update belongs to.
    pub poll_id: String,
    /// Full updated poll payload.
    pub poll: serde_json::Value,
}

/// Per-poll broadcast registry.
///
/// Rooms are created on first subscribe and pruned once their last
/// receiver is gone. The registry is an injectable collaborator — the
/// vote transaction talks to it through the [`PollEventPublisher`]
/// trait and tests substitute a recording or no-op implementation.
#[derive(Clone)]
pub struct PollBroadcaster {
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<PollUpdate>>>>,
}

impl PollBroadcaster {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join a poll's broadcast room, creating it if needed.
    pub async fn subscribe(&self, poll_id: &str) -> broadcast::Receiver<PollUpdate> {
        let mut rooms = self.rooms.write().await;

        if let Some(sender) = rooms.get(poll_id) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(ROOM_CAPACITY);
        rooms.insert(poll_id.to_string(), sender);
        receiver
    }

    /// Push an update to every subscriber of a poll's room. Returns the
    /// number of receivers reached; an absent or empty room delivers to
    /// nobody and is not an error.
    pub async fn publish(&self, poll_id: &str, poll: serde_json::Value) -> usize {
        let update = PollUpdate {
            poll_id: poll_id.to_string(),
            poll,
        };

        let reached = {
            let rooms = self.rooms.read().await;
            rooms
                .get(poll_id)
                .map_or(0, |sender| sender.send(update).unwrap_or(0))
        };

        if reached == 0 {
            self.cleanup().await;
        }
        reached
    }

    /// Drop rooms with no remaining receivers.
    pub async fn cleanup(&self) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of connections currently subscribed to a poll's room.
    pub async fn room_size(&self, poll_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms
            .get(poll_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for PollBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PollEventPublisher for PollBroadcaster {
    async fn publish_vote_update(&self, poll_id: &str, poll: serde_json::Value) -> AppResult<()> {
        let reached = self.publish(poll_id, poll).await;
        debug!(poll_id, reached, "Published vote update");
        Ok(())
    }
}

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    pub token: Option<String>,
}

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join a poll's broadcast room.
    #[serde(rename_all = "camelCase")]
    JoinPoll { poll_id: String },
    /// Leave a poll's broadcast room.
    #[serde(rename_all = "camelCase")]
    LeavePoll { poll_id: String },
}

/// Server-to-client message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Room joined.
    #[serde(rename_all = "camelCase")]
    Joined { poll_id: String },
    /// Room left.
    #[serde(rename_all = "camelCase")]
    Left { poll_id: String },
    /// A vote was accepted on a subscribed poll.
    #[serde(rename_all = "camelCase")]
    VoteUpdate {
        poll_id: String,
        poll: serde_json::Value,
    },
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state))
}

async fn send_json(out: &mpsc::Sender<Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => out.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!(error = %e, "Failed to encode server message");
            true
        }
    }
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, query: StreamQuery, state: AppState) {
    // Authenticate if a token was provided. Live viewing itself is not
    // authenticated at this layer; see the module docs.
    let user_id = match &query.token {
        Some(token) => match state.user_service.authenticate_by_token(token).await {
            Ok(user) => Some(user.id),
            Err(e) => {
                warn!("Streaming auth failed: {e}");
                None
            }
        },
        None => None,
    };

    info!(user_id = ?user_id, "Streaming connection established");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // All outbound traffic funnels through one writer task.
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOX_CAPACITY);
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // One forwarder task per joined room, torn down on leave/disconnect.
    let mut rooms: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::JoinPoll { poll_id }) => {
                    if rooms.contains_key(&poll_id) {
                        continue;
                    }

                    let mut room_rx = state.broadcaster.subscribe(&poll_id).await;
                    let out = out_tx.clone();
                    let handle = tokio::spawn(async move {
                        loop {
                            match room_rx.recv().await {
                                Ok(update) => {
                                    let msg = ServerMessage::VoteUpdate {
                                        poll_id: update.poll_id,
                                        poll: update.poll,
                                    };
                                    if !send_json(&out, &msg).await {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                    // At-most-once delivery: a slow
                                    // viewer just misses updates.
                                    debug!(skipped, "Streaming subscriber lagged");
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                            }
                        }
                    });
                    rooms.insert(poll_id.clone(), handle);
                    info!(poll_id = %poll_id, "Joined poll room");

                    if !send_json(&out_tx, &ServerMessage::Joined { poll_id }).await {
                        break;
                    }
                }
                Ok(ClientMessage::LeavePoll { poll_id }) => {
                    if let Some(handle) = rooms.remove(&poll_id) {
                        handle.abort();
                        info!(poll_id = %poll_id, "Left poll room");
                    }
                    if !send_json(&out_tx, &ServerMessage::Left { poll_id }).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to parse client message: {e}");
                }
            },
            Ok(Message::Ping(data)) => {
                if out_tx.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error: {e}");
                break;
            }
        }
    }

    // Implicit unsubscribe on disconnect.
    for handle in rooms.into_values() {
        handle.abort();
    }
    writer.abort();
    state.broadcaster.cleanup().await;

    info!(user_id = ?user_id, "Streaming connection closed");
}
