//! WebSocket session (spec §4.2.9).
//!
//! Mirrors the split sender/receiver shape of a gateway socket: one task
//! drains the room's broadcast channel onto the wire, the main task reads
//! inbound frames and dispatches them onto the room.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use hub_core::protocol::{Envelope, Frame, WsInbound};
use hub_core::Room;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default = "default_project")]
    pub project: String,
    pub agent: String,
}

fn default_project() -> String {
    "default".to_string()
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let room = match state.room(&query.project).await {
        Ok(room) => room,
        Err(e) => {
            warn!(project = %query.project, error = %e, "failed to open room for websocket");
            return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "room unavailable")
                .into_response();
        }
    };

    info!(project = %query.project, agent = %query.agent, "websocket connected");
    ws.on_upgrade(move |socket| handle_socket(socket, room, query.agent))
}

async fn handle_socket(socket: WebSocket, room: Arc<Room>, agent: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = room.subscribe();

    let hello = Frame::Hello {
        ts: hub_core::room::now_ms(),
        authorized_mcps: room.authorized_mcps().await.unwrap_or_default(),
    };
    if send_frame(&mut sender, &hello).await.is_err() {
        return;
    }

    let forward_agent = agent.clone();
    let forward = tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(envelope) => {
                    if envelope_targets(&envelope, &forward_agent) {
                        if send_frame(&mut sender, &envelope.frame).await.is_err() {
                            break;
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(agent = %forward_agent, skipped, "subscriber lagged, frames dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_inbound(&room, &agent, &text).await;
            }
            Ok(Message::Close(_)) => {
                debug!(%agent, "client sent close frame");
                break;
            }
            Ok(_) => {
                // Binary/ping/pong frames carry no room semantics (spec §4.2.9
                // only defines a JSON text-frame grammar).
            }
            Err(e) => {
                warn!(%agent, error = %e, "websocket error");
                break;
            }
        }
    }

    info!(%agent, "websocket disconnected");
    forward.abort();
}

fn envelope_targets(envelope: &Envelope, agent: &str) -> bool {
    match &envelope.target {
        None => true,
        Some(target) => target == agent,
    }
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(text) => sender.send(Message::Text(text.into())).await,
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound frame");
            Ok(())
        }
    }
}

/// Parses and dispatches one inbound text frame. Malformed JSON and
/// unrecognized `kind`s are silently dropped (spec §4.2.9); a frozen
/// agent's non-`ping` messages are rejected with an error frame instead of
/// being executed.
async fn handle_inbound(room: &Room, agent: &str, text: &str) {
    let Ok(message) = serde_json::from_str::<WsInbound>(text) else {
        debug!(%agent, "dropped unparseable websocket frame");
        return;
    };

    if !matches!(message, WsInbound::Ping) {
        match room.is_frozen(agent).await {
            Ok(true) => {
                reply_to(
                    room,
                    agent,
                    Frame::Error {
                        error: "agent_frozen".to_string(),
                    },
                );
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(%agent, error = %e, "failed to check frozen status");
                return;
            }
        }
    }

    let result = dispatch(room, agent, message).await;
    if let Err(e) = result {
        warn!(%agent, error = %e, "command failed");
        reply_to(room, agent, Frame::Error { error: e.to_string() });
    }
}

async fn dispatch(room: &Room, agent: &str, message: WsInbound) -> hub_core::Result<()> {
    match message {
        WsInbound::Ping => {
            reply_to(room, agent, Frame::Pong { ts: hub_core::room::now_ms() });
        }
        WsInbound::TryLeader => {
            let result = room.try_become_leader(agent).await?;
            reply_to(
                room,
                agent,
                Frame::LeaderResult {
                    ts: hub_core::room::now_ms(),
                    ok: result.ok,
                },
            );
        }
        WsInbound::ClaimTask { task_id } => {
            let result = room.claim_task(&task_id, agent).await?;
            reply_to(
                room,
                agent,
                Frame::ClaimResult {
                    ts: hub_core::room::now_ms(),
                    ok: result.ok,
                    claimed_by: result.claimed_by,
                },
            );
        }
        WsInbound::ReleaseTask { task_id } => {
            let result = room.release_task(&task_id, agent).await?;
            reply_to(
                room,
                agent,
                Frame::ReleaseResult {
                    ts: hub_core::room::now_ms(),
                    ok: result.ok,
                },
            );
        }
        WsInbound::LockFile { path, exclusive, ttl_ms } => {
            let result = room.lock_file(&path, agent, exclusive, ttl_ms).await?;
            reply_to(
                room,
                agent,
                Frame::LockResult {
                    ts: hub_core::room::now_ms(),
                    ok: result.ok,
                    locked_by: result.locked_by,
                },
            );
        }
        WsInbound::UnlockFile { path } => {
            let result = room.unlock_file(&path, agent).await?;
            reply_to(
                room,
                agent,
                Frame::UnlockResult {
                    ts: hub_core::room::now_ms(),
                    ok: result.ok,
                },
            );
        }
        WsInbound::AnnounceTask { task_id, title, required_capabilities } => {
            room.announce_task(&task_id, &title, required_capabilities).await?;
        }
        WsInbound::BidTask { task_id, capabilities } => {
            room.bid_task(&task_id, agent, capabilities).await?;
        }
        WsInbound::Broadcast { message, channel } => {
            room.broadcast_chat(Some(agent), &message, channel.as_deref()).await?;
        }
        WsInbound::Event { event_type, payload } => {
            room.ingest_event(&event_type, payload).await?;
        }
    }
    Ok(())
}

/// Direct, synchronous-looking reply to the caller's own socket. These are
/// command acks, not room-wide broadcasts, but they still ride the same
/// targeted-envelope channel so a single subscriber loop handles both.
fn reply_to(room: &Room, agent: &str, frame: Frame) {
    room.emit_to(agent, frame);
}
