//! Wire-level shapes shared by the HTTP and WebSocket surfaces.
//!
//! Broadcast frames are modeled as one tagged enum so the WS grammar in
//! spec §6 is exhaustive at compile time instead of an if-ladder over a
//! `kind` string (spec §9's "dynamic-dispatch patterns" note).

use serde::{Deserialize, Serialize};

use crate::model::{Pulse, UrgentRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Frame {
    Hello {
        ts: i64,
        authorized_mcps: Vec<String>,
    },
    Pong {
        ts: i64,
    },
    LeaderChanged {
        ts: i64,
        agent: String,
    },
    LeaderResult {
        ts: i64,
        ok: bool,
    },
    TaskClaimed {
        ts: i64,
        task_id: String,
        agent: String,
    },
    TaskReleased {
        ts: i64,
        task_id: String,
        agent: String,
    },
    ClaimResult {
        ts: i64,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        claimed_by: Option<String>,
    },
    ReleaseResult {
        ts: i64,
        ok: bool,
    },
    FileLocked {
        ts: i64,
        path: String,
        agent: String,
        exclusive: bool,
    },
    FileUnlocked {
        ts: i64,
        path: String,
        agent: String,
    },
    LockResult {
        ts: i64,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        locked_by: Option<String>,
    },
    UnlockResult {
        ts: i64,
        ok: bool,
    },
    TaskAnnounced {
        ts: i64,
        task_id: String,
        title: String,
        required_capabilities: Vec<String>,
    },
    TaskBid {
        ts: i64,
        task_id: String,
        agent: String,
        capabilities: Vec<String>,
    },
    AuctionResolved {
        ts: i64,
        task_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
    },
    PolicyUpdate {
        ts: i64,
        authorized_mcps: Vec<String>,
    },
    Chat {
        ts: i64,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    AgentFrozen {
        ts: i64,
        agent: String,
        reason: String,
    },
    AgentUnfrozen {
        ts: i64,
        agent: String,
    },
    YouAreFrozen {
        ts: i64,
        reason: String,
    },
    PulseUpdate {
        ts: i64,
        pulse: Pulse,
    },
    UrgentPreemption {
        ts: i64,
        urgent: UrgentRecord,
    },
    YouArePreempted {
        ts: i64,
        urgent_id: String,
        reason: String,
    },
    UrgentResolved {
        ts: i64,
        id: String,
    },
    KnowledgeAdded {
        ts: i64,
        id: String,
        title: String,
        agent: String,
    },
    SwarmStopped {
        ts: i64,
    },
    SwarmResumed {
        ts: i64,
    },
    Event {
        ts: i64,
        #[serde(rename = "type")]
        event_type: String,
    },
    Error {
        error: String,
    },
}

/// A frame destined either for every subscriber of a room (`target: None`)
/// or only the sockets tagged with one agent name (spec §4.2.5, §4.2.6).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub frame: Frame,
    pub target: Option<String>,
}

impl Envelope {
    pub fn broadcast(frame: Frame) -> Self {
        Self { frame, target: None }
    }

    pub fn targeted(agent: impl Into<String>, frame: Frame) -> Self {
        Self {
            frame,
            target: Some(agent.into()),
        }
    }
}

/// Inbound WebSocket message grammar (spec §4.2.9). Recognized kinds map
/// 1:1 onto the dispatcher's commands; an unrecognized `kind` fails to
/// deserialize and is dropped by the session loop rather than panicking.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WsInbound {
    Ping,
    TryLeader,
    ClaimTask {
        task_id: String,
    },
    ReleaseTask {
        task_id: String,
    },
    LockFile {
        path: String,
        #[serde(default)]
        exclusive: bool,
        #[serde(default)]
        ttl_ms: Option<i64>,
    },
    UnlockFile {
        path: String,
    },
    AnnounceTask {
        task_id: String,
        title: String,
        #[serde(default)]
        required_capabilities: Vec<String>,
    },
    BidTask {
        task_id: String,
        #[serde(default)]
        capabilities: Vec<String>,
    },
    Broadcast {
        message: String,
        #[serde(default)]
        channel: Option<String>,
    },
    Event {
        #[serde(rename = "type")]
        event_type: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}
