//! Domain entities (spec §3). Flat value types keyed by the string schema
//! in `storage::keys` — no object graphs, no back-references.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub ts: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderLease {
    pub agent: String,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClaim {
    pub task_id: String,
    pub agent: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLock {
    pub path: String,
    pub agent: String,
    pub exclusive: bool,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub agent: String,
    pub capabilities: Vec<String>,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub task_id: String,
    pub title: String,
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub bids: Vec<Bid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenMarker {
    pub reason: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Active,
    Idle,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pulse {
    pub agent: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub current_task: Option<String>,
    pub status: PresenceStatus,
    pub last_update: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UrgentStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgentRecord {
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub title: String,
    pub reason: String,
    pub initiator: String,
    pub affected_files: Vec<String>,
    pub preempted_agents: Vec<String>,
    pub status: UrgentStatus,
    pub created_at: i64,
    #[serde(default)]
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub id: String,
    pub agent: String,
    pub category: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub solution: Option<String>,
    pub created_at: i64,
}

/// Read-side merge of events and live pulses, sorted by `ts` (spec §4.2.7).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TimelineEntry {
    Event {
        ts: i64,
        id: String,
        #[serde(rename = "type")]
        event_type: String,
        payload: serde_json::Value,
    },
    Pulse {
        ts: i64,
        agent: String,
        status: PresenceStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_file: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_task: Option<String>,
    },
}

impl TimelineEntry {
    pub fn ts(&self) -> i64 {
        match self {
            TimelineEntry::Event { ts, .. } => *ts,
            TimelineEntry::Pulse { ts, .. } => *ts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListEntry {
    pub task_id: String,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub status: TaskStatus,
    pub required_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Announced,
    InProgress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmStats {
    pub agent_count: usize,
    pub active_tasks: usize,
    pub open_auctions: usize,
    pub locked_files: usize,
    pub frozen_agents: usize,
    pub swarm_stopped: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateSummary {
    pub leader: Option<String>,
    pub authorized_mcps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmPulseSnapshot {
    pub agents: Vec<Pulse>,
    pub last_update: i64,
}

/// Pulses older than this are treated as stale (spec §3, §4.2.7).
pub const PULSE_STALE_MS: i64 = 10 * 60 * 1000;
/// Leader lease duration (spec §4.2.1).
pub const LEASE_TTL_MS: i64 = 30_000;
/// Default file-lock TTL when the caller doesn't specify one (spec §5).
pub const DEFAULT_LOCK_TTL_MS: i64 = 60_000;
/// Activity window for anomaly detection (spec §4.2.5).
pub const ACTIVITY_WINDOW_MS: i64 = 5 * 60 * 1000;
/// Action threshold that trips a freeze (spec §8: 201 trips, 200 doesn't).
pub const ACTIVITY_FREEZE_THRESHOLD: u64 = 200;
