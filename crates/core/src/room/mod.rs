//! The single-writer room dispatcher (spec §4.2, §5).
//!
//! Every public method on [`Room`] takes the room's [`tokio::sync::Mutex`]
//! for its full duration, storage I/O included, which is what the spec's
//! "must not interleave two commands' storage operations for the same
//! room" requirement reduces to once the room lives in one process: hold
//! the lock across the await points instead of building a separate actor
//! + channel.

mod auction;
mod events;
mod freeze;
mod knowledge;
mod leader;
mod lock;
mod policy;
mod pulse;
mod stats;
mod task_claim;
mod urgent;

pub use auction::*;
pub use events::*;
pub use freeze::*;
pub use knowledge::*;
pub use leader::*;
pub use lock::*;
pub use stats::*;
pub use task_claim::{ClaimResult, ReleaseResult};
pub use urgent::*;

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::model::Event;
use crate::protocol::{Envelope, Frame};
use crate::storage::{keys, JsonFileStore, Storage, StorageExt};
use crate::Result;

const BROADCAST_CAPACITY: usize = 1024;

/// Per-agent in-memory activity window (spec §4.2.5). Never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActivityRecord {
    pub(crate) last_ping: i64,
    pub(crate) actions_last_5_min: u64,
}

pub(crate) struct RoomInner {
    pub(crate) store: JsonFileStore,
    pub(crate) activity: HashMap<String, ActivityRecord>,
    pub(crate) last_ts: i64,
}

/// One project's coordination state and socket fan-out.
///
/// `Room` owns no actual sockets — those live in the gateway crate. It
/// exposes a [`broadcast::Sender`] of [`Envelope`]s; the gateway subscribes
/// once per connection and filters targeted envelopes by the agent name
/// asserted at upgrade time.
pub struct Room {
    project: String,
    inner: Mutex<RoomInner>,
    tx: broadcast::Sender<Envelope>,
}

impl Room {
    pub async fn open(data_dir: &Path, project: &str) -> Result<Self> {
        let path = crate::storage::snapshot_path(data_dir, project);
        let store = JsonFileStore::open(path).await?;
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Ok(Self {
            project: project.to_string(),
            inner: Mutex::new(RoomInner {
                store,
                activity: HashMap::new(),
                last_ts: 0,
            }),
            tx,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Subscribe to this room's broadcast frames. The gateway keeps one
    /// receiver task per connection and drops the connection on send
    /// failure rather than ever buffering (spec §5 "Backpressure").
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Sends a frame to only the sockets tagged with one agent name — used
    /// for command acks, which ride the same channel as broadcasts but are
    /// not meant for every subscriber (spec §4.2.9).
    pub fn emit_to(&self, agent: &str, frame: Frame) {
        targeted_frame(&self.tx, agent, frame);
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

/// Monotonic per-room timestamp (spec §9 "Monotonic ts"): clamps to
/// strictly greater than the previous commit even if the wall clock goes
/// backward.
pub(crate) fn next_ts(inner: &mut RoomInner) -> i64 {
    let now = now_ms();
    let ts = now.max(inner.last_ts + 1);
    inner.last_ts = ts;
    ts
}

pub(crate) fn emit(tx: &broadcast::Sender<Envelope>, envelope: Envelope) {
    // A send error just means nobody is subscribed right now; broadcast is
    // best-effort (spec §5, §9 "Broadcast semantics").
    let _ = tx.send(envelope);
}

pub(crate) async fn append_event(
    store: &JsonFileStore,
    ts: i64,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<Event> {
    let id = Uuid::new_v4().to_string();
    let event = Event {
        id: id.clone(),
        ts,
        event_type: event_type.to_string(),
        payload,
    };
    store.put_raw(&keys::event(ts, &id), serde_json::to_value(&event)?).await?;
    Ok(event)
}

pub(crate) fn broadcast_frame(tx: &broadcast::Sender<Envelope>, frame: Frame) {
    emit(tx, Envelope::broadcast(frame));
}

pub(crate) fn targeted_frame(tx: &broadcast::Sender<Envelope>, agent: &str, frame: Frame) {
    emit(tx, Envelope::targeted(agent, frame));
}

/// Common `{ok: bool}`-shaped results (spec §6/§7), reused by several
/// operations whose only signal is success/failure.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OkResult {
    pub ok: bool,
}
