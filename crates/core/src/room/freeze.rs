//! Anomaly freeze (spec §4.2.5).
//!
//! Activity counters live only in memory (`RoomInner::activity`) — they
//! reset on restart by design, same as the original system's in-process
//! rate window. Frozen markers are the persisted, authoritative bit.

use serde::Serialize;
use tracing::{info, warn};

use super::{append_event, next_ts, now_ms, targeted_frame, ActivityRecord, Room};
use crate::model::{FrozenMarker, ACTIVITY_FREEZE_THRESHOLD, ACTIVITY_WINDOW_MS};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FreezeResult {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UnfreezeResult {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportActivityResult {
    pub ok: bool,
    pub frozen: bool,
}

impl Room {
    pub async fn freeze_agent(&self, agent: &str, reason: &str) -> Result<FreezeResult> {
        let mut inner = self.inner.lock().await;
        let ts = next_ts(&mut inner);
        inner
            .store
            .put(
                &keys::frozen(agent),
                &FrozenMarker {
                    reason: reason.to_string(),
                    ts,
                },
            )
            .await?;
        append_event(
            &inner.store,
            ts,
            "agent_frozen",
            serde_json::json!({ "agent": agent, "reason": reason }),
        )
        .await?;
        info!(agent, reason, "agent frozen");
        super::broadcast_frame(
            &self.tx,
            Frame::AgentFrozen {
                ts,
                agent: agent.to_string(),
                reason: reason.to_string(),
            },
        );
        targeted_frame(&self.tx, agent, Frame::YouAreFrozen { ts, reason: reason.to_string() });
        Ok(FreezeResult { ok: true })
    }

    pub async fn unfreeze_agent(&self, agent: &str) -> Result<UnfreezeResult> {
        let mut inner = self.inner.lock().await;
        inner.store.delete(&keys::frozen(agent)).await?;
        if let Some(record) = inner.activity.get_mut(agent) {
            *record = ActivityRecord::default();
        }
        let ts = next_ts(&mut inner);
        append_event(
            &inner.store,
            ts,
            "agent_unfrozen",
            serde_json::json!({ "agent": agent }),
        )
        .await?;
        info!(agent, "agent unfrozen");
        super::broadcast_frame(&self.tx, Frame::AgentUnfrozen { ts, agent: agent.to_string() });
        Ok(UnfreezeResult { ok: true })
    }

    pub async fn is_frozen(&self, agent: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        let marker: Option<FrozenMarker> = inner.store.get(&keys::frozen(agent)).await?;
        Ok(marker.is_some())
    }

    /// Resets the window after a 5-minute gap in activity, then adds
    /// `actions` to the running count (spec §4.2.5: `reportActivity(agent,
    /// actions)`). Freezing triggers strictly past the threshold (spec §8:
    /// summing to 201 freezes, 200 does not).
    pub async fn report_activity(&self, agent: &str, actions: u64) -> Result<ReportActivityResult> {
        let mut inner = self.inner.lock().await;
        let now = now_ms();

        let record = inner.activity.entry(agent.to_string()).or_default();
        if now - record.last_ping > ACTIVITY_WINDOW_MS {
            record.actions_last_5_min = 0;
        }
        record.actions_last_5_min += actions;
        record.last_ping = now;
        let count = record.actions_last_5_min;

        if count > ACTIVITY_FREEZE_THRESHOLD {
            warn!(agent, count, "activity anomaly detected, freezing agent");
            drop(inner);
            self.freeze_agent(agent, "anomaly_detected: too many actions").await?;
            return Ok(ReportActivityResult { ok: true, frozen: true });
        }

        Ok(ReportActivityResult { ok: true, frozen: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn room() -> (TempDir, Room) {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        (dir, room)
    }

    #[tokio::test]
    async fn exactly_at_threshold_does_not_freeze() {
        let (_dir, room) = room().await;
        let result = room.report_activity("alice", 200).await.unwrap();
        assert!(!result.frozen);
        assert!(!room.is_frozen("alice").await.unwrap());
    }

    #[tokio::test]
    async fn one_past_threshold_freezes() {
        let (_dir, room) = room().await;
        let result = room.report_activity("alice", 201).await.unwrap();
        assert!(result.frozen);
        assert!(room.is_frozen("alice").await.unwrap());
    }

    #[tokio::test]
    async fn two_calls_summing_past_threshold_freezes() {
        let (_dir, room) = room().await;
        let first = room.report_activity("carol", 150).await.unwrap();
        assert!(!first.frozen);
        let second = room.report_activity("carol", 150).await.unwrap();
        assert!(second.frozen);
        assert!(room.is_frozen("carol").await.unwrap());
    }

    #[tokio::test]
    async fn unfreeze_clears_the_marker_and_window() {
        let (_dir, room) = room().await;
        room.freeze_agent("alice", "manual").await.unwrap();
        assert!(room.is_frozen("alice").await.unwrap());
        room.unfreeze_agent("alice").await.unwrap();
        assert!(!room.is_frozen("alice").await.unwrap());
    }
}
