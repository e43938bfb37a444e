//! Urgent preemption (spec §4.2.6).

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{append_event, broadcast_frame, next_ts, now_ms, targeted_frame, Room};
use crate::model::{Pulse, UrgentRecord, UrgentStatus, PULSE_STALE_MS};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerUrgentResult {
    pub id: String,
    pub preempted_agents: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResolveUrgentResult {
    pub ok: bool,
}

impl Room {
    /// An agent is preempted when one of `affected_files` is a substring of
    /// its currently-reported file (spec §4.2.6 — deliberately loose, not an
    /// exact path match) and its pulse is still fresh.
    pub async fn trigger_urgent(
        &self,
        task_id: Option<&str>,
        title: &str,
        reason: &str,
        initiator: &str,
        affected_files: Vec<String>,
    ) -> Result<TriggerUrgentResult> {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        let pulses: Vec<(String, Pulse)> = inner.store.list_prefix(keys::PULSE_PREFIX).await?;

        let preempted: Vec<String> = pulses
            .into_iter()
            .map(|(_, pulse)| pulse)
            .filter(|pulse| now - pulse.last_update <= PULSE_STALE_MS)
            .filter(|pulse| pulse.agent != initiator)
            .filter(|pulse| {
                pulse
                    .current_file
                    .as_deref()
                    .map(|current| affected_files.iter().any(|f| current.contains(f.as_str())))
                    .unwrap_or(false)
            })
            .map(|pulse| pulse.agent)
            .collect();

        let ts = next_ts(&mut inner);
        let id = Uuid::new_v4().to_string();
        let record = UrgentRecord {
            id: id.clone(),
            task_id: task_id.map(str::to_string),
            title: title.to_string(),
            reason: reason.to_string(),
            initiator: initiator.to_string(),
            affected_files,
            preempted_agents: preempted.clone(),
            status: UrgentStatus::Active,
            created_at: ts,
            resolved_at: None,
        };
        inner.store.put(keys::URGENT_ACTIVE, &record).await?;
        append_event(
            &inner.store,
            ts,
            "urgent_triggered",
            serde_json::json!({ "id": id, "title": title, "initiator": initiator }),
        )
        .await?;

        warn!(id = %id, title, initiator, preempted = ?preempted, "urgent preemption triggered");
        broadcast_frame(&self.tx, Frame::UrgentPreemption { ts, urgent: record });
        for agent in &preempted {
            targeted_frame(
                &self.tx,
                agent,
                Frame::YouArePreempted {
                    ts,
                    urgent_id: id.clone(),
                    reason: reason.to_string(),
                },
            );
        }

        Ok(TriggerUrgentResult {
            id,
            preempted_agents: preempted,
        })
    }

    /// Resolves the active urgent iff its id matches (spec §4.2.6).
    pub async fn resolve_urgent(&self, id: &str) -> Result<ResolveUrgentResult> {
        let mut inner = self.inner.lock().await;
        let existing: Option<UrgentRecord> = inner.store.get(keys::URGENT_ACTIVE).await?;
        let Some(mut record) = existing.filter(|record| record.id == id && record.status == UrgentStatus::Active)
        else {
            debug!(id, "resolve urgent ignored, no matching active urgent");
            return Ok(ResolveUrgentResult { ok: false });
        };

        let ts = next_ts(&mut inner);
        record.status = UrgentStatus::Resolved;
        record.resolved_at = Some(ts);
        inner.store.put(keys::URGENT_ACTIVE, &record).await?;
        append_event(
            &inner.store,
            ts,
            "urgent_resolved",
            serde_json::json!({ "id": id }),
        )
        .await?;
        info!(id, "urgent resolved");
        broadcast_frame(&self.tx, Frame::UrgentResolved { ts, id: id.to_string() });
        Ok(ResolveUrgentResult { ok: true })
    }

    /// At most one urgent is ever active (spec §3 singleton `urgent_active`).
    pub async fn get_active_urgent(&self) -> Result<Option<UrgentRecord>> {
        let inner = self.inner.lock().await;
        let record: Option<UrgentRecord> = inner.store.get(keys::URGENT_ACTIVE).await?;
        Ok(record.filter(|record| record.status == UrgentStatus::Active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PresenceStatus;
    use tempfile::TempDir;

    async fn room() -> (TempDir, Room) {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        (dir, room)
    }

    #[tokio::test]
    async fn agents_touching_affected_files_are_preempted() {
        let (_dir, room) = room().await;
        room.update_pulse(
            "bob",
            None,
            None,
            Some("src/lib/parser.rs".to_string()),
            None,
            PresenceStatus::Active,
        )
        .await
        .unwrap();
        room.update_pulse("carol", None, None, Some("README.md".to_string()), None, PresenceStatus::Active)
            .await
            .unwrap();

        let result = room
            .trigger_urgent(None, "Hotfix", "prod is down", "alice", vec!["parser.rs".to_string()])
            .await
            .unwrap();
        assert_eq!(result.preempted_agents, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_not_ok() {
        let (_dir, room) = room().await;
        assert!(!room.resolve_urgent("ghost").await.unwrap().ok);
    }

    #[tokio::test]
    async fn resolved_urgents_drop_out_of_active_list() {
        let (_dir, room) = room().await;
        let triggered = room
            .trigger_urgent(None, "Hotfix", "prod is down", "alice", vec![])
            .await
            .unwrap();
        assert!(room.get_active_urgent().await.unwrap().is_some());
        room.resolve_urgent(&triggered.id).await.unwrap();
        assert!(room.get_active_urgent().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn triggering_again_overwrites_the_singleton_slot() {
        let (_dir, room) = room().await;
        room.trigger_urgent(None, "First", "fire", "alice", vec![])
            .await
            .unwrap();
        let second = room
            .trigger_urgent(None, "Second", "also fire", "alice", vec![])
            .await
            .unwrap();
        let active = room.get_active_urgent().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[tokio::test]
    async fn resolving_a_stale_id_is_a_noop() {
        let (_dir, room) = room().await;
        let first = room
            .trigger_urgent(None, "First", "fire", "alice", vec![])
            .await
            .unwrap();
        room.trigger_urgent(None, "Second", "also fire", "alice", vec![])
            .await
            .unwrap();
        assert!(!room.resolve_urgent(&first.id).await.unwrap().ok);
        assert!(room.get_active_urgent().await.unwrap().is_some());
    }
}
