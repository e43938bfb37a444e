//! Task claim (spec §4.2.2).

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{append_event, broadcast_frame, next_ts, Room, RoomInner};
use crate::model::TaskClaim;
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReleaseResult {
    pub ok: bool,
}

impl Room {
    pub async fn claim_task(&self, task_id: &str, agent: &str) -> Result<ClaimResult> {
        let mut inner = self.inner.lock().await;
        claim_task_locked(&mut inner, &self.tx, task_id, agent).await
    }

    pub async fn release_task(&self, task_id: &str, agent: &str) -> Result<ReleaseResult> {
        let mut inner = self.inner.lock().await;
        let key = keys::task_claim(task_id);
        let existing: Option<TaskClaim> = inner.store.get(&key).await?;
        if let Some(claim) = existing {
            if claim.agent == agent {
                inner.store.delete(&key).await?;
                let ts = next_ts(&mut inner);
                append_event(
                    &inner.store,
                    ts,
                    "task_released",
                    serde_json::json!({ "taskId": task_id, "agent": agent }),
                )
                .await?;
                debug!(task_id, agent, "task released");
                broadcast_frame(
                    &self.tx,
                    Frame::TaskReleased {
                        ts,
                        task_id: task_id.to_string(),
                        agent: agent.to_string(),
                    },
                );
            } else {
                debug!(task_id, agent, held_by = %claim.agent, "release ignored, not the owner");
            }
        }
        // Released by a non-owner (or nothing to release) is a no-op, not
        // an error — this is what makes client retries safe (spec §7).
        Ok(ReleaseResult { ok: true })
    }
}

/// Invoked both from the public `claim_task` entry point and as the
/// subcommand an auction resolution uses to hand the task to its winner
/// (spec §4.2.4) — both already hold the room lock, so this takes the
/// guard directly instead of re-locking.
pub(crate) async fn claim_task_locked(
    inner: &mut RoomInner,
    tx: &broadcast::Sender<crate::protocol::Envelope>,
    task_id: &str,
    agent: &str,
) -> Result<ClaimResult> {
    let key = keys::task_claim(task_id);
    let existing: Option<TaskClaim> = inner.store.get(&key).await?;
    if let Some(claim) = &existing {
        if claim.agent != agent {
            warn!(task_id, agent, held_by = %claim.agent, "task claim rejected, already held");
            return Ok(ClaimResult {
                ok: false,
                claimed_by: Some(claim.agent.clone()),
            });
        }
    }

    let ts = next_ts(inner);
    inner
        .store
        .put(
            &key,
            &TaskClaim {
                task_id: task_id.to_string(),
                agent: agent.to_string(),
                ts,
            },
        )
        .await?;
    append_event(
        &inner.store,
        ts,
        "task_claimed",
        serde_json::json!({ "taskId": task_id, "agent": agent }),
    )
    .await?;
    debug!(task_id, agent, "task claimed");
    broadcast_frame(
        tx,
        Frame::TaskClaimed {
            ts,
            task_id: task_id.to_string(),
            agent: agent.to_string(),
        },
    );
    Ok(ClaimResult {
        ok: true,
        claimed_by: None,
    })
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
    async fn claim_is_idempotent_for_the_owner() {
        let (_dir, room) = room().await;
        assert!(room.claim_task("t1", "alice").await.unwrap().ok);
        assert!(room.claim_task("t1", "alice").await.unwrap().ok);
    }

    #[tokio::test]
    async fn claim_rejects_another_agent() {
        let (_dir, room) = room().await;
        assert!(room.claim_task("t1", "alice").await.unwrap().ok);
        let result = room.claim_task("t1", "bob").await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.claimed_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn release_then_release_again_is_a_noop() {
        let (_dir, room) = room().await;
        room.claim_task("t1", "alice").await.unwrap();
        assert!(room.release_task("t1", "alice").await.unwrap().ok);
        assert!(room.release_task("t1", "alice").await.unwrap().ok);

        assert!(room.claim_task("t1", "bob").await.unwrap().ok);
    }

    #[tokio::test]
    async fn release_by_non_owner_is_a_noop_not_an_error() {
        let (_dir, room) = room().await;
        room.claim_task("t1", "alice").await.unwrap();
        assert!(room.release_task("t1", "bob").await.unwrap().ok);
        // alice still owns it
        let result = room.claim_task("t1", "bob").await.unwrap();
        assert!(!result.ok);
    }
}
