//! File locks (spec §4.2.3).
//!
//! The wire shape carries `exclusive: bool`, which reads as if shared-read
//! locks are supported, but only one lock record exists per path (spec
//! §9 "Shared file locks"): the next accepted holder overwrites whatever
//! shared lock was there. We keep that wire contract exactly and do not
//! invent a `file_lock:<path>:<agent>` scheme — the spec marks this an
//! open question, not ours to resolve (see DESIGN.md).

use serde::Serialize;
use tracing::{debug, warn};

use super::{append_event, broadcast_frame, next_ts, now_ms, Room};
use crate::model::{FileLock, DEFAULT_LOCK_TTL_MS};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UnlockResult {
    pub ok: bool,
}

impl Room {
    pub async fn lock_file(
        &self,
        path: &str,
        agent: &str,
        exclusive: bool,
        ttl_ms: Option<i64>,
    ) -> Result<LockResult> {
        let mut inner = self.inner.lock().await;
        let key = keys::file_lock(path);
        let now = now_ms();
        let existing: Option<FileLock> = inner.store.get(&key).await?;
        let live = existing.filter(|lock| lock.exp > now);

        if let Some(lock) = &live {
            let conflicts = (lock.exclusive && lock.agent != agent) || exclusive;
            if conflicts {
                warn!(path, agent, held_by = %lock.agent, "file lock rejected, conflict");
                return Ok(LockResult {
                    ok: false,
                    locked_by: Some(lock.agent.clone()),
                });
            }
        }

        let ts = next_ts(&mut inner);
        let ttl = ttl_ms.unwrap_or(DEFAULT_LOCK_TTL_MS);
        let exp = now + ttl;
        inner
            .store
            .put(
                &key,
                &FileLock {
                    path: path.to_string(),
                    agent: agent.to_string(),
                    exclusive,
                    exp,
                },
            )
            .await?;
        append_event(
            &inner.store,
            ts,
            "file_locked",
            serde_json::json!({ "path": path, "agent": agent, "exclusive": exclusive }),
        )
        .await?;
        debug!(path, agent, exclusive, "file locked");
        broadcast_frame(
            &self.tx,
            Frame::FileLocked {
                ts,
                path: path.to_string(),
                agent: agent.to_string(),
                exclusive,
            },
        );
        Ok(LockResult {
            ok: true,
            locked_by: None,
        })
    }

    pub async fn unlock_file(&self, path: &str, agent: &str) -> Result<UnlockResult> {
        let mut inner = self.inner.lock().await;
        let key = keys::file_lock(path);
        let existing: Option<FileLock> = inner.store.get(&key).await?;
        if let Some(lock) = existing {
            if lock.agent == agent {
                inner.store.delete(&key).await?;
                let ts = next_ts(&mut inner);
                append_event(
                    &inner.store,
                    ts,
                    "file_unlocked",
                    serde_json::json!({ "path": path, "agent": agent }),
                )
                .await?;
                debug!(path, agent, "file unlocked");
                broadcast_frame(
                    &self.tx,
                    Frame::FileUnlocked {
                        ts,
                        path: path.to_string(),
                        agent: agent.to_string(),
                    },
                );
            }
        }
        Ok(UnlockResult { ok: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn exclusive_conflict_then_recovery() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();

        assert!(room
            .lock_file("src/a.rs", "alice", true, Some(60_000))
            .await
            .unwrap()
            .ok);

        let conflict = room
            .lock_file("src/a.rs", "bob", true, Some(60_000))
            .await
            .unwrap();
        assert!(!conflict.ok);
        assert_eq!(conflict.locked_by.as_deref(), Some("alice"));

        assert!(room.unlock_file("src/a.rs", "bob").await.unwrap().ok);
        assert!(room.unlock_file("src/a.rs", "alice").await.unwrap().ok);

        assert!(room
            .lock_file("src/a.rs", "bob", true, Some(60_000))
            .await
            .unwrap()
            .ok);
    }

    #[tokio::test]
    async fn expired_lock_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        assert!(room.lock_file("p.txt", "alice", true, Some(1)).await.unwrap().ok);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(room.lock_file("p.txt", "bob", true, Some(60_000)).await.unwrap().ok);
    }
}
