//! Authorized MCPs and the swarm-wide stop switch (spec §4.2.12).

use tracing::info;

use super::{append_event, broadcast_frame, next_ts, Room};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

impl Room {
    pub async fn authorized_mcps(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.store.get(keys::AUTHORIZED_MCPS).await?.unwrap_or_default())
    }

    pub async fn authorize_mcps(&self, mcps: Vec<String>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.store.put(keys::AUTHORIZED_MCPS, &mcps).await?;
        let ts = next_ts(&mut inner);
        append_event(
            &inner.store,
            ts,
            "policy_update",
            serde_json::json!({ "authorizedMcps": mcps }),
        )
        .await?;
        info!(mcps = ?mcps, "authorized mcps updated");
        broadcast_frame(&self.tx, Frame::PolicyUpdate { ts, authorized_mcps: mcps });
        Ok(())
    }

    pub async fn is_swarm_stopped(&self) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.store.get(keys::SWARM_STOPPED).await?.unwrap_or(false))
    }

    pub async fn set_swarm_stopped(&self, stopped: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.store.put(keys::SWARM_STOPPED, &stopped).await?;
        let ts = next_ts(&mut inner);
        let event_type = if stopped { "swarm_stopped" } else { "swarm_resumed" };
        append_event(&inner.store, ts, event_type, serde_json::json!({})).await?;
        info!(stopped, "swarm stop switch toggled");
        if stopped {
            broadcast_frame(&self.tx, Frame::SwarmStopped { ts });
        } else {
            broadcast_frame(&self.tx, Frame::SwarmResumed { ts });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn authorized_mcps_default_to_empty() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        assert!(room.authorized_mcps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn authorize_mcps_round_trips() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.authorize_mcps(vec!["filesystem".to_string(), "github".to_string()])
            .await
            .unwrap();
        assert_eq!(
            room.authorized_mcps().await.unwrap(),
            vec!["filesystem".to_string(), "github".to_string()]
        );
    }

    #[tokio::test]
    async fn swarm_stop_toggles() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        assert!(!room.is_swarm_stopped().await.unwrap());
        room.set_swarm_stopped(true).await.unwrap();
        assert!(room.is_swarm_stopped().await.unwrap());
        room.set_swarm_stopped(false).await.unwrap();
        assert!(!room.is_swarm_stopped().await.unwrap());
    }
}
