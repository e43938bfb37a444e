//! Presence pulses (spec §4.2.7).

use tracing::debug;

use super::{broadcast_frame, next_ts, now_ms, Room};
use crate::model::{Pulse, PresenceStatus, SwarmPulseSnapshot, PULSE_STALE_MS};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

impl Room {
    /// Upserts the caller's pulse. There's no result type beyond the pulse
    /// itself — the broadcast frame carries it, spec §6 has no separate ack.
    pub async fn update_pulse(
        &self,
        agent: &str,
        platform: Option<String>,
        branch: Option<String>,
        current_file: Option<String>,
        current_task: Option<String>,
        status: PresenceStatus,
    ) -> Result<Pulse> {
        let mut inner = self.inner.lock().await;
        let ts = next_ts(&mut inner);
        let pulse = Pulse {
            agent: agent.to_string(),
            platform,
            branch,
            current_file,
            current_task,
            status,
            last_update: ts,
        };
        inner.store.put(&keys::pulse(agent), &pulse).await?;
        debug!(agent, status = ?pulse.status, "pulse updated");
        broadcast_frame(&self.tx, Frame::PulseUpdate { ts, pulse: pulse.clone() });
        Ok(pulse)
    }

    /// Pulses older than 10 minutes are excluded (spec §3). `lastUpdate` on
    /// the snapshot is the most recent pulse timestamp in the live set, or
    /// now if nobody has reported in.
    pub async fn get_swarm_pulse(&self) -> Result<SwarmPulseSnapshot> {
        let inner = self.inner.lock().await;
        let now = now_ms();
        let pulses: Vec<(String, Pulse)> = inner.store.list_prefix(keys::PULSE_PREFIX).await?;
        let agents: Vec<Pulse> = pulses
            .into_iter()
            .map(|(_, pulse)| pulse)
            .filter(|pulse| now - pulse.last_update <= PULSE_STALE_MS)
            .collect();
        let last_update = agents.iter().map(|pulse| pulse.last_update).max().unwrap_or(now);
        Ok(SwarmPulseSnapshot { agents, last_update })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn stale_pulses_are_excluded() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.update_pulse("alice", None, None, None, None, PresenceStatus::Active)
            .await
            .unwrap();

        {
            let mut inner = room.inner.lock().await;
            let mut pulse: Pulse = inner.store.get(&keys::pulse("alice")).await.unwrap().unwrap();
            pulse.last_update = now_ms() - PULSE_STALE_MS - 1;
            inner.store.put(&keys::pulse("alice"), &pulse).await.unwrap();
        }

        assert!(room.get_swarm_pulse().await.unwrap().agents.is_empty());
    }

    #[tokio::test]
    async fn fresh_pulse_is_reported() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.update_pulse(
            "bob",
            Some("linux".to_string()),
            Some("main".to_string()),
            Some("src/lib.rs".to_string()),
            None,
            PresenceStatus::Active,
        )
        .await
        .unwrap();
        let snapshot = room.get_swarm_pulse().await.unwrap();
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.agents[0].agent, "bob");
        assert_eq!(snapshot.last_update, snapshot.agents[0].last_update);
    }
}
