//! Aggregate read models (spec §4.2.13): swarm stats, task list, room state.

use std::collections::HashMap;

use super::Room;
use crate::model::{Auction, FileLock, RoomStateSummary, SwarmStats, TaskClaim, TaskListEntry, TaskStatus};
use crate::storage::{keys, StorageExt};
use crate::Result;

impl Room {
    pub async fn get_swarm_stats(&self) -> Result<SwarmStats> {
        let pulses = self.get_swarm_pulse().await?;
        let inner = self.inner.lock().await;
        let claims: Vec<(String, TaskClaim)> = inner.store.list_prefix(keys::TASK_CLAIM_PREFIX).await?;
        let auctions: Vec<(String, Auction)> = inner.store.list_prefix(keys::AUCTION_PREFIX).await?;
        let locks: Vec<(String, FileLock)> = inner.store.list_prefix(keys::FILE_LOCK_PREFIX).await?;
        let frozen: Vec<(String, serde_json::Value)> = inner.store.list_prefix_raw(keys::FROZEN_PREFIX).await?;
        let swarm_stopped: bool = inner.store.get(keys::SWARM_STOPPED).await?.unwrap_or(false);
        let now = super::now_ms();

        Ok(SwarmStats {
            agent_count: pulses.agents.len(),
            active_tasks: claims.len(),
            open_auctions: auctions.iter().filter(|(_, a)| !task_claimed(&claims, &a.task_id)).count(),
            locked_files: locks.into_iter().filter(|(_, lock)| lock.exp > now).count(),
            frozen_agents: frozen.len(),
            swarm_stopped,
        })
    }

    /// Every announced or claimed task, merged from auctions and claims.
    pub async fn get_task_list(&self) -> Result<Vec<TaskListEntry>> {
        let inner = self.inner.lock().await;
        let claims: Vec<(String, TaskClaim)> = inner.store.list_prefix(keys::TASK_CLAIM_PREFIX).await?;
        let auctions: Vec<(String, Auction)> = inner.store.list_prefix(keys::AUCTION_PREFIX).await?;

        let claims_by_task: HashMap<String, TaskClaim> =
            claims.into_iter().map(|(_, claim)| (claim.task_id.clone(), claim)).collect();

        let mut entries: Vec<TaskListEntry> = auctions
            .into_iter()
            .map(|(_, auction)| {
                let claim = claims_by_task.get(&auction.task_id);
                TaskListEntry {
                    task_id: auction.task_id.clone(),
                    title: Some(auction.title),
                    assignee: claim.map(|c| c.agent.clone()),
                    status: if claim.is_some() {
                        TaskStatus::InProgress
                    } else {
                        TaskStatus::Announced
                    },
                    required_capabilities: auction.required_capabilities,
                }
            })
            .collect();

        let announced_ids: std::collections::HashSet<&str> =
            entries.iter().map(|e| e.task_id.as_str()).collect();
        for (task_id, claim) in &claims_by_task {
            if !announced_ids.contains(task_id.as_str()) {
                entries.push(TaskListEntry {
                    task_id: task_id.clone(),
                    title: None,
                    assignee: Some(claim.agent.clone()),
                    status: TaskStatus::InProgress,
                    required_capabilities: Vec::new(),
                });
            }
        }

        Ok(entries)
    }

    pub async fn get_state(&self) -> Result<RoomStateSummary> {
        let leader = self.current_leader().await?;
        let authorized_mcps = self.authorized_mcps().await?;
        Ok(RoomStateSummary { leader, authorized_mcps })
    }
}

fn task_claimed(claims: &[(String, TaskClaim)], task_id: &str) -> bool {
    claims.iter().any(|(_, claim)| claim.task_id == task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn stats_reflect_claims_locks_and_frozen_agents() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.claim_task("t1", "alice").await.unwrap();
        room.lock_file("src/a.rs", "alice", true, None).await.unwrap();
        room.freeze_agent("bob", "noise").await.unwrap();
        room.announce_task("t2", "Next thing", vec![]).await.unwrap();

        let stats = room.get_swarm_stats().await.unwrap();
        assert_eq!(stats.active_tasks, 1);
        assert_eq!(stats.locked_files, 1);
        assert_eq!(stats.frozen_agents, 1);
        assert_eq!(stats.open_auctions, 1);
    }

    #[tokio::test]
    async fn task_list_merges_announced_and_claimed() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.announce_task("t1", "Build the thing", vec!["rust".to_string()])
            .await
            .unwrap();
        room.claim_task("t2", "alice").await.unwrap();

        let tasks = room.get_task_list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        let announced = tasks.iter().find(|t| t.task_id == "t1").unwrap();
        assert_eq!(announced.status, TaskStatus::Announced);
        let claimed = tasks.iter().find(|t| t.task_id == "t2").unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.assignee.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn state_reports_leader_and_policy() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.try_become_leader("alice").await.unwrap();
        room.authorize_mcps(vec!["filesystem".to_string()]).await.unwrap();

        let state = room.get_state().await.unwrap();
        assert_eq!(state.leader.as_deref(), Some("alice"));
        assert_eq!(state.authorized_mcps, vec!["filesystem".to_string()]);
    }
}
