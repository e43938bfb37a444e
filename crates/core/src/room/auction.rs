//! Capability-matched auctions (spec §4.2.4).

use serde::Serialize;
use tracing::{debug, info, warn};

use super::task_claim::claim_task_locked;
use super::{append_event, broadcast_frame, next_ts, Room};
use crate::model::{Auction, Bid};
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnnounceResult {
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BidResult {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAuctionResult {
    pub winner: Option<String>,
}

impl Room {
    pub async fn announce_task(
        &self,
        task_id: &str,
        title: &str,
        required_capabilities: Vec<String>,
    ) -> Result<AnnounceResult> {
        let mut inner = self.inner.lock().await;
        let ts = next_ts(&mut inner);
        inner
            .store
            .put(
                &keys::auction(task_id),
                &Auction {
                    task_id: task_id.to_string(),
                    title: title.to_string(),
                    required_capabilities: required_capabilities.clone(),
                    bids: Vec::new(),
                },
            )
            .await?;
        append_event(
            &inner.store,
            ts,
            "task_announced",
            serde_json::json!({ "taskId": task_id, "title": title }),
        )
        .await?;
        broadcast_frame(
            &self.tx,
            Frame::TaskAnnounced {
                ts,
                task_id: task_id.to_string(),
                title: title.to_string(),
                required_capabilities,
            },
        );
        debug!(task_id, title, "task announced");
        Ok(AnnounceResult { ok: true })
    }

    pub async fn bid_task(
        &self,
        task_id: &str,
        agent: &str,
        capabilities: Vec<String>,
    ) -> Result<BidResult> {
        let mut inner = self.inner.lock().await;
        let key = keys::auction(task_id);
        let mut auction: Option<Auction> = inner.store.get(&key).await?;
        let Some(auction) = auction.as_mut() else {
            warn!(task_id, agent, "bid dropped, no such auction");
            return Ok(BidResult { ok: false });
        };

        let ts = next_ts(&mut inner);
        auction.bids.push(Bid {
            agent: agent.to_string(),
            capabilities: capabilities.clone(),
            ts,
        });
        let auction = auction.clone();
        inner.store.put(&key, &auction).await?;
        append_event(
            &inner.store,
            ts,
            "task_bid",
            serde_json::json!({ "taskId": task_id, "agent": agent }),
        )
        .await?;
        broadcast_frame(
            &self.tx,
            Frame::TaskBid {
                ts,
                task_id: task_id.to_string(),
                agent: agent.to_string(),
                capabilities,
            },
        );
        debug!(task_id, agent, "bid recorded");
        Ok(BidResult { ok: true })
    }

    /// Winner is the first bid (insertion order) whose capability set is a
    /// superset of what was required; failing that, the first bidder at
    /// all. Resolving also claims the task for the winner as a subcommand.
    pub async fn resolve_auction(&self, task_id: &str) -> Result<ResolveAuctionResult> {
        let mut inner = self.inner.lock().await;
        let key = keys::auction(task_id);
        let auction: Option<Auction> = inner.store.get(&key).await?;
        let Some(auction) = auction else {
            debug!(task_id, "auction resolve skipped, no such auction");
            return Ok(ResolveAuctionResult { winner: None });
        };
        if auction.bids.is_empty() {
            debug!(task_id, "auction resolved with no bids");
            return Ok(ResolveAuctionResult { winner: None });
        }

        let required: std::collections::HashSet<&str> =
            auction.required_capabilities.iter().map(String::as_str).collect();
        let winner = auction
            .bids
            .iter()
            .find(|bid| {
                let caps: std::collections::HashSet<&str> =
                    bid.capabilities.iter().map(String::as_str).collect();
                required.is_subset(&caps)
            })
            .or_else(|| auction.bids.first())
            .map(|bid| bid.agent.clone())
            .expect("bids is non-empty");

        claim_task_locked(&mut inner, &self.tx, task_id, &winner).await?;

        let ts = next_ts(&mut inner);
        append_event(
            &inner.store,
            ts,
            "auction_resolved",
            serde_json::json!({ "taskId": task_id, "winner": winner }),
        )
        .await?;
        broadcast_frame(
            &self.tx,
            Frame::AuctionResolved {
                ts,
                task_id: task_id.to_string(),
                winner: Some(winner.clone()),
            },
        );
        info!(task_id, winner, "auction resolved");
        Ok(ResolveAuctionResult { winner: Some(winner) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn winner_must_satisfy_required_capabilities() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();

        room.announce_task("T1", "Ship it", vec!["rust".into(), "async".into()])
            .await
            .unwrap();
        room.bid_task("T1", "alice", vec!["go".into()]).await.unwrap();
        room.bid_task("T1", "bob", vec!["rust".into(), "async".into(), "sql".into()])
            .await
            .unwrap();

        let resolved = room.resolve_auction("T1").await.unwrap();
        assert_eq!(resolved.winner.as_deref(), Some("bob"));

        let claim = room.claim_task("T1", "bob").await.unwrap();
        assert!(claim.ok);
    }

    #[tokio::test]
    async fn empty_requirements_means_first_bidder_wins() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.announce_task("T2", "Anything", vec![]).await.unwrap();
        room.bid_task("T2", "carol", vec![]).await.unwrap();
        room.bid_task("T2", "dave", vec!["rust".into()]).await.unwrap();

        let resolved = room.resolve_auction("T2").await.unwrap();
        assert_eq!(resolved.winner.as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn zero_bids_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.announce_task("T3", "Nothing", vec![]).await.unwrap();
        let resolved = room.resolve_auction("T3").await.unwrap();
        assert_eq!(resolved.winner, None);
    }

    #[tokio::test]
    async fn bids_on_unannounced_task_are_dropped() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        let result = room.bid_task("ghost", "alice", vec![]).await.unwrap();
        assert!(!result.ok);
    }
}
