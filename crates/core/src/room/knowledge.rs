//! Shared knowledge base (spec §4.2.11).

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{append_event, broadcast_frame, next_ts, Room};
use crate::model::KnowledgeEntry;
use crate::protocol::Frame;
use crate::storage::{keys, StorageExt};
use crate::Result;

const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddKnowledgeResult {
    pub id: String,
}

impl Room {
    pub async fn add_knowledge(
        &self,
        agent: &str,
        category: &str,
        title: &str,
        description: &str,
        solution: Option<String>,
    ) -> Result<AddKnowledgeResult> {
        let mut inner = self.inner.lock().await;
        let ts = next_ts(&mut inner);
        let id = format!("kb-{ts}-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let entry = KnowledgeEntry {
            id: id.clone(),
            agent: agent.to_string(),
            category: category.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            solution,
            created_at: ts,
        };
        inner.store.put(&keys::knowledge(&id), &entry).await?;
        append_event(
            &inner.store,
            ts,
            "knowledge_added",
            serde_json::json!({ "id": id, "title": title, "agent": agent }),
        )
        .await?;
        broadcast_frame(
            &self.tx,
            Frame::KnowledgeAdded {
                ts,
                id: id.clone(),
                title: title.to_string(),
                agent: agent.to_string(),
            },
        );
        debug!(id, agent, category, "knowledge entry added");
        Ok(AddKnowledgeResult { id })
    }

    /// Case-insensitive substring match over title and description, newest
    /// first, capped at 50 (spec §4.2.11).
    pub async fn search_knowledge(&self, query: &str) -> Result<Vec<KnowledgeEntry>> {
        let inner = self.inner.lock().await;
        let rows: Vec<(String, KnowledgeEntry)> = inner.store.list_prefix(keys::KNOWLEDGE_PREFIX).await?;
        let needle = query.to_lowercase();
        let mut matches: Vec<KnowledgeEntry> = rows
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| {
                needle.is_empty()
                    || entry.title.to_lowercase().contains(&needle)
                    || entry.description.to_lowercase().contains(&needle)
            })
            .collect();
        matches.sort_by_key(|entry| std::cmp::Reverse(entry.created_at));
        matches.truncate(SEARCH_LIMIT);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn search_matches_title_or_description_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.add_knowledge(
            "alice",
            "bugfix",
            "Flaky WebSocket reconnect",
            "Reconnect storm under load",
            Some("Add jitter".to_string()),
        )
        .await
        .unwrap();
        room.add_knowledge("bob", "tip", "Use rustfmt", "formatting tip", None)
            .await
            .unwrap();

        let results = room.search_knowledge("WEBSOCKET").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].agent, "alice");
    }

    #[tokio::test]
    async fn empty_query_returns_everything_newest_first() {
        let dir = TempDir::new().unwrap();
        let room = Room::open(dir.path(), "p").await.unwrap();
        room.add_knowledge("alice", "tip", "First", "first entry", None).await.unwrap();
        room.add_knowledge("bob", "tip", "Second", "second entry", None).await.unwrap();

        let results = room.search_knowledge("").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Second");
    }
}
