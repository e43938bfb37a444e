//! Application state: the registry of lazily-created [`Room`]s plus the
//! gateway's static auth token (spec §4.1, §9 "Room isolation").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use hub_core::Room;
use tokio::sync::RwLock;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    data_dir: PathBuf,
    auth_token: Option<String>,
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                data_dir: config.data_dir.clone(),
                auth_token: config.auth_token.clone(),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.inner.auth_token.as_deref()
    }

    /// Rooms are never shared across projects and never torn down once
    /// created (spec §9 "Room isolation") — a project name always maps to
    /// the same room handle for the life of the process.
    pub async fn room(&self, project: &str) -> hub_core::Result<Arc<Room>> {
        if let Some(room) = self.inner.rooms.read().await.get(project) {
            return Ok(Arc::clone(room));
        }

        let mut rooms = self.inner.rooms.write().await;
        if let Some(room) = rooms.get(project) {
            return Ok(Arc::clone(room));
        }

        tracing::info!(project, "opening room");
        let room = Arc::new(Room::open(&self.inner.data_dir, project).await?);
        rooms.insert(project.to_string(), Arc::clone(&room));
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn same_project_always_returns_the_same_room() {
        let dir = TempDir::new().unwrap();
        let state = AppState::new(&Config {
            data_dir: dir.path().to_path_buf(),
            auth_token: None,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        });

        let a = state.room("alpha").await.unwrap();
        let b = state.room("alpha").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn distinct_projects_get_isolated_rooms() {
        let dir = TempDir::new().unwrap();
        let state = AppState::new(&Config {
            data_dir: dir.path().to_path_buf(),
            auth_token: None,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        });

        let a = state.room("alpha").await.unwrap();
        let b = state.room("beta").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
