//! Process configuration from the environment (spec §6 "Environment").

use std::net::SocketAddr;
use std::path::PathBuf;

pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub auth_token: Option<String>,
}

impl Config {
    /// Missing `SWARM_AUTH_TOKEN` means open (development) mode, per spec §6.
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("SWARM_BIND_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "127.0.0.1:8787".parse().unwrap());

        let data_dir = std::env::var("SWARM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".swarm-data"));

        let auth_token = std::env::var("SWARM_AUTH_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        Self {
            bind_addr,
            data_dir,
            auth_token,
        }
    }
}
