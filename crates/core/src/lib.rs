//! Core library for the swarm coordination hub.
//!
//! Contains the per-project room engine: storage, domain model, wire
//! protocol, and the command dispatcher that backs both the WebSocket and
//! HTTP surfaces in `hub-server`.

pub mod error;
pub mod model;
pub mod protocol;
pub mod room;
pub mod storage;

pub use error::Error;
pub use room::Room;

pub type Result<T> = std::result::Result<T, Error>;
