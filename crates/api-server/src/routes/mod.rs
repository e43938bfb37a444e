//! Route handlers, one file per surface (spec §6).

pub mod health;
pub mod room;
pub mod webhook;

/// Requests that omit `project` address the implicit single-project
/// deployment (spec §6).
fn default_project() -> String {
    "default".to_string()
}
