use std::sync::Arc;

use slotlock_core::lock_store::LockStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The authoritative slot lock store.
    pub store: Arc<dyn LockStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
