//! Route definitions for slot reservation locks.
//!
//! All endpoints require a holder identity via the `Holder` extractor.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::slot_locks;
use crate::state::AppState;

/// Slot lock routes.
///
/// ```text
/// POST   /slots/{slot_id}/lock                     -> acquire_lock
/// DELETE /slots/{slot_id}/lock                     -> release_lock
/// POST   /slots/{slot_id}/lock/release             -> release_lock_beacon
/// GET    /locks                                    -> lock_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/slots/{slot_id}/lock",
            post(slot_locks::acquire_lock).delete(slot_locks::release_lock),
        )
        .route(
            "/slots/{slot_id}/lock/release",
            post(slot_locks::release_lock_beacon),
        )
        .route("/locks", get(slot_locks::lock_status))
}
