pub mod health;
pub mod session;
pub mod slot_locks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /session                                         issue holder token (POST)
///
/// /slots/{slot_id}/lock                            acquire (POST), release (DELETE)
/// /slots/{slot_id}/lock/release                    beacon release (POST)
/// /locks?slot_ids=1,2,3                            bulk status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(session::router())
        .merge(slot_locks::router())
}
