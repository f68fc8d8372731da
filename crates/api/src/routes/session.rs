use axum::routing::post;
use axum::Router;

use crate::handlers::session;
use crate::state::AppState;

/// Session routes.
///
/// ```text
/// POST /session                                    -> open_session
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/session", post(session::open_session))
}
