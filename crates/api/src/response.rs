//! Shared response envelope types for API handlers.
//!
//! Non-lock endpoints use a `{ "data": ... }` envelope. The lock endpoints
//! return their contract bodies unwrapped because browser callers and the
//! Rust client both parse them directly.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: session }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
