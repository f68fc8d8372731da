//! Shared path and query parameter types for API handlers.

use axum::extract::{FromRequestParts, Path};
use serde::Deserialize;
use slotlock_core::types::SlotId;

use crate::error::AppError;

/// The `{slot_id}` path segment.
///
/// A segment that is not an integer is answered with the usual JSON error
/// body instead of axum's plain-text rejection.
#[derive(Debug, Deserialize, FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct SlotPath(pub SlotId);

/// Query parameters for the bulk lock status endpoint (`?slot_ids=1,2,3`).
///
/// Kept as a raw string and parsed with
/// [`parse_slot_ids`](slotlock_core::slot_lock::parse_slot_ids) so that a
/// single malformed id produces a readable 400 instead of a generic
/// deserialization failure.
#[derive(Debug, Deserialize)]
pub struct SlotIdsParams {
    #[serde(default)]
    pub slot_ids: String,
}
