//! Handlers for slot reservation locks.
//!
//! Acquire, release (plus a beacon-friendly release variant), and bulk
//! status. Holder identity never appears in a response; other sessions only
//! learn that a slot is locked and roughly for how long.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use slotlock_core::slot_lock::{
    parse_slot_ids, validate_slot_id, AcquireOutcome, AcquireResponse, SlotLockStatus,
};
use slotlock_core::error::CoreError;
use slotlock_core::types::SlotId;

use crate::error::{AppError, AppResult};
use crate::middleware::holder::Holder;
use crate::query::{SlotIdsParams, SlotPath};
use crate::state::AppState;

/// POST /api/v1/slots/{slot_id}/lock
///
/// Acquire or renew the hold on a slot. Returns 200 with
/// `{success: true, expires_in}` when granted, or 409 with
/// `{success: false, error: "locked", expires_in}` when another session
/// holds it.
pub async fn acquire_lock(
    holder: Holder,
    State(state): State<AppState>,
    SlotPath(slot_id): SlotPath,
) -> AppResult<impl IntoResponse> {
    validate_slot_id(slot_id).map_err(CoreError::Validation)?;

    let outcome = state.store.acquire(slot_id, &holder.token).await?;

    let status = match outcome {
        AcquireOutcome::Granted { expires_in } => {
            tracing::info!(slot_id, holder = %holder.token, expires_in, "Slot lock acquired");
            StatusCode::OK
        }
        // Contention is expected traffic, not an error.
        AcquireOutcome::Denied { expires_in } => {
            tracing::debug!(slot_id, holder = %holder.token, expires_in, "Slot lock held by another session");
            StatusCode::CONFLICT
        }
    };

    Ok((status, Json(AcquireResponse::from(outcome))))
}

/// DELETE /api/v1/slots/{slot_id}/lock
///
/// Release the caller's hold. Releasing a lock the caller does not own (or
/// that already expired) is a silent no-op, so duplicate or late releases
/// are always safe.
pub async fn release_lock(
    holder: Holder,
    State(state): State<AppState>,
    SlotPath(slot_id): SlotPath,
) -> AppResult<StatusCode> {
    release(&state, &holder, slot_id, "explicit").await
}

/// POST /api/v1/slots/{slot_id}/lock/release
///
/// Same as [`release_lock`] but reachable with a one-way POST, which is
/// what page-unload beacons can send.
pub async fn release_lock_beacon(
    holder: Holder,
    State(state): State<AppState>,
    SlotPath(slot_id): SlotPath,
) -> AppResult<StatusCode> {
    release(&state, &holder, slot_id, "beacon").await
}

async fn release(
    state: &AppState,
    holder: &Holder,
    slot_id: SlotId,
    via: &'static str,
) -> AppResult<StatusCode> {
    validate_slot_id(slot_id).map_err(CoreError::Validation)?;

    let released = state.store.release(slot_id, &holder.token).await?;
    if released {
        tracing::info!(slot_id, holder = %holder.token, via, "Slot lock released");
    } else {
        tracing::debug!(slot_id, holder = %holder.token, via, "Release ignored, no lock held by caller");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/locks?slot_ids=1,2,3
///
/// Bulk lock status for polling. Every requested slot appears in the result;
/// expired locks read as unlocked.
pub async fn lock_status(
    holder: Holder,
    State(state): State<AppState>,
    Query(params): Query<SlotIdsParams>,
) -> AppResult<Json<BTreeMap<SlotId, SlotLockStatus>>> {
    let slot_ids = parse_slot_ids(&params.slot_ids).map_err(AppError::BadRequest)?;

    let statuses = state.store.status(&slot_ids, &holder.token).await?;
    Ok(Json(statuses))
}
