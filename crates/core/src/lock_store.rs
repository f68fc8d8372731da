//! The authority for slot-lock mutual exclusion.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::slot_lock::{AcquireOutcome, HolderToken, SlotLockStatus};
use crate::types::SlotId;

/// Storage backend for slot locks.
///
/// Implementations must make `acquire` an atomic check-then-set per slot:
/// two concurrent acquirers of the same free slot never both see
/// [`AcquireOutcome::Granted`]. Expired locks are treated as absent by every
/// read, so no background sweep is needed for correctness.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Grant or refresh a lock on `slot_id` for `holder`.
    ///
    /// Succeeds when the slot is free, expired, or already held by `holder`
    /// (re-acquire renews the TTL). Otherwise reports the seconds remaining
    /// on the other holder's lock.
    async fn acquire(
        &self,
        slot_id: SlotId,
        holder: &HolderToken,
    ) -> Result<AcquireOutcome, CoreError>;

    /// Remove the lock on `slot_id` if `holder` owns it.
    ///
    /// Returns `true` if a lock was removed. A foreign or missing lock is a
    /// no-op returning `false`.
    async fn release(&self, slot_id: SlotId, holder: &HolderToken) -> Result<bool, CoreError>;

    /// Lock state of each requested slot as seen by `viewer`.
    async fn status(
        &self,
        slot_ids: &[SlotId],
        viewer: &HolderToken,
    ) -> Result<BTreeMap<SlotId, SlotLockStatus>, CoreError>;

    /// Drop locks whose TTL has elapsed. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, CoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), CoreError>;

    /// Lock time-to-live in seconds.
    fn ttl_secs(&self) -> u64;
}
