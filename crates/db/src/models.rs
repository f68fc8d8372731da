//! Row types for the `slot_locks` table.

use slotlock_core::slot_lock::{HolderToken, SlotLock};
use slotlock_core::types::{SlotId, Timestamp};
use sqlx::FromRow;

/// A row from the `slot_locks` table.
#[derive(Debug, Clone, FromRow)]
pub struct SlotLockRow {
    pub slot_id: SlotId,
    pub holder_token: String,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    /// Database time at the moment the row was read.
    pub observed_at: Timestamp,
}

impl SlotLockRow {
    /// Convert into a domain lock.
    ///
    /// Rows are only ever written with validated tokens, so a parse failure
    /// means the table was edited by hand; such a row is reported as `None`.
    pub fn into_lock(self) -> Option<SlotLock> {
        let holder_token = HolderToken::parse(self.holder_token).ok()?;
        Some(SlotLock {
            slot_id: self.slot_id,
            holder_token,
            acquired_at: self.acquired_at,
            expires_at: self.expires_at,
        })
    }
}
