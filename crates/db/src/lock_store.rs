//! [`LockStore`] backed by the `slot_locks` table.
//!
//! Mutual exclusion comes from a single upsert whose `DO UPDATE` only fires
//! when the existing row belongs to the caller or has expired. Postgres
//! serializes conflicting inserts on the primary key, so concurrent
//! acquirers of a free slot resolve to exactly one winner. All time
//! comparisons use the database clock (`NOW()`).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use slotlock_core::error::CoreError;
use slotlock_core::lock_store::LockStore;
use slotlock_core::slot_lock::{secs_until, AcquireOutcome, HolderToken, SlotLockStatus};
use slotlock_core::types::SlotId;

use crate::models::SlotLockRow;
use crate::DbPool;

/// Column list for `slot_locks` reads, stamped with the database time.
const LOCK_COLUMNS: &str = "slot_id, holder_token, acquired_at, expires_at, NOW() AS observed_at";

/// How many times acquire retries when the blocking lock vanishes between
/// the upsert and the follow-up read.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

pub struct PgLockStore {
    pool: DbPool,
    ttl_secs: u64,
}

impl PgLockStore {
    pub fn new(pool: DbPool, ttl_secs: u64) -> Self {
        Self { pool, ttl_secs }
    }

    /// Insert or take over the row for `slot_id`. Returns `true` on grant.
    async fn try_claim(&self, slot_id: SlotId, holder: &HolderToken) -> Result<bool, sqlx::Error> {
        let claimed = sqlx::query_scalar::<_, SlotId>(
            "INSERT INTO slot_locks (slot_id, holder_token, acquired_at, expires_at) \
             VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3)) \
             ON CONFLICT (slot_id) DO UPDATE \
             SET holder_token = EXCLUDED.holder_token, \
                 acquired_at = EXCLUDED.acquired_at, \
                 expires_at = EXCLUDED.expires_at \
             WHERE slot_locks.holder_token = EXCLUDED.holder_token \
                OR slot_locks.expires_at <= NOW() \
             RETURNING slot_id",
        )
        .bind(slot_id)
        .bind(holder.as_str())
        .bind(self.ttl_secs as f64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed.is_some())
    }

    /// Fetch the live row for `slot_id`, if any.
    async fn get_live(&self, slot_id: SlotId) -> Result<Option<SlotLockRow>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM slot_locks \
             WHERE slot_id = $1 AND expires_at > NOW()"
        );
        sqlx::query_as::<_, SlotLockRow>(&query)
            .bind(slot_id)
            .fetch_optional(&self.pool)
            .await
    }
}

fn backend_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Slot lock query failed");
    CoreError::Backend(err.to_string())
}

#[async_trait]
impl LockStore for PgLockStore {
    async fn acquire(
        &self,
        slot_id: SlotId,
        holder: &HolderToken,
    ) -> Result<AcquireOutcome, CoreError> {
        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            if self.try_claim(slot_id, holder).await.map_err(backend_error)? {
                tracing::debug!(slot_id, ttl_secs = self.ttl_secs, "Slot lock granted");
                return Ok(AcquireOutcome::Granted {
                    expires_in: self.ttl_secs,
                });
            }

            match self.get_live(slot_id).await.map_err(backend_error)? {
                Some(row) if row.holder_token != holder.as_str() => {
                    let expires_in = secs_until(row.expires_at, row.observed_at);
                    tracing::debug!(slot_id, expires_in, "Slot lock denied");
                    return Ok(AcquireOutcome::Denied { expires_in });
                }
                // Released or expired in between; try the claim again.
                _ => {
                    tracing::debug!(slot_id, attempt, "Blocking slot lock vanished, retrying");
                }
            }
        }

        Err(CoreError::Internal(format!(
            "Slot {slot_id} lock state kept changing during acquire"
        )))
    }

    async fn release(&self, slot_id: SlotId, holder: &HolderToken) -> Result<bool, CoreError> {
        let was_live = sqlx::query_scalar::<_, bool>(
            "DELETE FROM slot_locks \
             WHERE slot_id = $1 AND holder_token = $2 \
             RETURNING expires_at > NOW()",
        )
        .bind(slot_id)
        .bind(holder.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(was_live.unwrap_or(false))
    }

    async fn status(
        &self,
        slot_ids: &[SlotId],
        viewer: &HolderToken,
    ) -> Result<BTreeMap<SlotId, SlotLockStatus>, CoreError> {
        if slot_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let query = format!("SELECT {LOCK_COLUMNS} FROM slot_locks WHERE slot_id = ANY($1)");
        let rows = sqlx::query_as::<_, SlotLockRow>(&query)
            .bind(slot_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;

        let observed: HashMap<SlotId, _> = rows
            .into_iter()
            .filter_map(|row| {
                let now = row.observed_at;
                row.into_lock().map(|lock| (lock.slot_id, (lock, now)))
            })
            .collect();

        Ok(slot_ids
            .iter()
            .map(|id| {
                let status = match observed.get(id) {
                    Some((lock, now)) => SlotLockStatus::observe(Some(lock), viewer, *now),
                    None => SlotLockStatus::UNLOCKED,
                };
                (*id, status)
            })
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM slot_locks WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(backend_error)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}
