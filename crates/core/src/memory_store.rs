//! In-process [`LockStore`] backed by a mutex-guarded map.
//!
//! A single `tokio::sync::Mutex` serializes every mutation, which makes the
//! acquire check-then-set atomic for all slots at once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::CoreError;
use crate::lock_store::LockStore;
use crate::slot_lock::{AcquireOutcome, HolderToken, SlotLock, SlotLockStatus};
use crate::types::SlotId;

pub struct MemoryLockStore {
    locks: Mutex<HashMap<SlotId, SlotLock>>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl MemoryLockStore {
    /// Create a store using the system clock.
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_clock(ttl_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            ttl_secs,
            clock,
        }
    }

    /// Number of entries currently stored, live or not.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn acquire(
        &self,
        slot_id: SlotId,
        holder: &HolderToken,
    ) -> Result<AcquireOutcome, CoreError> {
        let mut locks = self.locks.lock().await;
        // Read the clock under the guard so a queued request cannot stamp a
        // grant older than one already made.
        let now = self.clock.now();

        if let Some(existing) = locks.get(&slot_id) {
            if existing.is_live(now) && !existing.is_held_by(holder) {
                let expires_in = existing.expires_in(now);
                tracing::debug!(slot_id, expires_in, "Slot lock denied");
                return Ok(AcquireOutcome::Denied { expires_in });
            }
        }

        let renewed = locks
            .get(&slot_id)
            .is_some_and(|l| l.is_live(now) && l.is_held_by(holder));
        locks.insert(
            slot_id,
            SlotLock::granted(slot_id, holder.clone(), now, self.ttl_secs),
        );
        tracing::debug!(slot_id, renewed, ttl_secs = self.ttl_secs, "Slot lock granted");

        Ok(AcquireOutcome::Granted {
            expires_in: self.ttl_secs,
        })
    }

    async fn release(&self, slot_id: SlotId, holder: &HolderToken) -> Result<bool, CoreError> {
        let mut locks = self.locks.lock().await;

        match locks.get(&slot_id) {
            Some(existing) if existing.is_held_by(holder) => {
                let was_live = existing.is_live(self.clock.now());
                locks.remove(&slot_id);
                // An expired lock was already gone as far as anyone could see.
                Ok(was_live)
            }
            _ => Ok(false),
        }
    }

    async fn status(
        &self,
        slot_ids: &[SlotId],
        viewer: &HolderToken,
    ) -> Result<BTreeMap<SlotId, SlotLockStatus>, CoreError> {
        let locks = self.locks.lock().await;
        let now = self.clock.now();

        Ok(slot_ids
            .iter()
            .map(|id| (*id, SlotLockStatus::observe(locks.get(id), viewer, now)))
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64, CoreError> {
        let mut locks = self.locks.lock().await;
        let now = self.clock.now();
        let before = locks.len();
        locks.retain(|_, lock| lock.is_live(now));
        Ok((before - locks.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CoreError> {
        Ok(())
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (Arc<MemoryLockStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryLockStore::with_clock(60, clock.clone()));
        (store, clock)
    }

    fn holder(raw: &str) -> HolderToken {
        HolderToken::parse(raw).unwrap()
    }

    // -----------------------------------------------------------------------
    // Acquire
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_acquire_unknown_slot_succeeds() {
        let (store, _) = store();
        let outcome = store.acquire(12345, &holder("h1")).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Granted { expires_in: 60 });
    }

    #[tokio::test]
    async fn test_contention_then_release_hands_over() {
        let (store, _) = store();
        let h1 = holder("holder1");
        let h2 = holder("holder2");

        assert_eq!(
            store.acquire(1, &h1).await.unwrap(),
            AcquireOutcome::Granted { expires_in: 60 }
        );
        assert_eq!(
            store.acquire(1, &h2).await.unwrap(),
            AcquireOutcome::Denied { expires_in: 60 }
        );

        assert!(store.release(1, &h1).await.unwrap());
        assert_eq!(
            store.acquire(1, &h2).await.unwrap(),
            AcquireOutcome::Granted { expires_in: 60 }
        );
    }

    #[tokio::test]
    async fn test_reacquire_by_same_holder_renews() {
        let (store, clock) = store();
        let h1 = holder("holder1");

        store.acquire(1, &h1).await.unwrap();
        clock.advance_secs(45);
        assert_eq!(
            store.acquire(1, &h1).await.unwrap(),
            AcquireOutcome::Granted { expires_in: 60 }
        );

        // The renewal pushed expiry out a full TTL from the second call.
        clock.advance_secs(30);
        let status = store.status(&[1], &holder("other")).await.unwrap();
        assert!(status[&1].locked);
        assert_eq!(status[&1].expires_in, Some(30));
    }

    #[tokio::test]
    async fn test_denied_reports_remaining_time() {
        let (store, clock) = store();
        store.acquire(1, &holder("h1")).await.unwrap();
        clock.advance_millis(20_500);

        assert_matches!(
            store.acquire(1, &holder("h2")).await.unwrap(),
            AcquireOutcome::Denied { expires_in: 40 }
        );
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_by_anyone() {
        let (store, clock) = store();
        store.acquire(1, &holder("h1")).await.unwrap();
        clock.advance_secs(61);

        assert_matches!(
            store.acquire(1, &holder("h2")).await.unwrap(),
            AcquireOutcome::Granted { .. }
        );
    }

    #[tokio::test]
    async fn test_concurrent_acquire_storm_has_one_winner() {
        let (store, _) = store();

        let attempts = (0..64).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let me = HolderToken::parse(format!("holder{i}")).unwrap();
                store.acquire(99, &me).await.unwrap()
            })
        });
        let outcomes: Vec<AcquireOutcome> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let winners = outcomes.iter().filter(|o| o.is_granted()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .filter(|o| !o.is_granted())
            .all(|o| *o == AcquireOutcome::Denied { expires_in: 60 }));
    }

    #[tokio::test]
    async fn test_queued_renewal_is_stamped_when_it_runs() {
        let (store, clock) = store();
        let me = holder("me");

        // Park a renewal behind the map lock, then let time pass.
        let guard = store.locks.lock().await;
        let queued = tokio::spawn({
            let store = Arc::clone(&store);
            let me = me.clone();
            async move { store.acquire(1, &me).await.unwrap() }
        });
        tokio::task::yield_now().await;
        clock.advance_secs(10);
        drop(guard);

        assert!(queued.await.unwrap().is_granted());
        let expires_at = store.locks.lock().await.get(&1).unwrap().expires_at;
        assert_eq!(expires_at, clock.now() + crate::slot_lock::ttl_duration(60));
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_release_by_other_holder_is_noop() {
        let (store, _) = store();
        let h1 = holder("h1");
        store.acquire(1, &h1).await.unwrap();

        assert!(!store.release(1, &holder("h2")).await.unwrap());

        let status = store.status(&[1], &h1).await.unwrap();
        assert!(status[&1].locked_by_me);
    }

    #[tokio::test]
    async fn test_release_missing_lock_is_noop() {
        let (store, _) = store();
        assert!(!store.release(5, &holder("h1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_late_release_does_not_clobber_next_holder() {
        let (store, clock) = store();
        let h1 = holder("h1");
        let h2 = holder("h2");

        store.acquire(1, &h1).await.unwrap();
        clock.advance_secs(61);
        store.acquire(1, &h2).await.unwrap();

        // h1's delayed release (e.g. an unload beacon) arrives now.
        assert!(!store.release(1, &h1).await.unwrap());
        let status = store.status(&[1], &h2).await.unwrap();
        assert!(status[&1].locked_by_me);
    }

    #[tokio::test]
    async fn test_duplicate_release_is_safe() {
        let (store, _) = store();
        let h1 = holder("h1");
        store.acquire(1, &h1).await.unwrap();

        assert!(store.release(1, &h1).await.unwrap());
        assert!(!store.release(1, &h1).await.unwrap());
    }

    // -----------------------------------------------------------------------
    // Status and expiry
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_status_after_ttl_reports_unlocked() {
        let (store, clock) = store();
        let h1 = holder("h1");
        store.acquire(1, &h1).await.unwrap();
        clock.advance_secs(61);

        let status = store.status(&[1], &h1).await.unwrap();
        assert_eq!(status[&1], SlotLockStatus::UNLOCKED);
    }

    #[tokio::test]
    async fn test_status_covers_every_requested_slot() {
        let (store, _) = store();
        let me = holder("me");
        store.acquire(1, &me).await.unwrap();
        store.acquire(2, &holder("them")).await.unwrap();

        let status = store.status(&[1, 2, 3], &me).await.unwrap();
        assert_eq!(status.len(), 3);
        assert!(status[&1].locked && status[&1].locked_by_me);
        assert!(status[&2].locked && !status[&2].locked_by_me);
        assert_eq!(status[&3], SlotLockStatus::UNLOCKED);
    }

    #[tokio::test]
    async fn test_purge_expired_removes_only_dead_locks() {
        let (store, clock) = store();
        store.acquire(1, &holder("h1")).await.unwrap();
        clock.advance_secs(30);
        store.acquire(2, &holder("h2")).await.unwrap();
        clock.advance_secs(31);

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }
}
