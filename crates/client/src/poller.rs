//! Periodic refresh of peer lock status.
//!
//! Badges are advisory. A slot shown as available can still be denied by the
//! server, and a failed poll just leaves the previous badges in place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use slotlock_core::slot_lock::SlotLockStatus;
use slotlock_core::types::SlotId;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::LockApi;
use crate::events::SlotBadge;

/// Translate a status response into badges.
pub fn badges(statuses: &BTreeMap<SlotId, SlotLockStatus>) -> BTreeMap<SlotId, SlotBadge> {
    statuses
        .iter()
        .map(|(slot_id, status)| (*slot_id, SlotBadge::from_status(status)))
        .collect()
}

/// Poll status for the visible slots every `interval` until `cancel` fires.
///
/// Polls once immediately, then on every tick and whenever the visible set
/// changes. Nothing is requested while the set is empty.
pub async fn run<F>(
    api: Arc<dyn LockApi>,
    mut visible: watch::Receiver<BTreeSet<SlotId>>,
    interval: Duration,
    cancel: CancellationToken,
    mut on_badges: F,
) where
    F: FnMut(BTreeMap<SlotId, SlotBadge>) + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(interval_secs = interval.as_secs(), "Lock status poller started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Lock status poller stopping");
                break;
            }
            _ = ticker.tick() => {}
            changed = visible.changed() => {
                if changed.is_err() {
                    break;
                }
                ticker.reset();
            }
        }

        let slot_ids: Vec<SlotId> = visible.borrow_and_update().iter().copied().collect();
        if slot_ids.is_empty() {
            continue;
        }

        match api.status(&slot_ids).await {
            Ok(statuses) => on_badges(badges(&statuses)),
            Err(e) => {
                tracing::debug!(error = %e, slots = slot_ids.len(), "Lock status poll failed, skipping");
            }
        }
    }
}
