//! The slot-hold state machine.
//!
//! A [`LockClient`] holds at most one slot at a time. Every transition goes
//! through one mutex; network calls happen outside it, and their results are
//! only applied if no newer transition happened while they were in flight.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use slotlock_core::slot_lock::{AcquireOutcome, MAX_LOCK_TTL_SECS};
use slotlock_core::types::SlotId;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{LockApi, LockApiError};
use crate::config::ClientConfig;
use crate::countdown::{remaining_secs, Countdown};
use crate::events::{LockEvent, SlotBadge, ACQUIRE_FAILED_MESSAGE, EVENT_CHANNEL_CAPACITY};
use crate::poller;
use crate::state::{ClientLockState, LockPhase, SelectOutcome};

struct PollerHandle {
    cancel: CancellationToken,
    visible: watch::Sender<BTreeSet<SlotId>>,
}

#[derive(Default)]
struct Inner {
    lock: ClientLockState,
    countdown: Option<Countdown>,
    poller: Option<PollerHandle>,
}

impl Inner {
    /// Drop the hold and its countdown. Returns the slot that was held.
    fn clear_hold(&mut self) -> Option<SlotId> {
        self.countdown = None;
        self.lock.clear()
    }
}

struct Shared {
    api: Arc<dyn LockApi>,
    config: ClientConfig,
    inner: Mutex<Inner>,
    events: broadcast::Sender<LockEvent>,
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: LockEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// What to do after deciding on a select under the lock.
enum SelectPlan {
    Done(SelectOutcome),
    Acquire {
        attempt: u64,
        release_first: Option<SlotId>,
    },
}

/// Drives one user's hold on a slot.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct LockClient {
    shared: Arc<Shared>,
}

impl LockClient {
    pub fn new(api: Arc<dyn LockApi>, config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                inner: Mutex::new(Inner::default()),
                events,
            }),
        }
    }

    /// Subscribe to lock events.
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> LockPhase {
        self.shared.inner().lock.phase
    }

    pub fn held_slot(&self) -> Option<SlotId> {
        self.shared.inner().lock.held_slot()
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Try to hold `slot_id`, giving up any other slot first.
    pub async fn select_slot(&self, slot_id: SlotId) -> SelectOutcome {
        let plan = self.plan_select(slot_id);
        let (attempt, release_first) = match plan {
            SelectPlan::Done(outcome) => return outcome,
            SelectPlan::Acquire {
                attempt,
                release_first,
            } => (attempt, release_first),
        };

        if let Some(previous) = release_first {
            self.release_on_server(previous).await;
            self.shared.emit(LockEvent::Released { slot_id: previous });
        }

        let sent_at = Instant::now();
        let result = self.shared.api.acquire(slot_id).await;

        let orphaned = {
            let mut inner = self.shared.inner();
            if inner.lock.is_current(attempt) {
                return self.apply_acquire(&mut inner, slot_id, attempt, sent_at, result);
            }
            // A grant nobody is waiting for any more. Give it back unless a
            // newer attempt is already working on the same slot.
            let slot_in_use = matches!(
                inner.lock.phase,
                LockPhase::Acquiring { slot_id: s, .. } | LockPhase::Held { slot_id: s, .. } if s == slot_id
            );
            matches!(result, Ok(AcquireOutcome::Granted { .. })) && !slot_in_use
        };

        if orphaned {
            tracing::debug!(slot_id, "Releasing grant that arrived after the client moved on");
            self.release_on_server(slot_id).await;
        }
        SelectOutcome::Superseded
    }

    fn plan_select(&self, slot_id: SlotId) -> SelectPlan {
        let mut inner = self.shared.inner();

        match inner.lock.phase {
            LockPhase::Held {
                slot_id: held,
                expires_at,
                ..
            } if held == slot_id => {
                let expires_in = remaining_secs(expires_at, Instant::now());
                if expires_in > 0 {
                    self.shared.emit(LockEvent::Acquired {
                        slot_id,
                        expires_in,
                    });
                    return SelectPlan::Done(SelectOutcome::Held { expires_in });
                }
            }
            LockPhase::Acquiring {
                slot_id: pending, ..
            } if pending == slot_id => {
                return SelectPlan::Done(SelectOutcome::Superseded);
            }
            _ => {}
        }

        let release_first = inner.clear_hold().filter(|previous| *previous != slot_id);
        let attempt = inner.lock.next_generation();
        inner.lock.phase = LockPhase::Acquiring { slot_id, attempt };

        SelectPlan::Acquire {
            attempt,
            release_first,
        }
    }

    fn apply_acquire(
        &self,
        inner: &mut Inner,
        slot_id: SlotId,
        attempt: u64,
        sent_at: Instant,
        result: Result<AcquireOutcome, LockApiError>,
    ) -> SelectOutcome {
        match result {
            Ok(AcquireOutcome::Granted { expires_in }) => {
                let Some(expires_at) = grant_deadline(sent_at, expires_in) else {
                    inner.lock.phase = LockPhase::Idle;

                    tracing::warn!(slot_id, expires_in, "Server granted an out-of-range hold, giving it back");
                    self.release_in_background(slot_id);
                    self.shared.emit(LockEvent::AcquireFailed {
                        slot_id,
                        message: ACQUIRE_FAILED_MESSAGE.to_string(),
                    });
                    return SelectOutcome::Failed;
                };
                inner.lock.phase = LockPhase::Held {
                    slot_id,
                    expires_at,
                    hold_id: attempt,
                };
                inner.countdown = Some(self.start_countdown(slot_id, expires_at, attempt));

                tracing::info!(slot_id, expires_in, "Slot held");
                self.shared.emit(LockEvent::Acquired {
                    slot_id,
                    expires_in,
                });
                SelectOutcome::Held { expires_in }
            }
            Ok(AcquireOutcome::Denied { expires_in }) => {
                inner.lock.phase = LockPhase::Idle;

                tracing::debug!(slot_id, retry_in = expires_in, "Slot held by another user");
                self.shared.emit(LockEvent::Denied {
                    slot_id,
                    retry_in: expires_in,
                });
                self.clear_denial_later(slot_id);
                SelectOutcome::Denied {
                    retry_in: expires_in,
                }
            }
            Err(e) => {
                inner.lock.phase = LockPhase::Idle;

                tracing::warn!(slot_id, error = %e, "Slot acquire failed");
                self.shared.emit(LockEvent::AcquireFailed {
                    slot_id,
                    message: ACQUIRE_FAILED_MESSAGE.to_string(),
                });
                SelectOutcome::Failed
            }
        }
    }

    fn start_countdown(&self, slot_id: SlotId, expires_at: Instant, hold_id: u64) -> Countdown {
        let on_tick = {
            let shared = Arc::downgrade(&self.shared);
            move |remaining_secs: u64| {
                let Some(shared) = shared.upgrade() else { return };
                if is_holding(&shared.inner().lock, hold_id) {
                    shared.emit(LockEvent::Tick {
                        slot_id,
                        remaining_secs,
                    });
                }
            }
        };
        let on_expire = {
            let shared = Arc::downgrade(&self.shared);
            move || expire_hold(&shared, slot_id, hold_id)
        };

        Countdown::start(expires_at, self.shared.config.tick_interval, on_tick, on_expire)
    }

    fn clear_denial_later(&self, slot_id: SlotId) {
        let shared = Arc::downgrade(&self.shared);
        let notice = self.shared.config.denied_notice;
        tokio::spawn(async move {
            tokio::time::sleep(notice).await;
            if let Some(shared) = shared.upgrade() {
                shared.emit(LockEvent::DenialCleared { slot_id });
            }
        });
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Give up the current hold.
    ///
    /// Local state is cleared whether or not the server call succeeds; the
    /// server TTL reclaims the slot if it does not. Returns the released slot.
    pub async fn release(&self) -> Option<SlotId> {
        let held = self.shared.inner().clear_hold();
        let slot_id = held?;

        self.release_on_server(slot_id).await;
        tracing::info!(slot_id, "Slot released");
        self.shared.emit(LockEvent::Released { slot_id });
        Some(slot_id)
    }

    /// Page-unload release: fire a beacon and forget about it.
    ///
    /// Never waits on the network.
    pub fn unload(&self) {
        let held = {
            let mut inner = self.shared.inner();
            if let Some(poller) = inner.poller.take() {
                poller.cancel.cancel();
            }
            inner.clear_hold()
        };

        if let Some(slot_id) = held {
            tracing::debug!(slot_id, "Sending unload release");
            self.shared.api.release_beacon(slot_id);
        }
    }

    /// Stop polling and give up any hold.
    pub async fn shutdown(&self) {
        self.stop_polling();
        self.release().await;
    }

    fn release_in_background(&self, slot_id: SlotId) {
        let api = Arc::clone(&self.shared.api);
        tokio::spawn(async move {
            if let Err(e) = api.release(slot_id).await {
                tracing::debug!(slot_id, error = %e, "Slot release failed, TTL will reclaim it");
            }
        });
    }

    async fn release_on_server(&self, slot_id: SlotId) {
        if let Err(e) = self.shared.api.release(slot_id).await {
            tracing::debug!(slot_id, error = %e, "Slot release failed, TTL will reclaim it");
        }
    }

    // -----------------------------------------------------------------------
    // Peer polling
    // -----------------------------------------------------------------------

    /// Start refreshing badges for `visible` slots. If polling is already
    /// running, only the visible set is replaced.
    pub fn start_polling(&self, visible: impl IntoIterator<Item = SlotId>) {
        let visible: BTreeSet<SlotId> = visible.into_iter().collect();
        let mut inner = self.shared.inner();

        if let Some(poller) = &inner.poller {
            poller.visible.send_replace(visible);
            return;
        }

        let (visible_tx, visible_rx) = watch::channel(visible);
        let cancel = CancellationToken::new();

        let on_badges = {
            let shared = Arc::downgrade(&self.shared);
            move |badges: BTreeMap<SlotId, SlotBadge>| {
                if let Some(shared) = shared.upgrade() {
                    shared.emit(LockEvent::PeerStatus { badges });
                }
            }
        };
        tokio::spawn(poller::run(
            Arc::clone(&self.shared.api),
            visible_rx,
            self.shared.config.poll_interval,
            cancel.clone(),
            on_badges,
        ));

        inner.poller = Some(PollerHandle {
            cancel,
            visible: visible_tx,
        });
    }

    /// Replace the set of slots the poller asks about.
    pub fn set_visible_slots(&self, visible: impl IntoIterator<Item = SlotId>) {
        let inner = self.shared.inner();
        if let Some(poller) = &inner.poller {
            poller.visible.send_replace(visible.into_iter().collect());
        }
    }

    pub fn stop_polling(&self) {
        if let Some(poller) = self.shared.inner().poller.take() {
            poller.cancel.cancel();
        }
    }
}

/// Local deadline for a grant of `expires_in` seconds requested at `sent_at`.
///
/// `None` when the grant is zero or longer than any TTL the server accepts.
fn grant_deadline(sent_at: Instant, expires_in: u64) -> Option<Instant> {
    if expires_in == 0 || expires_in > MAX_LOCK_TTL_SECS {
        return None;
    }
    sent_at.checked_add(Duration::from_secs(expires_in))
}

fn is_holding(state: &ClientLockState, hold_id: u64) -> bool {
    matches!(state.phase, LockPhase::Held { hold_id: id, .. } if id == hold_id)
}

fn expire_hold(shared: &Weak<Shared>, slot_id: SlotId, hold_id: u64) {
    let Some(shared) = shared.upgrade() else { return };
    {
        let mut inner = shared.inner();
        if !is_holding(&inner.lock, hold_id) {
            return;
        }
        inner.clear_hold();
        inner.lock.phase = LockPhase::Expired { slot_id };
    }

    tracing::info!(slot_id, "Slot hold expired");
    shared.emit(LockEvent::Expired { slot_id });
}
