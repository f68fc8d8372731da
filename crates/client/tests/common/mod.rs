#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slotlock_client::api::{LockApi, LockApiError};
use slotlock_client::client::LockClient;
use slotlock_client::config::ClientConfig;
use slotlock_client::events::LockEvent;
use slotlock_core::lock_store::LockStore;
use slotlock_core::memory_store::MemoryLockStore;
use slotlock_core::slot_lock::{AcquireOutcome, HolderToken, SlotLockStatus};
use slotlock_core::types::SlotId;
use tokio::sync::broadcast;

/// A call the client made through [`FakeLockApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Acquire(SlotId),
    Release(SlotId),
    Beacon(SlotId),
    Status,
}

/// In-process stand-in for the HTTP API, backed by a real memory store so
/// several fakes can contend for the same slots.
pub struct FakeLockApi {
    store: Arc<MemoryLockStore>,
    holder: HolderToken,
    calls: Mutex<Vec<Call>>,
    fail_acquire: AtomicBool,
    fail_release: AtomicBool,
    fail_status: AtomicBool,
    acquire_delay: Mutex<Option<Duration>>,
    forced_grant: Mutex<Option<u64>>,
}

impl FakeLockApi {
    pub fn new(store: Arc<MemoryLockStore>, holder: &str) -> Self {
        Self {
            store,
            holder: HolderToken::parse(holder).unwrap(),
            calls: Mutex::new(Vec::new()),
            fail_acquire: AtomicBool::new(false),
            fail_release: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            acquire_delay: Mutex::new(None),
            forced_grant: Mutex::new(None),
        }
    }

    pub fn holder(&self) -> &HolderToken {
        &self.holder
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn delay_acquire(&self, delay: Duration) {
        *self.acquire_delay.lock().unwrap() = Some(delay);
    }

    /// Answer every acquire with a grant of `expires_in` seconds, bypassing
    /// the store. `None` goes back to the store.
    pub fn force_grant(&self, expires_in: Option<u64>) {
        *self.forced_grant.lock().unwrap() = expires_in;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable() -> LockApiError {
        LockApiError::ApiError {
            status: 503,
            body: "store unavailable".into(),
        }
    }
}

#[async_trait]
impl LockApi for FakeLockApi {
    async fn acquire(&self, slot_id: SlotId) -> Result<AcquireOutcome, LockApiError> {
        self.record(Call::Acquire(slot_id));
        let delay = *self.acquire_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let forced = *self.forced_grant.lock().unwrap();
        if let Some(expires_in) = forced {
            return Ok(AcquireOutcome::Granted { expires_in });
        }
        Ok(self.store.acquire(slot_id, &self.holder).await.unwrap())
    }

    async fn release(&self, slot_id: SlotId) -> Result<(), LockApiError> {
        self.record(Call::Release(slot_id));
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.store.release(slot_id, &self.holder).await.unwrap();
        Ok(())
    }

    fn release_beacon(&self, slot_id: SlotId) {
        self.record(Call::Beacon(slot_id));
        let store = Arc::clone(&self.store);
        let holder = self.holder.clone();
        tokio::spawn(async move {
            let _ = store.release(slot_id, &holder).await;
        });
    }

    async fn status(
        &self,
        slot_ids: &[SlotId],
    ) -> Result<BTreeMap<SlotId, SlotLockStatus>, LockApiError> {
        self.record(Call::Status);
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.store.status(slot_ids, &self.holder).await.unwrap())
    }
}

/// A client and its fake transport over a shared store.
pub struct TestClient {
    pub client: LockClient,
    pub api: Arc<FakeLockApi>,
    pub events: broadcast::Receiver<LockEvent>,
}

pub fn shared_store() -> Arc<MemoryLockStore> {
    Arc::new(MemoryLockStore::new(60))
}

pub fn test_client(store: &Arc<MemoryLockStore>, holder: &str) -> TestClient {
    let api = Arc::new(FakeLockApi::new(Arc::clone(store), holder));
    let client = LockClient::new(api.clone(), ClientConfig::default());
    let events = client.subscribe();
    TestClient {
        client,
        api,
        events,
    }
}

/// Everything already published, without waiting.
pub fn drain(events: &mut broadcast::Receiver<LockEvent>) -> Vec<LockEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Wait (in virtual time) for the first event matching `pred`, collecting
/// everything received on the way.
pub async fn wait_for(
    events: &mut broadcast::Receiver<LockEvent>,
    within: Duration,
    pred: impl Fn(&LockEvent) -> bool,
) -> Vec<LockEvent> {
    let mut seen = Vec::new();
    let found = tokio::time::timeout(within, async {
        loop {
            let event = events.recv().await.unwrap();
            let done = pred(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    if found.is_err() {
        panic!("no matching event within {within:?}, saw {seen:?}");
    }
    seen
}
