//! Local view of the client's hold.

use slotlock_core::types::SlotId;
use tokio::time::Instant;

/// Where the client is in the hold lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPhase {
    #[default]
    Idle,
    /// An acquire request for `slot_id` is in flight.
    Acquiring { slot_id: SlotId, attempt: u64 },
    /// The server granted the slot.
    ///
    /// `expires_at` is measured from when the acquire request was sent, so
    /// it never falls after the server's own expiry.
    Held {
        slot_id: SlotId,
        expires_at: Instant,
        hold_id: u64,
    },
    /// The countdown reached zero. The user has to select again.
    Expired { slot_id: SlotId },
}

/// Mutable client state behind the [`LockClient`](crate::client::LockClient)
/// mutex.
///
/// `generation` increases on every transition that invalidates outstanding
/// work (an in-flight acquire, a running countdown). Work started under an
/// older generation must not touch the state.
#[derive(Debug, Default)]
pub struct ClientLockState {
    pub phase: LockPhase,
    generation: u64,
}

impl ClientLockState {
    pub fn held_slot(&self) -> Option<SlotId> {
        match self.phase {
            LockPhase::Held { slot_id, .. } => Some(slot_id),
            _ => None,
        }
    }

    /// Start a new generation and return its id.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Forget the current hold and invalidate outstanding work.
    ///
    /// Returns the slot that was held, if any.
    pub fn clear(&mut self) -> Option<SlotId> {
        let held = self.held_slot();
        self.phase = LockPhase::Idle;
        self.next_generation();
        held
    }
}

/// What [`select_slot`](crate::client::LockClient::select_slot) ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Held { expires_in: u64 },
    Denied { retry_in: u64 },
    /// Network or server failure; nothing is held.
    Failed,
    /// The client was released or moved on while the request was in flight.
    Superseded,
}
