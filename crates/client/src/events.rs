//! Events published by [`LockClient`](crate::client::LockClient).
//!
//! Subscribers (a UI layer, the demo binary, tests) receive these over a
//! `tokio::sync::broadcast` channel and render them however they like.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotlock_core::slot_lock::SlotLockStatus;
use slotlock_core::types::SlotId;

/// Shown when an acquire attempt fails for a reason other than contention.
pub const ACQUIRE_FAILED_MESSAGE: &str = "Could not reserve this slot, please try again";

/// Default capacity of the client event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// LockEvent
// ---------------------------------------------------------------------------

/// Something the user should see about their hold or their peers' holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockEvent {
    /// The slot is now held; the downstream form may be shown.
    Acquired { slot_id: SlotId, expires_in: u64 },
    /// Someone else holds the slot.
    Denied { slot_id: SlotId, retry_in: u64 },
    /// The denial notice for `slot_id` should be hidden.
    DenialCleared { slot_id: SlotId },
    /// The acquire request did not complete.
    AcquireFailed { slot_id: SlotId, message: String },
    /// Countdown refresh. Never negative.
    Tick { slot_id: SlotId, remaining_secs: u64 },
    /// The hold ran out; the user must select again.
    Expired { slot_id: SlotId },
    /// The hold was given up by the user.
    Released { slot_id: SlotId },
    /// Fresh badges for the visible slots.
    PeerStatus { badges: BTreeMap<SlotId, SlotBadge> },
}

impl LockEvent {
    /// The slot this event is about, if it is about a single slot.
    pub fn slot_id(&self) -> Option<SlotId> {
        match self {
            LockEvent::Acquired { slot_id, .. }
            | LockEvent::Denied { slot_id, .. }
            | LockEvent::DenialCleared { slot_id }
            | LockEvent::AcquireFailed { slot_id, .. }
            | LockEvent::Tick { slot_id, .. }
            | LockEvent::Expired { slot_id }
            | LockEvent::Released { slot_id } => Some(*slot_id),
            LockEvent::PeerStatus { .. } => None,
        }
    }

    /// User-facing notice text, for events that carry one.
    pub fn notice(&self) -> Option<String> {
        match self {
            LockEvent::Denied { retry_in, .. } => Some(format!(
                "Held by another user, available in ~{retry_in}s"
            )),
            LockEvent::AcquireFailed { message, .. } => Some(message.clone()),
            LockEvent::Expired { .. } => {
                Some("Your hold on this slot expired, please select it again".to_string())
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SlotBadge
// ---------------------------------------------------------------------------

/// Advisory marker for a slot in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotBadge {
    Available,
    HeldByMe,
    HeldByOther { expires_in: Option<u64> },
}

impl SlotBadge {
    pub fn from_status(status: &SlotLockStatus) -> Self {
        match status {
            SlotLockStatus { locked: false, .. } => SlotBadge::Available,
            SlotLockStatus {
                locked_by_me: true, ..
            } => SlotBadge::HeldByMe,
            SlotLockStatus { expires_in, .. } => SlotBadge::HeldByOther {
                expires_in: *expires_in,
            },
        }
    }

    /// Badge text; `None` means no badge.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            SlotBadge::HeldByOther { .. } => Some("Held"),
            SlotBadge::Available | SlotBadge::HeldByMe => None,
        }
    }

    /// Whether selecting the slot is worth trying. The server still decides.
    pub fn is_selectable(&self) -> bool {
        !matches!(self, SlotBadge::HeldByOther { .. })
    }
}
