//! Slot lock constants, types, wire contract, and validation.
//!
//! This module lives in `core` (zero internal deps) so that the lock stores,
//! the HTTP handlers, and the client state machine all agree on lock
//! durations, holder token rules, and the JSON shapes exchanged over HTTP.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{SlotId, Timestamp};

// ---------------------------------------------------------------------------
// Lock duration constants
// ---------------------------------------------------------------------------

/// Default lock time-to-live in seconds.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 60;

/// Minimum configurable TTL in seconds.
pub const MIN_LOCK_TTL_SECS: u64 = 5;

/// Maximum configurable TTL in seconds (1 hour).
pub const MAX_LOCK_TTL_SECS: u64 = 3600;

/// How often the expired-lock sweeper runs by default (in seconds).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default client poll interval for peer lock status (in seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Maximum number of slot ids accepted by one status query.
pub const MAX_STATUS_SLOTS: usize = 500;

/// Error string returned to a contending acquirer.
pub const LOCKED_ERROR: &str = "locked";

/// Maximum holder token length.
pub const MAX_HOLDER_TOKEN_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Holder token
// ---------------------------------------------------------------------------

/// Opaque identity of the session that acquires locks.
///
/// Tokens are restricted to `[A-Za-z0-9_-]` so they are safe in headers,
/// cookies, and log fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HolderToken(String);

impl HolderToken {
    /// Validate and wrap a raw token.
    pub fn parse(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        validate_holder_token(&raw)?;
        Ok(Self(raw))
    }

    /// Issue a fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HolderToken {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<HolderToken> for String {
    fn from(token: HolderToken) -> Self {
        token.0
    }
}

// ---------------------------------------------------------------------------
// SlotLock
// ---------------------------------------------------------------------------

/// A temporary exclusive claim on one slot.
///
/// Liveness is derived from `expires_at` at read time and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLock {
    pub slot_id: SlotId,
    pub holder_token: HolderToken,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl SlotLock {
    /// Build a lock granted at `now` for `ttl_secs` seconds.
    pub fn granted(slot_id: SlotId, holder_token: HolderToken, now: Timestamp, ttl_secs: u64) -> Self {
        Self {
            slot_id,
            holder_token,
            acquired_at: now,
            expires_at: now + ttl_duration(ttl_secs),
        }
    }

    pub fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    pub fn is_held_by(&self, holder: &HolderToken) -> bool {
        &self.holder_token == holder
    }

    /// Whole seconds left before expiry, rounded up. Zero once expired.
    pub fn expires_in(&self, now: Timestamp) -> u64 {
        secs_until(self.expires_at, now)
    }
}

/// Convert a TTL in seconds into a chrono duration.
pub fn ttl_duration(ttl_secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000))
}

/// Seconds from `now` until `deadline`, rounded up and floored at zero.
pub fn secs_until(deadline: Timestamp, now: Timestamp) -> u64 {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    u64::try_from(millis).map_or(0, |ms| ms.div_ceil(1000))
}

// ---------------------------------------------------------------------------
// Store results
// ---------------------------------------------------------------------------

/// Result of an acquire attempt.
///
/// Contention is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the slot for `expires_in` seconds.
    Granted { expires_in: u64 },
    /// Another holder has the slot; it frees up in about `expires_in` seconds.
    Denied { expires_in: u64 },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }

    pub fn expires_in(&self) -> u64 {
        match self {
            AcquireOutcome::Granted { expires_in } | AcquireOutcome::Denied { expires_in } => {
                *expires_in
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire contract
// ---------------------------------------------------------------------------

/// Body of `POST /slots/{slot_id}/lock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireResponse {
    pub success: bool,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<AcquireOutcome> for AcquireResponse {
    fn from(outcome: AcquireOutcome) -> Self {
        match outcome {
            AcquireOutcome::Granted { expires_in } => Self {
                success: true,
                expires_in,
                error: None,
            },
            AcquireOutcome::Denied { expires_in } => Self {
                success: false,
                expires_in,
                error: Some(LOCKED_ERROR.to_string()),
            },
        }
    }
}

impl From<AcquireResponse> for AcquireOutcome {
    fn from(response: AcquireResponse) -> Self {
        if response.success {
            AcquireOutcome::Granted {
                expires_in: response.expires_in,
            }
        } else {
            AcquireOutcome::Denied {
                expires_in: response.expires_in,
            }
        }
    }
}

/// Per-slot entry in a bulk status response.
///
/// Never carries the holder's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLockStatus {
    pub locked: bool,
    pub locked_by_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl SlotLockStatus {
    pub const UNLOCKED: SlotLockStatus = SlotLockStatus {
        locked: false,
        locked_by_me: false,
        expires_in: None,
    };

    /// Status of `lock` as seen by `viewer` at `now`.
    pub fn observe(lock: Option<&SlotLock>, viewer: &HolderToken, now: Timestamp) -> Self {
        match lock {
            Some(lock) if lock.is_live(now) => Self {
                locked: true,
                locked_by_me: lock.is_held_by(viewer),
                expires_in: Some(lock.expires_in(now)),
            },
            _ => Self::UNLOCKED,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a slot id. Returns `Ok(())` or an error message.
pub fn validate_slot_id(slot_id: SlotId) -> Result<(), String> {
    if slot_id <= 0 {
        return Err(format!("slot_id must be positive, got {slot_id}"));
    }
    Ok(())
}

/// Validate a configured TTL in seconds.
pub fn validate_lock_ttl(ttl_secs: u64) -> Result<(), String> {
    if ttl_secs < MIN_LOCK_TTL_SECS {
        return Err(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_SECS} seconds, got {ttl_secs}"
        ));
    }
    if ttl_secs > MAX_LOCK_TTL_SECS {
        return Err(format!(
            "Lock TTL must be at most {MAX_LOCK_TTL_SECS} seconds, got {ttl_secs}"
        ));
    }
    Ok(())
}

pub fn validate_holder_token(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("holder token must not be empty".into());
    }
    if raw.len() > MAX_HOLDER_TOKEN_LEN {
        return Err(format!(
            "holder token must be at most {MAX_HOLDER_TOKEN_LEN} characters"
        ));
    }
    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("holder token may only contain letters, digits, '-' and '_'".into());
    }
    Ok(())
}

/// Parse a comma-separated `slot_ids` query value.
///
/// Blank input yields an empty list. Duplicates are kept; callers that build
/// maps collapse them naturally.
pub fn parse_slot_ids(raw: &str) -> Result<Vec<SlotId>, String> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let id: SlotId = s
                .parse()
                .map_err(|_| format!("Invalid slot id '{s}'"))?;
            validate_slot_id(id)?;
            Ok(id)
        })
        .collect::<Result<Vec<_>, String>>()?;

    if ids.len() > MAX_STATUS_SLOTS {
        return Err(format!(
            "At most {MAX_STATUS_SLOTS} slot ids may be queried at once, got {}",
            ids.len()
        ));
    }
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
