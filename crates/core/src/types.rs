/// Slot identifiers mirror the host application's BIGSERIAL keys.
pub type SlotId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
