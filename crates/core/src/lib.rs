//! Domain core for slot reservation locks.
//!
//! Holds the lock types and wire contract shared by the server and the
//! client, the [`LockStore`](lock_store::LockStore) seam, and the in-memory
//! store used by default and in tests. Kept free of HTTP and database
//! concerns so every other crate can depend on it.

pub mod clock;
pub mod error;
pub mod lock_store;
pub mod memory_store;
pub mod slot_lock;
pub mod types;
