pub mod session;
pub mod slot_locks;
