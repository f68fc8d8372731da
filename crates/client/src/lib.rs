//! Client side of slot reservation locks.
//!
//! [`LockClient`](client::LockClient) drives one page's hold on a slot:
//! acquire, a two-timer countdown, release, peer-status polling, and a
//! best-effort release on unload. The server stays the only authority; every
//! local timer and badge here is advisory.

pub mod api;
pub mod client;
pub mod config;
pub mod countdown;
pub mod events;
pub mod poller;
pub mod state;
