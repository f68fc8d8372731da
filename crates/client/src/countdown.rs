//! Hold countdown.
//!
//! Two timers run side by side: a display interval that recomputes the
//! remaining time from the deadline on every tick, and a one-shot backstop
//! sleeping until the deadline itself. Whichever sees the deadline first
//! ends the countdown, so a delayed or skipped tick can never stretch a
//! hold past its expiry.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Whole seconds left until `deadline`, rounded up. Zero once it has passed.
pub fn remaining_secs(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    let secs = left.as_secs();
    if left.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// A running countdown. Dropping it stops both timers.
pub struct Countdown {
    _guard: DropGuard,
}

impl Countdown {
    /// Start counting down to `expires_at`.
    ///
    /// `on_tick` receives the remaining whole seconds (always above zero)
    /// every `tick_every`. `on_expire` runs once when the deadline is reached,
    /// unless the countdown was dropped first.
    pub fn start<T, E>(expires_at: Instant, tick_every: Duration, mut on_tick: T, on_expire: E) -> Self
    where
        T: FnMut(u64) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let stopped = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let backstop = tokio::time::sleep_until(expires_at);
            tokio::pin!(backstop);

            loop {
                tokio::select! {
                    biased;
                    _ = stopped.cancelled() => return,
                    _ = &mut backstop => break,
                    _ = ticker.tick() => {
                        let remaining = remaining_secs(expires_at, Instant::now());
                        if remaining == 0 {
                            break;
                        }
                        on_tick(remaining);
                    }
                }
            }

            if !stopped.is_cancelled() {
                on_expire();
            }
        });

        Self {
            _guard: cancel.drop_guard(),
        }
    }
}
