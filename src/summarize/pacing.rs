//! Spacing between map-phase backend calls.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Keeps map calls at least `interval` apart.
///
/// A call may start once `interval` has passed since the previous call started and
/// since the previous call finished. The finish is recorded when the [`PacingPermit`]
/// returned by [`Pacer::acquire`] is dropped. A zero interval never waits.
pub struct Pacer {
    interval: Duration,
    ready_at: Mutex<Option<Instant>>,
}

/// Held for the duration of one paced call
#[must_use = "the call is only paced while the permit is held"]
pub struct PacingPermit<'a> {
    pacer: &'a Pacer,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ready_at: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call may start
    pub async fn acquire(&self) -> PacingPermit<'_> {
        if self.interval.is_zero() {
            return PacingPermit { pacer: self };
        }

        loop {
            let wait = {
                let mut ready_at = self.lock();
                let now = Instant::now();
                match *ready_at {
                    Some(at) if at > now => at - now,
                    _ => {
                        *ready_at = Some(now + self.interval);
                        return PacingPermit { pacer: self };
                    }
                }
            };

            tokio::time::sleep(wait).await;
        }
    }

    fn finished(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut ready_at = self.lock();
        let after_finish = Instant::now() + self.interval;
        if ready_at.map_or(true, |at| at < after_finish) {
            *ready_at = Some(after_finish);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.ready_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PacingPermit<'_> {
    fn drop(&mut self) {
        self.pacer.finished();
    }
}
