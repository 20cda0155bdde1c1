//! Request pacing shared by clones of a Jira client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Hands out request slots at least `cooldown` apart, in call order.
///
/// Callers reserve a slot and then sleep until it arrives, so nothing is
/// locked while a request waits its turn.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits for this caller's slot. Returns how long it was held back.
    pub async fn hit(&self) -> Duration {
        if self.cooldown.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let slot = {
            let mut next = match self.next_slot.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let slot = next.map_or(now, |reserved| reserved.max(now));
            *next = Some(slot + self.cooldown);
            slot
        };

        let waited = slot.saturating_duration_since(now);
        if !waited.is_zero() {
            tracing::trace!(?waited, "pacing jira request");
            sleep_until(slot).await;
        }
        waited
    }
}
