//! Per-timer serialization tokens.
//!
//! At most one operation may hold the lease for a timer id; a second caller
//! is turned away with `Busy` instead of queueing. Leases for different ids
//! never contend beyond the brief set insert/remove.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{EngineError, Result};
use crate::timer::TimerId;

#[derive(Clone, Default)]
pub struct TimerLeases {
    held: Arc<Mutex<HashSet<TimerId>>>,
}

impl TimerLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lease on `id`, or fails with `Busy` if another caller holds it.
    pub fn try_acquire(&self, id: TimerId) -> Result<TimerLease> {
        if !self.lock().insert(id) {
            return Err(EngineError::Busy(id));
        }
        Ok(TimerLease {
            id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, id: TimerId) -> bool {
        self.lock().contains(&id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<TimerId>> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Released on drop, including when the owning future is dropped mid-await.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct TimerLease {
    id: TimerId,
    held: Arc<Mutex<HashSet<TimerId>>>,
}

impl TimerLease {
    pub fn id(&self) -> TimerId {
        self.id
    }
}

impl Drop for TimerLease {
    fn drop(&mut self) {
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.id);
    }
}
