use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::foundation::error::{NewsreelError, NewsreelResult};

/// Caps the number of renders in flight. Fails fast instead of queueing.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    limit: usize,
    in_flight: Arc<AtomicUsize>,
}

impl AdmissionGate {
    /// Gate admitting at most `limit` concurrent runs.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Take a slot, or fail with `ResourceExhausted` when all are taken.
    pub fn try_acquire(&self) -> NewsreelResult<AdmissionPermit> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.limit {
                return Err(NewsreelError::exhausted(format!(
                    "{current} renders in flight (limit {})",
                    self.limit
                )));
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(AdmissionPermit {
                        in_flight: Arc::clone(&self.in_flight),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Runs currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Slot held for the lifetime of one run; released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/admission.rs"]
mod tests;
