//! Timestamped readings for callers that want to avoid re-reading registers.
//!
//! Facades always hit the bus. Reuse of an earlier reading is the caller's
//! choice, made explicit through [`ObservedCache`].

use std::time::{Duration, Instant};

/// A value together with the moment it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<T> {
    value: T,
    at: Instant,
}

impl<T> Observed<T> {
    pub fn now(value: T) -> Self {
        Self {
            value,
            at: Instant::now(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn age(&self) -> Duration {
        self.at.elapsed()
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() <= max_age
    }
}

/// Caller-owned slot holding the last reading of one quantity.
#[derive(Debug)]
pub struct ObservedCache<T> {
    max_age: Duration,
    slot: Option<Observed<T>>,
}

impl<T> ObservedCache<T> {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age, slot: None }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Last reading, whatever its age.
    pub fn last(&self) -> Option<&Observed<T>> {
        self.slot.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Return the cached reading if still fresh, otherwise read again.
    ///
    /// A failed read leaves the previous reading in place.
    pub fn get_or_refresh<E>(
        &mut self,
        read: impl FnOnce() -> Result<T, E>,
    ) -> Result<&Observed<T>, E> {
        let observed = match self.slot.take() {
            Some(observed) if observed.is_fresh(self.max_age) => observed,
            previous => match read() {
                Ok(value) => Observed::now(value),
                Err(e) => {
                    self.slot = previous;
                    return Err(e);
                }
            },
        };
        Ok(&*self.slot.insert(observed))
    }
}
