//! Monotonic request tokens.
//!
//! Two requests for different inputs may resolve out of order. Every request
//! takes a [`Ticket`] when it is issued, and its response is applied only if
//! no newer ticket was issued for the same logical operation in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identity of one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Issues increasing tickets for one logical operation.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket newer than every ticket issued before.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is still the newest one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// A value slot that only accepts the response to the newest request.
#[derive(Debug)]
pub struct Latest<T> {
    sequence: RequestSequence,
    value: Mutex<Option<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            sequence: RequestSequence::new(),
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every request started before.
    pub fn begin(&self) -> Ticket {
        self.sequence.issue()
    }

    /// Store `value` if `ticket` is still current. Returns whether it was stored.
    ///
    /// The check and the store happen under the same lock, so a superseded
    /// response can never land after the current one.
    pub fn apply(&self, ticket: Ticket, value: T) -> bool {
        let mut slot = self.value.lock().unwrap_or_else(|e| e.into_inner());
        if !self.sequence.is_current(ticket) {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// The last applied value.
    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
