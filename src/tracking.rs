//! Identifier generation and in-flight notification tracking.
//!
//! The gateway reports errors with nothing but a numeric identifier, so
//! every dispatched notification is tracked in a fixed-capacity table
//! indexed by its identifier until the slot is recycled. Identifier
//! wraparound combined with an arbitrarily delayed error report can
//! misattribute an error to a newer notification reusing the same slot;
//! the protocol offers no way to close that window, so the table only
//! ever answers for the current occupant.

use std::sync::Mutex;

use crate::notification::Notification;
use crate::{IDENTIFIER_MAX, IDENTIFIER_MIN};

/// Produces unique, cyclically reused identifiers for outbound
/// notifications
///
/// Values stay within `IDENTIFIER_MIN..=IDENTIFIER_MAX`; zero is never
/// produced so an empty correlation slot is distinguishable from
/// "identifier 0 in flight". The increment is lock-protected, giving
/// single-writer semantics even under concurrent callers.
pub struct IdentifierGenerator {
    counter: Mutex<u32>,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        Self {
            counter: Mutex::new(IDENTIFIER_MIN - 1),
        }
    }

    /// Next identifier, wrapping back to the low bound past the high bound
    pub fn next(&self) -> u32 {
        let mut counter = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        *counter = if *counter >= IDENTIFIER_MAX {
            IDENTIFIER_MIN
        } else {
            *counter + 1
        };
        *counter
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps identifiers to the most recent in-flight notification using them
///
/// One slot per possible identifier value, direct-indexed, with
/// overwrite-on-reuse as the only eviction policy. The dispatcher writes
/// slots while the feedback listener reads and removes them, so each slot
/// carries its own lock.
pub struct CorrelationTable {
    slots: Vec<Mutex<Option<Notification>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(IDENTIFIER_MAX as usize + 1);
        slots.resize_with(IDENTIFIER_MAX as usize + 1, || Mutex::new(None));
        Self { slots }
    }

    /// Store a notification under its assigned identifier, replacing any
    /// stale occupant
    pub fn insert(&self, notification: Notification) {
        let identifier = notification.identifier();
        if let Some(slot) = self.slots.get(identifier as usize) {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(notification);
        }
    }

    /// Snapshot the current occupant of a slot, if any
    ///
    /// Identifiers outside the generator's range (the gateway is free to
    /// send garbage) resolve to `None`.
    pub fn get(&self, identifier: u32) -> Option<Notification> {
        self.slots
            .get(identifier as usize)?
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove and return the current occupant of a slot
    ///
    /// Used by the feedback listener to attribute an error report; taking
    /// the notification out guarantees the same report is published at
    /// most once.
    pub fn take(&self, identifier: u32) -> Option<Notification> {
        self.slots
            .get(identifier as usize)?
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}
