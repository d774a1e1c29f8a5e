//! # Callback Handles
//!
//! Host callables never cross the boundary. The host registers them in a
//! [`HandleTable`] and passes the resulting integer; the bridge only ever
//! carries that integer, normalized into a [`CallbackHandle`].

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::constants::NO_RESPONSE_HANDLER;

/// Positive identifier of a registered host completion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(i64);

impl HandlerId {
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the caller wants to hear back about an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackHandle {
    /// Fire-and-forget.
    NoResponse,
    Await(HandlerId),
}

impl CallbackHandle {
    /// Any non-positive raw value means no response.
    pub fn from_raw(raw: i64) -> Self {
        match HandlerId::new(raw) {
            Some(id) => CallbackHandle::Await(id),
            None => CallbackHandle::NoResponse,
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            CallbackHandle::NoResponse => NO_RESPONSE_HANDLER,
            CallbackHandle::Await(id) => id.get(),
        }
    }

    pub fn handler(self) -> Option<HandlerId> {
        match self {
            CallbackHandle::NoResponse => None,
            CallbackHandle::Await(id) => Some(id),
        }
    }
}

/// Concurrent table mapping positive integers to host-side values.
///
/// Each registered value is handed out at most once by
/// [`load_and_delete`](HandleTable::load_and_delete).
pub struct HandleTable<T> {
    next_id: AtomicI64,
    entries: DashMap<i64, T>,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, value: T) -> HandlerId {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(raw, value);
        HandlerId(raw)
    }

    pub fn load_and_delete(&self, id: HandlerId) -> Option<T> {
        self.entries.remove(&id.get()).map(|(_, value)| value)
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.entries.contains_key(&id.get())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("registered", &self.entries.len())
            .finish()
    }
}
