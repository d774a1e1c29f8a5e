//! # Completion Bridge
//!
//! A [`Completion`] is the callback context handed to an owner operation when
//! the host asked to hear back. Firing it translates the owner outcome into a
//! [`HostError`], delivers it to the [`HostSink`] and consumes the completion,
//! so each live handle is resolved exactly once.
//!
//! The dispatcher keeps a [`StartGuard`] on the same handle while the owner
//! operation is being started:
//!
//! - start failed: the guard delivers the start error, whatever the owner did
//!   with the completion in the meantime (unless it already fired it);
//! - started: a completion the owner dropped unfired delivers a `Generic`
//!   failure, now or whenever it is dropped later.
//!
//! A live handle is never resolved zero times nor twice.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ErrorCode, HostError, OwnerError};
use crate::handle::HandlerId;

/// Host-side receiver of completion notifications.
///
/// Called on the owner thread; implementations must not block for long.
pub trait HostSink: Send + Sync {
    fn deliver(&self, handler: HandlerId, error: HostError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Starting,
    DroppedWhileStarting,
    Started,
    Delivered,
}

struct CompletionState {
    handler: HandlerId,
    host: Arc<dyn HostSink>,
    phase: Mutex<Phase>,
}

impl CompletionState {
    /// Deliver unless something was delivered already.
    fn deliver_once(&self, error: HostError) -> bool {
        {
            let mut phase = self.phase.lock();
            if *phase == Phase::Delivered {
                return false;
            }
            *phase = Phase::Delivered;
        }
        self.host.deliver(self.handler, error);
        true
    }
}

fn dropped_unfired() -> HostError {
    HostError::new(
        ErrorCode::Generic,
        "operation was dropped before it completed",
    )
}

pub struct Completion {
    state: Arc<CompletionState>,
}

impl Completion {
    /// A completion for `handler` plus the dispatcher's guard on it.
    pub(crate) fn start(handler: HandlerId, host: Arc<dyn HostSink>) -> (Self, StartGuard) {
        let state = Arc::new(CompletionState {
            handler,
            host,
            phase: Mutex::new(Phase::Starting),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            StartGuard { state },
        )
    }

    pub fn handler(&self) -> HandlerId {
        self.state.handler
    }

    /// Report the operation outcome to the host. `None` means success.
    pub fn fire(self, error: Option<&OwnerError>) {
        let translated = HostError::from_owner(error);
        debug!(
            handler_id = %self.state.handler,
            code = translated.code.as_i32(),
            "Delivering completion to host"
        );
        if !self.state.deliver_once(translated) {
            warn!(
                handler_id = %self.state.handler,
                "Completion fired after its handle was already resolved"
            );
        }
    }

    pub fn succeed(self) {
        self.fire(None)
    }

    pub fn fail(self, error: &OwnerError) {
        self.fire(Some(error))
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let deliver = {
            let mut phase = self.state.phase.lock();
            match *phase {
                Phase::Starting => {
                    *phase = Phase::DroppedWhileStarting;
                    false
                }
                Phase::Started => true,
                Phase::DroppedWhileStarting | Phase::Delivered => false,
            }
        };
        if deliver {
            warn!(
                handler_id = %self.state.handler,
                "Completion dropped without being fired, delivering failure"
            );
            self.state.deliver_once(dropped_unfired());
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("handler", &self.state.handler)
            .field("phase", &*self.state.phase.lock())
            .finish()
    }
}

/// Dispatcher-side hold on a completion while its operation is starting.
pub(crate) struct StartGuard {
    state: Arc<CompletionState>,
}

impl StartGuard {
    /// The operation started; the completion now resolves the handle.
    pub(crate) fn started(self) {
        let dropped = {
            let mut phase = self.state.phase.lock();
            match *phase {
                Phase::Starting => {
                    *phase = Phase::Started;
                    false
                }
                Phase::DroppedWhileStarting => true,
                Phase::Started | Phase::Delivered => false,
            }
        };
        if dropped {
            warn!(
                handler_id = %self.state.handler,
                "Completion dropped during start without being fired, delivering failure"
            );
            self.state.deliver_once(dropped_unfired());
        }
    }

    /// The operation failed to start. Delivers `error` unless the owner already
    /// resolved the handle; returns whether it did.
    pub(crate) fn failed(self, error: &OwnerError) -> bool {
        self.state.deliver_once(HostError::from_owner(Some(error)))
    }
}
