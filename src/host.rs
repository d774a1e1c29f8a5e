//! # Host Callback Registry
//!
//! Host-side half of the handle indirection. Host callables are parked in a
//! [`HandleTable`] and only their [`HandlerId`] crosses into the owner
//! runtime. Completions arrive on the owner thread, are forwarded over a
//! tokio channel, and a [`CallbackPump`] running on the host side loads and
//! deletes the callable before invoking it, so each callable runs at most
//! once and its handle is reclaimed when it does.
//!
//! ```text
//! owner thread                          host task
//! Completion::fire ─→ CallbackRegistry ─mpsc─→ CallbackPump::run
//!                       (HostSink)               load_and_delete(id)
//!                                                handler(result)
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::completion::HostSink;
use crate::error::HostError;
use crate::handle::{HandleTable, HandlerId};

/// Host callable invoked with the operation outcome.
pub type ErrorHandler = Box<dyn FnOnce(Result<(), HostError>) + Send + Sync>;

/// A completion waiting to be resolved on the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostNotification {
    pub handler: HandlerId,
    pub error: HostError,
}

pub struct CallbackRegistry {
    table: Arc<HandleTable<ErrorHandler>>,
    sender: mpsc::UnboundedSender<HostNotification>,
}

impl CallbackRegistry {
    /// Create a registry and the pump that resolves its notifications.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Arc<Self>, CallbackPump) {
        let table = Arc::new(HandleTable::new());
        let (sender, receiver) = mpsc::unbounded_channel();

        let registry = Arc::new(Self {
            table: Arc::clone(&table),
            sender,
        });
        (registry, CallbackPump { table, receiver })
    }

    pub fn register(&self, handler: ErrorHandler) -> HandlerId {
        self.table.insert(handler)
    }

    /// Reclaim a handle whose invocation never reached the owner runtime.
    pub fn forget(&self, id: HandlerId) -> bool {
        self.table.load_and_delete(id).is_some()
    }

    /// Number of handlers still waiting for a completion.
    pub fn pending(&self) -> usize {
        self.table.len()
    }
}

impl HostSink for CallbackRegistry {
    fn deliver(&self, handler: HandlerId, error: HostError) {
        let notification = HostNotification { handler, error };
        if let Err(err) = self.sender.send(notification) {
            warn!(
                handler_id = %handler,
                code = err.0.error.code.as_i32(),
                "Callback pump is gone, dropping host handler"
            );
            self.table.load_and_delete(handler);
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("pending", &self.table.len())
            .finish()
    }
}

/// Resolves completion notifications against the registered host callables.
pub struct CallbackPump {
    table: Arc<HandleTable<ErrorHandler>>,
    receiver: mpsc::UnboundedReceiver<HostNotification>,
}

impl CallbackPump {
    /// Resolve notifications until every registry sender is gone.
    /// Returns the number of notifications processed.
    pub async fn run(mut self) -> usize {
        let mut processed = 0;
        while let Some(notification) = self.receiver.recv().await {
            self.resolve(notification);
            processed += 1;
        }
        debug!(processed, "Callback pump finished");
        processed
    }

    /// Resolve whatever is already queued without waiting.
    pub fn try_drain(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(notification) = self.receiver.try_recv() {
            self.resolve(notification);
            processed += 1;
        }
        processed
    }

    fn resolve(&self, notification: HostNotification) {
        let HostNotification { handler, error } = notification;
        match self.table.load_and_delete(handler) {
            Some(callable) => callable(error.into_result()),
            None => warn!(
                handler_id = %handler,
                "No host handler registered for completion"
            ),
        }
    }
}

impl std::fmt::Debug for CallbackPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackPump")
            .field("pending", &self.table.len())
            .finish()
    }
}
