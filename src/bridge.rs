//! # Tester Bridge
//!
//! The session object host threads call into. Each entry point follows the
//! same sequence:
//!
//! ```text
//! entry point (any host thread)
//!     │ integrity check, normalize handle, validate payload
//!     │ session closed? ──→ Err(SessionClosed), payload stays with the caller
//!     │ move payload into InvocationContext
//!     ▼
//! OwnerProxy::notify(dispatch, discard, context)
//!     │ rejected ──→ retire context, Err(SubmissionFailed)
//!     ▼
//! owner thread: dispatch → TesterEnv operation → Completion → HostSink
//!           or, queued at shutdown: discard → SessionClosed → HostSink
//! ```
//!
//! The entry point never waits for the owner operation. Completion outcomes
//! only ever travel through the [`HostSink`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::completion::HostSink;
use crate::config::BridgeConfig;
use crate::constants::BRIDGE_SIGNATURE;
use crate::context::{InvocationContext, Retirement};
use crate::dispatcher::{discard, dispatch, OwnerBinding};
use crate::error::{BridgeError, Result};
use crate::handle::CallbackHandle;
use crate::logging::log_bridge_operation;
use crate::owner::{ProxiedOp, TesterEnv};
use crate::payload::HostMsg;
use crate::proxy::{OwnerProxy, ProxyControl, Rejected};

type Proxy<E> = OwnerProxy<OwnerBinding<E>>;

pub struct TesterBridge<E: TesterEnv> {
    /// Stamped at construction and checked on every entry point. Safe Rust
    /// cannot produce a mismatch; it trips when a host binding passes the
    /// bridge across the boundary as a raw pointer that is stale or was
    /// never a bridge.
    signature: u64,
    proxy: RwLock<Option<Arc<Proxy<E>>>>,
}

impl<E: TesterEnv> TesterBridge<E> {
    /// Spawn the owner thread, build the environment on it, and open the
    /// session. Completions are delivered to `host`.
    pub fn start<F>(config: &BridgeConfig, host: Arc<dyn HostSink>, factory: F) -> Result<Self>
    where
        F: FnOnce(ProxyControl) -> E + Send + 'static,
    {
        let proxy = OwnerProxy::spawn(config, move |control| OwnerBinding {
            env: factory(control.clone()),
            host,
            control,
        })?;

        info!(
            owner_thread = %config.owner_thread_name,
            queue_capacity = config.queue_capacity,
            "Tester bridge started"
        );

        Ok(Self {
            signature: BRIDGE_SIGNATURE,
            proxy: RwLock::new(Some(Arc::new(proxy))),
        })
    }

    /// Whether the session still carries its construction signature.
    /// A `false` here means memory corruption or a forged pointer on the
    /// host binding side.
    pub fn check_integrity(&self) -> bool {
        self.signature == BRIDGE_SIGNATURE
    }

    pub fn return_result(&self, result: &mut HostMsg, handler: i64) -> Result<()> {
        self.invoke(ProxiedOp::ReturnResult, result, handler)
    }

    pub fn send_data(&self, data: &mut HostMsg, handler: i64) -> Result<()> {
        self.invoke(ProxiedOp::SendData, data, handler)
    }

    pub fn send_audio_frame(&self, frame: &mut HostMsg, handler: i64) -> Result<()> {
        self.invoke(ProxiedOp::SendAudioFrame, frame, handler)
    }

    pub fn send_video_frame(&self, frame: &mut HostMsg, handler: i64) -> Result<()> {
        self.invoke(ProxiedOp::SendVideoFrame, frame, handler)
    }

    /// Submit `msg` to `op` on the owner thread.
    ///
    /// `handler` is the raw callback handle; non-positive values mean no
    /// completion is wanted. `Ok(())` only means the invocation was queued.
    /// On `SessionClosed` and `InvalidArgument` the message is left in
    /// `msg`; on every other outcome it has been moved out.
    pub fn invoke(&self, op: ProxiedOp, msg: &mut HostMsg, handler: i64) -> Result<()> {
        assert!(
            self.check_integrity(),
            "tester bridge failed its integrity check"
        );

        let callback = CallbackHandle::from_raw(handler);

        match msg.peek() {
            None => return Err(moved_payload(op)),
            Some(peeked) if !op.accepts(peeked) => {
                return Err(BridgeError::InvalidArgument(op.payload_mismatch(peeked)))
            }
            Some(_) => {}
        }

        let Some(proxy) = self.proxy() else {
            debug!(operation = %op, "Invocation refused, session closed");
            return Err(BridgeError::SessionClosed {
                operation: op.name(),
            });
        };

        let Some(payload) = msg.take() else {
            return Err(moved_payload(op));
        };
        let context = InvocationContext::new(op, payload, callback);
        let invocation_id = context.id();

        match proxy.notify(dispatch::<E>, discard::<E>, context) {
            Ok(()) => {
                debug!(
                    invocation_id = %invocation_id,
                    operation = %op,
                    handler_id = callback.as_raw(),
                    "Invocation submitted to owner"
                );
                Ok(())
            }
            Err(Rejected { error, context }) => {
                context.retire(Retirement::Rejected);
                warn!(
                    invocation_id = %invocation_id,
                    operation = %op,
                    handler_id = callback.as_raw(),
                    error = %error,
                    "Owner proxy rejected invocation"
                );
                Err(BridgeError::SubmissionFailed {
                    operation: op.name(),
                    source: error,
                })
            }
        }
    }

    /// Run a closure against the environment on the owner thread.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut E) + Send + 'static,
    {
        let proxy = self.proxy().ok_or(BridgeError::SessionClosed {
            operation: "execute",
        })?;
        proxy
            .execute(move |binding| f(&mut binding.env))
            .map_err(|source| BridgeError::SubmissionFailed {
                operation: "execute",
                source,
            })
    }

    /// Run a closure against the environment on the owner thread and wait
    /// for its result. Every invocation submitted earlier has been
    /// dispatched by the time this returns.
    pub fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut E) -> R + Send + 'static,
    {
        let proxy = self.proxy().ok_or(BridgeError::SessionClosed {
            operation: "call",
        })?;
        proxy
            .call(move |binding| f(&mut binding.env))
            .map_err(BridgeError::Call)
    }

    /// Whether the session has been closed from the host side.
    pub fn is_closed(&self) -> bool {
        self.proxy.read().is_none()
    }

    /// Close the session and stop the owner thread. Idempotent.
    pub fn close(&self) {
        let proxy = self.proxy.write().take();
        if let Some(proxy) = proxy {
            proxy.close();
            log_bridge_operation("close", None, "closed", None);
        }
    }

    fn proxy(&self) -> Option<Arc<Proxy<E>>> {
        self.proxy.read().clone()
    }
}

impl<E: TesterEnv> Drop for TesterBridge<E> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<E: TesterEnv> std::fmt::Debug for TesterBridge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesterBridge")
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn moved_payload(op: ProxiedOp) -> BridgeError {
    BridgeError::InvalidArgument(format!(
        "{}() requires a message that has not already been sent",
        op.name()
    ))
}
