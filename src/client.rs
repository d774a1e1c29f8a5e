//! # Tester Client
//!
//! Host-facing wrapper pairing a [`TesterBridge`] with a [`CallbackRegistry`].
//! Callers pass closures instead of raw handles; the client registers them,
//! hands the handle to the bridge, and reclaims it again when the bridge
//! refuses the invocation synchronously.

use std::sync::Arc;

use tracing::debug;

use crate::bridge::TesterBridge;
use crate::completion::HostSink;
use crate::config::BridgeConfig;
use crate::constants::NO_RESPONSE_HANDLER;
use crate::error::Result;
use crate::host::{CallbackPump, CallbackRegistry, ErrorHandler};
use crate::logging::init_structured_logging;
use crate::owner::{ProxiedOp, TesterEnv};
use crate::payload::HostMsg;
use crate::proxy::ProxyControl;

pub struct TesterClient<E: TesterEnv> {
    bridge: Arc<TesterBridge<E>>,
    callbacks: Arc<CallbackRegistry>,
}

impl<E: TesterEnv> TesterClient<E> {
    /// Start a session. The returned pump must be driven (usually with
    /// `tokio::spawn(pump.run())`) for handlers to run.
    ///
    /// Installs structured logging unless the host already set a global
    /// subscriber.
    pub fn start<F>(config: &BridgeConfig, factory: F) -> Result<(Self, CallbackPump)>
    where
        F: FnOnce(ProxyControl) -> E + Send + 'static,
    {
        init_structured_logging(config);

        let (callbacks, pump) = CallbackRegistry::new();
        let host: Arc<dyn HostSink> = callbacks.clone();
        let bridge = TesterBridge::start(config, host, factory)?;

        Ok((
            Self {
                bridge: Arc::new(bridge),
                callbacks,
            },
            pump,
        ))
    }

    pub fn return_result(&self, result: &mut HostMsg, handler: Option<ErrorHandler>) -> Result<()> {
        self.invoke(ProxiedOp::ReturnResult, result, handler)
    }

    pub fn send_data(&self, data: &mut HostMsg, handler: Option<ErrorHandler>) -> Result<()> {
        self.invoke(ProxiedOp::SendData, data, handler)
    }

    pub fn send_audio_frame(&self, frame: &mut HostMsg, handler: Option<ErrorHandler>) -> Result<()> {
        self.invoke(ProxiedOp::SendAudioFrame, frame, handler)
    }

    pub fn send_video_frame(&self, frame: &mut HostMsg, handler: Option<ErrorHandler>) -> Result<()> {
        self.invoke(ProxiedOp::SendVideoFrame, frame, handler)
    }

    fn invoke(&self, op: ProxiedOp, msg: &mut HostMsg, handler: Option<ErrorHandler>) -> Result<()> {
        let id = handler.map(|handler| self.callbacks.register(handler));
        let raw = id.map_or(NO_RESPONSE_HANDLER, |id| id.get());

        let result = self.bridge.invoke(op, msg, raw);
        if let (Err(err), Some(id)) = (&result, id) {
            // The owner never saw this handle, so nothing will resolve it.
            self.callbacks.forget(id);
            debug!(
                operation = %op,
                handler_id = %id,
                error = %err,
                "Reclaimed host handler after synchronous failure"
            );
        }
        result
    }

    pub fn bridge(&self) -> &Arc<TesterBridge<E>> {
        &self.bridge
    }

    /// Handlers registered but not yet resolved.
    pub fn pending_handlers(&self) -> usize {
        self.callbacks.pending()
    }

    pub fn close(&self) {
        self.bridge.close();
    }
}

impl<E: TesterEnv> std::fmt::Debug for TesterClient<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesterClient")
            .field("bridge", &self.bridge)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
