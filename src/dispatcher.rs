//! # Owner-side Dispatcher
//!
//! Runs on the owner thread for every accepted invocation. Wraps a live
//! callback handle in a [`Completion`], starts the owner operation, reports a
//! start failure to the host when someone is listening, and retires the
//! invocation context once the operation call has returned.
//!
//! Invocations still queued when the owner loop shuts down never reach
//! [`dispatch`]; the proxy hands them to [`discard`] instead, which resolves
//! a live handle with `SessionClosed`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::{Completion, HostSink};
use crate::context::{InvocationContext, Retirement};
use crate::error::{ErrorCode, HostError, OwnerError};
use crate::handle::CallbackHandle;
use crate::owner::{StartFailure, TesterEnv};
use crate::proxy::ProxyControl;

/// The owner object as held by the proxy: the environment plus the host
/// delivery sink its completions report to.
pub(crate) struct OwnerBinding<E> {
    pub(crate) env: E,
    pub(crate) host: Arc<dyn HostSink>,
    pub(crate) control: ProxyControl,
}

pub(crate) fn dispatch<E: TesterEnv>(binding: &mut OwnerBinding<E>, context: InvocationContext) {
    debug_assert!(
        binding.control.is_owner_thread(),
        "dispatch must run on the owner thread"
    );

    let op = context.op();
    let callback = context.callback();

    let (outcome, guard) = match callback {
        CallbackHandle::NoResponse => (op.start(&mut binding.env, context.payload(), None), None),
        CallbackHandle::Await(handler) => {
            let (completion, guard) = Completion::start(handler, Arc::clone(&binding.host));
            (
                op.start(&mut binding.env, context.payload(), Some(completion)),
                Some(guard),
            )
        }
    };

    match (outcome, guard) {
        (Ok(()), Some(guard)) => guard.started(),
        (Ok(()), None) => {}
        (Err(StartFailure { error, completion }), Some(guard)) => {
            let error = non_ok(error);
            let returned = completion.is_some();
            drop(completion);
            if guard.failed(&error) {
                warn!(
                    invocation_id = %context.id(),
                    operation = %op,
                    handler_id = callback.as_raw(),
                    completion_returned = returned,
                    error = %error,
                    "Owner operation failed to start, reported to host"
                );
            } else {
                warn!(
                    invocation_id = %context.id(),
                    operation = %op,
                    handler_id = callback.as_raw(),
                    error = %error,
                    "Owner operation failed to start after resolving its completion"
                );
            }
        }
        (Err(StartFailure { error, .. }), None) => {
            debug!(
                invocation_id = %context.id(),
                operation = %op,
                error = %non_ok(error),
                "Owner operation failed to start, no handler to report to"
            );
        }
    }

    context.retire(Retirement::Dispatched);
}

/// Retire an invocation the owner loop dropped unrun at shutdown.
pub(crate) fn discard<E: TesterEnv>(binding: &mut OwnerBinding<E>, context: InvocationContext) {
    let op = context.op();
    let callback = context.callback();
    let invocation_id = context.id();
    context.retire(Retirement::Discarded);

    if let CallbackHandle::Await(handler) = callback {
        warn!(
            invocation_id = %invocation_id,
            operation = %op,
            handler_id = %handler,
            "Session closed before the operation started, reporting to host"
        );
        binding.host.deliver(
            handler,
            HostError::new(
                ErrorCode::SessionClosed,
                format!("session closed before {}() started", op.name()),
            ),
        );
    }
}

// A start failure must never read as success on the host side.
fn non_ok(error: OwnerError) -> OwnerError {
    if error.code == ErrorCode::Ok {
        OwnerError::new(ErrorCode::Generic, error.message)
    } else {
        error
    }
}
