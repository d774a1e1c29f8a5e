//! Per-call ownership record.
//!
//! An [`InvocationContext`] owns the submitted payload from the moment the
//! entry point accepts it. It is consumed by [`InvocationContext::retire`] on
//! exactly one path: the proxy rejected it, the dispatcher has returned from
//! the owner operation, or the session shut down with the context still queued.

use tracing::trace;
use uuid::Uuid;

use crate::handle::CallbackHandle;
use crate::owner::ProxiedOp;
use crate::payload::SharedMsg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retirement {
    /// The proxy refused the submission; the dispatcher never ran.
    Rejected,
    /// The dispatcher ran the owner operation.
    Dispatched,
    /// Accepted, then dropped unrun when the owner loop shut down.
    Discarded,
}

impl Retirement {
    fn as_str(self) -> &'static str {
        match self {
            Retirement::Rejected => "rejected",
            Retirement::Dispatched => "dispatched",
            Retirement::Discarded => "discarded",
        }
    }
}

#[derive(Debug)]
pub(crate) struct InvocationContext {
    id: Uuid,
    op: ProxiedOp,
    payload: SharedMsg,
    callback: CallbackHandle,
}

impl InvocationContext {
    pub(crate) fn new(op: ProxiedOp, payload: SharedMsg, callback: CallbackHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            op,
            payload,
            callback,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn op(&self) -> ProxiedOp {
        self.op
    }

    pub(crate) fn payload(&self) -> &SharedMsg {
        &self.payload
    }

    pub(crate) fn callback(&self) -> CallbackHandle {
        self.callback
    }

    /// Release the context and its payload reference.
    pub(crate) fn retire(self, retirement: Retirement) {
        trace!(
            invocation_id = %self.id,
            operation = %self.op,
            path = retirement.as_str(),
            "Invocation context retired"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Msg;
    use std::sync::Arc;

    #[test]
    fn retire_releases_payload_reference() {
        let payload = Arc::new(Msg::data("d"));
        let weak = Arc::downgrade(&payload);

        let context =
            InvocationContext::new(ProxiedOp::SendData, payload, CallbackHandle::from_raw(5));
        assert_eq!(context.callback().as_raw(), 5);
        assert_eq!(context.op(), ProxiedOp::SendData);
        assert_eq!(context.payload().name(), "d");

        context.retire(Retirement::Rejected);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn contexts_get_distinct_ids() {
        let a = InvocationContext::new(
            ProxiedOp::SendData,
            Arc::new(Msg::data("a")),
            CallbackHandle::NoResponse,
        );
        let b = InvocationContext::new(
            ProxiedOp::SendData,
            Arc::new(Msg::data("b")),
            CallbackHandle::NoResponse,
        );
        assert_ne!(a.id(), b.id());
    }
}
