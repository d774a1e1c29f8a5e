//! # Test Utilities
//!
//! An in-memory [`HostSink`] that records every delivery and a scripted
//! [`TesterEnv`] whose operations succeed, fail, defer or refuse to start
//! according to a queue of [`Outcome`]s. Used by the crate's own tests and
//! available to host bindings for theirs.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::completion::{Completion, HostSink};
use crate::error::{HostError, OwnerError};
use crate::handle::HandlerId;
use crate::owner::{ProxiedOp, StartFailure, StartResult, TesterEnv};
use crate::payload::SharedMsg;
use crate::proxy::ProxyControl;

/// Records `(handler, error)` pairs in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<(HandlerId, HostError)>>,
    arrived: Condvar,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything delivered so far.
    pub fn take(&self) -> Vec<(HandlerId, HostError)> {
        std::mem::take(&mut *self.deliveries.lock())
    }

    pub fn snapshot(&self) -> Vec<(HandlerId, HostError)> {
        self.deliveries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }

    /// Block until at least `len` deliveries were recorded or `timeout`
    /// passes. Returns whether the count was reached.
    pub fn wait_for_len(&self, len: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut deliveries = self.deliveries.lock();
        while deliveries.len() < len {
            if self.arrived.wait_until(&mut deliveries, deadline).timed_out() {
                return deliveries.len() >= len;
            }
        }
        true
    }

    pub fn count_for(&self, handler: HandlerId) -> usize {
        self.deliveries
            .lock()
            .iter()
            .filter(|(id, _)| *id == handler)
            .count()
    }
}

impl HostSink for RecordingSink {
    fn deliver(&self, handler: HandlerId, error: HostError) {
        self.deliveries.lock().push((handler, error));
        self.arrived.notify_all();
    }
}

/// What the scripted environment does with the next operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Start and complete successfully right away.
    Succeed,
    /// Start and complete with the given failure right away.
    Fail(OwnerError),
    /// Start and hold the completion until [`ScriptedTesterEnv::complete_deferred`].
    Defer,
    /// Refuse to start, handing the completion back.
    RejectStart(OwnerError),
    /// Start and drop the completion without firing it.
    Swallow,
    /// Drop the completion, then refuse to start without handing it back.
    AbandonStart(OwnerError),
}

pub struct ScriptedTesterEnv {
    control: ProxyControl,
    script: VecDeque<Outcome>,
    default: Outcome,
    deferred: Vec<(SharedMsg, Option<Completion>)>,
    received: Vec<(ProxiedOp, String)>,
}

impl ScriptedTesterEnv {
    pub fn new(control: ProxyControl) -> Self {
        Self {
            control,
            script: VecDeque::new(),
            default: Outcome::Succeed,
            deferred: Vec::new(),
            received: Vec::new(),
        }
    }

    /// Outcome used once the script queue is empty.
    pub fn with_default(mut self, outcome: Outcome) -> Self {
        self.default = outcome;
        self
    }

    pub fn set_default(&mut self, outcome: Outcome) {
        self.default = outcome;
    }

    pub fn push_outcome(&mut self, outcome: Outcome) {
        self.script.push_back(outcome);
    }

    /// Fire every held completion with `error` (`None` for success) and
    /// release the held messages. Returns how many operations were completed.
    pub fn complete_deferred(&mut self, error: Option<OwnerError>) -> usize {
        let deferred = std::mem::take(&mut self.deferred);
        let count = deferred.len();
        for (_msg, completion) in deferred {
            if let Some(completion) = completion {
                completion.fire(error.as_ref());
            }
        }
        count
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Operations started so far, with the name of the message each received.
    pub fn received(&self) -> &[(ProxiedOp, String)] {
        &self.received
    }

    pub fn control(&self) -> &ProxyControl {
        &self.control
    }

    fn run(&mut self, op: ProxiedOp, msg: &SharedMsg, completion: Option<Completion>) -> StartResult {
        let outcome = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        if !matches!(outcome, Outcome::RejectStart(_) | Outcome::AbandonStart(_)) {
            self.received.push((op, msg.name().to_string()));
        }

        match outcome {
            Outcome::RejectStart(error) => return Err(StartFailure::new(error, completion)),
            Outcome::AbandonStart(error) => {
                drop(completion);
                return Err(StartFailure::new(error, None));
            }
            Outcome::Succeed => {
                if let Some(completion) = completion {
                    completion.succeed();
                }
            }
            Outcome::Fail(error) => {
                if let Some(completion) = completion {
                    completion.fail(&error);
                }
            }
            Outcome::Defer => self.deferred.push((SharedMsg::clone(msg), completion)),
            Outcome::Swallow => drop(completion),
        }
        Ok(())
    }
}

impl TesterEnv for ScriptedTesterEnv {
    fn return_result(&mut self, result: &SharedMsg, completion: Option<Completion>) -> StartResult {
        self.run(ProxiedOp::ReturnResult, result, completion)
    }

    fn send_data(&mut self, data: &SharedMsg, completion: Option<Completion>) -> StartResult {
        self.run(ProxiedOp::SendData, data, completion)
    }

    fn send_audio_frame(&mut self, frame: &SharedMsg, completion: Option<Completion>) -> StartResult {
        self.run(ProxiedOp::SendAudioFrame, frame, completion)
    }

    fn send_video_frame(&mut self, frame: &SharedMsg, completion: Option<Completion>) -> StartResult {
        self.run(ProxiedOp::SendVideoFrame, frame, completion)
    }
}

impl std::fmt::Debug for ScriptedTesterEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTesterEnv")
            .field("scripted", &self.script.len())
            .field("default", &self.default)
            .field("deferred", &self.deferred.len())
            .field("received", &self.received.len())
            .finish()
    }
}
