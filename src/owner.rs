//! # Owner Operations
//!
//! [`TesterEnv`] is the surface of the owner runtime reachable through the
//! bridge. Each operation either starts (returns `Ok`, and will fire the
//! completion exactly once, now or later) or fails to start (returns a
//! [`StartFailure`] and hands the unfired completion back).
//!
//! The host hears about a start failure even when the operation dropped the
//! completion instead of returning it; only a completion already fired
//! before the failure was returned takes precedence.

use crate::completion::Completion;
use crate::constants::operations;
use crate::error::OwnerError;
use crate::payload::{Msg, MsgKind, SharedMsg};

/// An owner operation that could not be scheduled.
#[derive(Debug)]
pub struct StartFailure {
    pub error: OwnerError,
    /// The completion passed to the operation, returned unfired. `None` is
    /// accepted too; the start error is delivered all the same.
    pub completion: Option<Completion>,
}

impl StartFailure {
    pub fn new(error: OwnerError, completion: Option<Completion>) -> Self {
        Self { error, completion }
    }
}

pub type StartResult = Result<(), StartFailure>;

/// Operations of the owner runtime, only ever called on the owner thread.
///
/// Implementations may keep a clone of the message; the bridge releases its
/// own reference once the call returns.
pub trait TesterEnv: 'static {
    fn return_result(&mut self, result: &SharedMsg, completion: Option<Completion>)
        -> StartResult;

    fn send_data(&mut self, data: &SharedMsg, completion: Option<Completion>) -> StartResult;

    fn send_audio_frame(&mut self, frame: &SharedMsg, completion: Option<Completion>)
        -> StartResult;

    fn send_video_frame(&mut self, frame: &SharedMsg, completion: Option<Completion>)
        -> StartResult;
}

/// The proxied operations sharing the submit-payload-plus-handle pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxiedOp {
    ReturnResult,
    SendData,
    SendAudioFrame,
    SendVideoFrame,
}

impl ProxiedOp {
    pub fn name(self) -> &'static str {
        match self {
            ProxiedOp::ReturnResult => operations::RETURN_RESULT,
            ProxiedOp::SendData => operations::SEND_DATA,
            ProxiedOp::SendAudioFrame => operations::SEND_AUDIO_FRAME,
            ProxiedOp::SendVideoFrame => operations::SEND_VIDEO_FRAME,
        }
    }

    pub fn accepts(self, msg: &Msg) -> bool {
        matches!(
            (self, msg.kind()),
            (ProxiedOp::ReturnResult, MsgKind::CmdResult { .. })
                | (ProxiedOp::SendData, MsgKind::Data)
                | (ProxiedOp::SendAudioFrame, MsgKind::AudioFrame)
                | (ProxiedOp::SendVideoFrame, MsgKind::VideoFrame)
        )
    }

    pub(crate) fn start<E: TesterEnv>(
        self,
        env: &mut E,
        msg: &SharedMsg,
        completion: Option<Completion>,
    ) -> StartResult {
        match self {
            ProxiedOp::ReturnResult => env.return_result(msg, completion),
            ProxiedOp::SendData => env.send_data(msg, completion),
            ProxiedOp::SendAudioFrame => env.send_audio_frame(msg, completion),
            ProxiedOp::SendVideoFrame => env.send_video_frame(msg, completion),
        }
    }

    pub(crate) fn payload_mismatch(self, msg: &Msg) -> String {
        format!(
            "{}() does not accept a {} message",
            self.name(),
            msg.kind().as_str()
        )
    }
}

impl std::fmt::Display for ProxiedOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
