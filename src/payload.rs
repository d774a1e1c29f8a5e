//! # Owned Payloads
//!
//! Messages cross the boundary as [`SharedMsg`] (`Arc<Msg>`). The host keeps a
//! [`HostMsg`] handle; submitting it moves the shared pointer out, leaving the
//! handle in a moved-from state. A second submission of the same handle is
//! rejected instead of double-releasing the message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status carried by a command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MsgKind {
    CmdResult { status: StatusCode },
    Data,
    AudioFrame,
    VideoFrame,
}

impl MsgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgKind::CmdResult { .. } => "cmd_result",
            MsgKind::Data => "data",
            MsgKind::AudioFrame => "audio_frame",
            MsgKind::VideoFrame => "video_frame",
        }
    }
}

/// A message owned by the owner runtime once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msg {
    kind: MsgKind,
    name: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl Msg {
    pub fn new(kind: MsgKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: Map::new(),
        }
    }

    pub fn cmd_result(status: StatusCode) -> Self {
        Self::new(MsgKind::CmdResult { status }, "cmd_result")
    }

    pub fn data(name: impl Into<String>) -> Self {
        Self::new(MsgKind::Data, name)
    }

    pub fn audio_frame(name: impl Into<String>) -> Self {
        Self::new(MsgKind::AudioFrame, name)
    }

    pub fn video_frame(name: impl Into<String>) -> Self {
        Self::new(MsgKind::VideoFrame, name)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> MsgKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

pub type SharedMsg = Arc<Msg>;

/// Host-side handle to a message that can be moved across the boundary once.
#[derive(Debug)]
pub struct HostMsg {
    inner: Option<SharedMsg>,
}

impl HostMsg {
    pub fn new(msg: Msg) -> Self {
        Self {
            inner: Some(Arc::new(msg)),
        }
    }

    pub fn from_shared(msg: SharedMsg) -> Self {
        Self { inner: Some(msg) }
    }

    /// Borrow the message without transferring ownership.
    pub fn peek(&self) -> Option<&Msg> {
        self.inner.as_deref()
    }

    pub fn is_moved(&self) -> bool {
        self.inner.is_none()
    }

    /// Move the shared message out, invalidating this handle.
    pub fn take(&mut self) -> Option<SharedMsg> {
        self.inner.take()
    }

    /// Weak reference for observing when the message is finally released.
    pub fn downgrade(&self) -> Option<std::sync::Weak<Msg>> {
        self.inner.as_ref().map(Arc::downgrade)
    }
}

impl From<Msg> for HostMsg {
    fn from(msg: Msg) -> Self {
        HostMsg::new(msg)
    }
}
