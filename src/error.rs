//! # Bridge Error Types
//!
//! Three error representations meet at the boundary:
//!
//! - [`OwnerError`]: what an owner-side operation reports (start failure or
//!   completion with a domain failure).
//! - [`HostError`]: the host-intelligible value delivered to host callbacks.
//!   Success is represented by [`HostError::ok`] rather than by absence.
//! - [`BridgeError`]: synchronous failures returned from the boundary entry
//!   points, plus session start-up failures.
//!
//! All of them carry a numeric [`ErrorCode`] so a host binding can surface a
//! stable code without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proxy::ProxyError;

/// Numeric error codes shared by owner and host representations.
///
/// Discriminants follow the owner runtime's numbering so host bindings can
/// forward them unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Generic = 1,
    InvalidArgument = 3,
    SessionClosed = 6,
    MsgNotConnected = 7,
    Timeout = 8,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Unknown codes collapse to `Generic`.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => ErrorCode::Ok,
            3 => ErrorCode::InvalidArgument,
            6 => ErrorCode::SessionClosed,
            7 => ErrorCode::MsgNotConnected,
            8 => ErrorCode::Timeout,
            _ => ErrorCode::Generic,
        }
    }
}

/// Error produced by the owner runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code:?})")]
pub struct OwnerError {
    pub code: ErrorCode,
    pub message: String,
}

impl OwnerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Generic, message)
    }
}

/// Error value as seen by host callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostError {
    pub code: ErrorCode,
    pub message: String,
}

impl HostError {
    /// Canonical success value.
    pub fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            message: String::new(),
        }
    }

    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Translate an optional owner error; `None` means the operation succeeded.
    pub fn from_owner(error: Option<&OwnerError>) -> Self {
        match error {
            Some(err) => Self::new(err.code, err.message.clone()),
            None => Self::ok(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }

    pub fn into_result(self) -> std::result::Result<(), HostError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ok() {
            write!(f, "ok")
        } else {
            write!(f, "{} (code {})", self.message, self.code.as_i32())
        }
    }
}

impl std::error::Error for HostError {}

/// Synchronous failures of the boundary entry points and session lifecycle.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The session no longer accepts work; the payload was not taken.
    #[error("env_tester.{operation}() failed because the session is closed.")]
    SessionClosed { operation: &'static str },

    /// The proxy rejected the enqueue; the payload was released.
    #[error("env_tester.{operation}() could not be submitted: {source}")]
    SubmissionFailed {
        operation: &'static str,
        #[source]
        source: ProxyError,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to spawn owner thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A blocking call into the owner thread did not produce a reply.
    #[error("Owner call failed: {0}")]
    Call(ProxyError),
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::SessionClosed { .. } => ErrorCode::SessionClosed,
            BridgeError::SubmissionFailed { source, .. } => source.code(),
            BridgeError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            BridgeError::Configuration(_) | BridgeError::Spawn(_) => ErrorCode::Generic,
            BridgeError::Call(source) => source.code(),
        }
    }
}

impl From<&BridgeError> for HostError {
    fn from(err: &BridgeError) -> Self {
        HostError::new(err.code(), err.to_string())
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
