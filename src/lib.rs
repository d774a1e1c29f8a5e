#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Runtime Bridge
//!
//! Asynchronous invocation bridge between a host runtime and a single-threaded
//! owner runtime.
//!
//! ## Overview
//!
//! The owner runtime's environment may only be touched from its own thread.
//! Host threads call the bridge's entry points (`return_result`, `send_data`,
//! `send_audio_frame`, `send_video_frame`); each call moves its message into
//! an invocation context, submits that context to the owner thread through a
//! proxy, and returns immediately. The owner operation's outcome comes back
//! later, at most once per call and exactly once when the host asked for it,
//! through a handle-indirected host callback.
//!
//! ## Architecture
//!
//! ```text
//! host thread                     owner thread                   host task
//! TesterBridge::send_data ──→ OwnerProxy queue ──→ dispatch ──→ TesterEnv
//!   (handle, payload)                                  │
//!                                                 Completion
//!                                                      │
//!                                  CallbackRegistry ←──┘ ──→ CallbackPump
//!                                                              handler(result)
//! ```
//!
//! ## Module Organization
//!
//! - [`proxy`] - Single-thread owner task queue
//! - [`bridge`] - Boundary entry points and session lifecycle
//! - [`owner`] - Owner operation surface ([`TesterEnv`])
//! - [`completion`] - Exactly-once completion delivery
//! - [`handle`] - Callback handles and the handle table
//! - [`host`] - Host callback registry and pump
//! - [`client`] - Closure-based host wrapper
//! - [`payload`] - Messages and move-once host handles
//! - [`config`] - Layered configuration
//! - [`error`] - Error codes and error types
//! - [`logging`] - Structured logging setup
//! - [`testing`] - Scripted environment and recording sink
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runtime_bridge::config::BridgeConfig;
//! use runtime_bridge::payload::{HostMsg, Msg};
//! use runtime_bridge::testing::ScriptedTesterEnv;
//! use runtime_bridge::TesterClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (client, pump) = TesterClient::start(&BridgeConfig::default(), ScriptedTesterEnv::new)?;
//! tokio::spawn(pump.run());
//!
//! let mut data = HostMsg::new(Msg::data("greeting"));
//! client.send_data(
//!     &mut data,
//!     Some(Box::new(|result: Result<(), runtime_bridge::HostError>| println!("send_data finished: {result:?}"))),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod completion;
pub mod config;
pub mod constants;
mod context;
mod dispatcher;
pub mod error;
pub mod handle;
pub mod host;
pub mod logging;
pub mod owner;
pub mod payload;
pub mod proxy;
pub mod testing;

pub use bridge::TesterBridge;
pub use client::TesterClient;
pub use completion::{Completion, HostSink};
pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorCode, HostError, OwnerError, Result};
pub use handle::{CallbackHandle, HandleTable, HandlerId};
pub use host::{CallbackPump, CallbackRegistry, ErrorHandler};
pub use owner::{ProxiedOp, StartFailure, StartResult, TesterEnv};
pub use payload::{HostMsg, Msg, MsgKind, SharedMsg, StatusCode};
pub use proxy::{OwnerProxy, ProxyControl, ProxyError, Rejected};
