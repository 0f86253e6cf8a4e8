// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed session and value-marshalling layer for OPC UA clients.
//!
//! This crate sits between application code and an OPC UA protocol stack.
//! It maps Rust types onto OPC UA built-in types, tracks the session
//! lifecycle reported by the stack, and turns numeric status codes into a
//! structured error taxonomy.
//!
//! # Features
//!
//! - Scalar and array reads/writes checked against the server's data type
//! - Batch writes over node names in one namespace
//! - Session state tracking with lifecycle labels and hooks
//! - Subscriptions delivering typed data changes
//! - A pluggable [`engine::ProtocolEngine`] with an in-process simulator and,
//!   behind the `opcua-stack` feature, an engine on the `opcua` crate
//!
//! # Error Handling
//!
//! ```text
//! UaError
//! ├── NodeNotFound         - Unknown node id
//! ├── AccessDenied         - Node not readable or writable
//! ├── TypeMismatch         - Value shape differs from the node's data type
//! ├── ValueOutOfRange      - Value does not fit the target type
//! ├── ArityMismatch        - Batch names and values differ in length
//! ├── ConnectionTimeout    - Connect or request deadline passed
//! ├── ConnectionClosed     - Channel lost, refused or session not active
//! ├── PartialWriteFailure  - Some batch elements were rejected
//! └── Protocol             - Any other status code
//! ```
//!
//! # Example
//!
//! ```rust
//! use opcua_typed::engine::{SimulatedEngine, TEST_NAMESPACE};
//! use opcua_typed::{ClientConfig, NodeAddress, TypedAccessClient};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> opcua_typed::UaResult<()> {
//! let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
//! client.connect("opc.tcp://127.0.0.1:4840").await?;
//!
//! let address = NodeAddress::new(TEST_NAMESPACE, "byte_42");
//! let value: u8 = client.read(&address).await?;
//! assert_eq!(value, 42);
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod address;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod status;
pub mod value;

// Re-export commonly used types
pub use address::NodeAddress;
pub use client::{ClientFuture, ClientStats, TypedAccessClient, WriteOutcome};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{
    ConfigError, ErrorKind, ErrorSeverity, ErrorTranslator, UaError, UaResult, WriteFailure,
};
pub use session::{
    ChannelState, ClientState, DataChange, LifecyclePhase, SessionState, SessionStateMachine,
};
pub use status::StatusCode;
pub use value::{DecodeError, TypeTag, TypedValue, UaType, WireType};
