// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol engine boundary.
//!
//! The engine owns the wire protocol: secure channel, session services,
//! encoding. The typed layer only talks to it through [`ProtocolEngine`],
//! exchanging raw [`Variant`] values and [`StatusCode`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     TypedAccessClient                           │
//! │           (typed read/write, batches, subscriptions)            │
//! └─────────────────────────────────────────────────────────────────┘
//!              │ Variant / StatusCode          ▲ notifications
//!              ▼                               │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ProtocolEngine                             │
//! │        SimulatedEngine  |  OpcUaStackEngine (opcua-stack)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Notification contract
//!
//! - Registering a state callback invokes it once with the current state.
//! - Notifications for one handle are delivered one at a time, never
//!   concurrently, possibly from a thread other than the caller's.
//! - Callbacks must return quickly and must not call back into the engine.

mod events;
mod simulated;

#[cfg(feature = "opcua-stack")]
mod opcua_stack;

pub use simulated::{SimulatedEngine, SimulatedEngineBuilder, TEST_NAMESPACE};

#[cfg(feature = "opcua-stack")]
pub use opcua_stack::OpcUaStackEngine;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::NodeAddress;
use crate::session::{ChannelState, SessionState};
use crate::status::StatusCode;
use crate::value::{TypeTag, WireType};

// =============================================================================
// Handles and identifiers
// =============================================================================

/// Opaque handle for one engine connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(u64);

impl ChannelHandle {
    /// Wraps an engine-assigned id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the engine-assigned id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// Server-assigned subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned monitored item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitoredItemId(pub u32);

impl fmt::Display for MonitoredItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Variant
// =============================================================================

/// Built-in scalar types that can appear on the wire.
///
/// A superset of [`WireType`]: servers may hold types the typed layer does
/// not map, which then surface as type mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean.
    Boolean,
    /// SByte.
    SByte,
    /// Byte.
    Byte,
    /// Int16.
    Int16,
    /// UInt16.
    UInt16,
    /// Int32.
    Int32,
    /// UInt32.
    UInt32,
    /// Int64.
    Int64,
    /// UInt64.
    UInt64,
    /// Float.
    Float,
    /// Double.
    Double,
    /// String.
    String,
    /// DateTime.
    DateTime,
    /// ByteString.
    ByteString,
}

impl ScalarType {
    /// Returns the typed-layer counterpart, if there is one.
    pub fn wire_type(self) -> Option<WireType> {
        Some(match self {
            Self::Boolean => WireType::Boolean,
            Self::SByte => WireType::SByte,
            Self::Byte => WireType::Byte,
            Self::Int16 => WireType::Int16,
            Self::UInt16 => WireType::UInt16,
            Self::Int32 => WireType::Int32,
            Self::UInt32 => WireType::UInt32,
            Self::Int64 => WireType::Int64,
            Self::UInt64 => WireType::UInt64,
            Self::Float => WireType::Float,
            Self::Double => WireType::Double,
            Self::String => WireType::String,
            Self::DateTime | Self::ByteString => return None,
        })
    }

    /// Returns the OPC UA type name.
    pub fn name(self) -> &'static str {
        match self.wire_type() {
            Some(wire) => wire.name(),
            None if self == Self::DateTime => "DateTime",
            None => "ByteString",
        }
    }
}

impl From<WireType> for ScalarType {
    fn from(wire: WireType) -> Self {
        match wire {
            WireType::Boolean => Self::Boolean,
            WireType::SByte => Self::SByte,
            WireType::Byte => Self::Byte,
            WireType::Int16 => Self::Int16,
            WireType::UInt16 => Self::UInt16,
            WireType::Int32 => Self::Int32,
            WireType::UInt32 => Self::UInt32,
            WireType::Int64 => Self::Int64,
            WireType::UInt64 => Self::UInt64,
            WireType::Float => Self::Float,
            WireType::Double => Self::Double,
            WireType::String => Self::String,
        }
    }
}

/// One scalar as carried by the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Boolean.
    Boolean(bool),
    /// SByte.
    SByte(i8),
    /// Byte.
    Byte(u8),
    /// Int16.
    Int16(i16),
    /// UInt16.
    UInt16(u16),
    /// Int32.
    Int32(i32),
    /// UInt32.
    UInt32(u32),
    /// Int64.
    Int64(i64),
    /// UInt64.
    UInt64(u64),
    /// Float.
    Float(f32),
    /// Double.
    Double(f64),
    /// String payload as the raw bytes received; UTF-8 is checked on decode.
    String(Vec<u8>),
    /// DateTime.
    DateTime(DateTime<Utc>),
    /// ByteString.
    ByteString(Vec<u8>),
}

impl Scalar {
    /// Returns the scalar's type.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Boolean(_) => ScalarType::Boolean,
            Self::SByte(_) => ScalarType::SByte,
            Self::Byte(_) => ScalarType::Byte,
            Self::Int16(_) => ScalarType::Int16,
            Self::UInt16(_) => ScalarType::UInt16,
            Self::Int32(_) => ScalarType::Int32,
            Self::UInt32(_) => ScalarType::UInt32,
            Self::Int64(_) => ScalarType::Int64,
            Self::UInt64(_) => ScalarType::UInt64,
            Self::Float(_) => ScalarType::Float,
            Self::Double(_) => ScalarType::Double,
            Self::String(_) => ScalarType::String,
            Self::DateTime(_) => ScalarType::DateTime,
            Self::ByteString(_) => ScalarType::ByteString,
        }
    }
}

/// A raw value as exchanged with the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// No value.
    Empty,
    /// A single scalar.
    Scalar(Scalar),
    /// A one-dimensional array. Every element has `element_type`.
    Array {
        /// Declared element type; meaningful even when `values` is empty.
        element_type: ScalarType,
        /// Elements in server order.
        values: Vec<Scalar>,
    },
}

impl Variant {
    /// Returns the typed-layer tag for this value, if it maps to one.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Self::Empty => None,
            Self::Scalar(scalar) => scalar.scalar_type().wire_type().map(TypeTag::scalar),
            Self::Array { element_type, .. } => element_type.wire_type().map(TypeTag::array),
        }
    }

    /// Describes the type for diagnostics, e.g. `Int32` or `Byte[]`.
    pub fn describe(&self) -> String {
        match self {
            Self::Empty => "Empty".to_string(),
            Self::Scalar(scalar) => scalar.scalar_type().name().to_string(),
            Self::Array { element_type, .. } => format!("{}[]", element_type.name()),
        }
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// State snapshot delivered by the engine on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateNotification {
    /// Channel state.
    pub channel: ChannelState,
    /// Session state.
    pub session: SessionState,
    /// Status of the connect attempt that led here.
    pub connect_status: StatusCode,
}

/// A data change reported for a monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataChange {
    /// Owning subscription.
    pub subscription_id: SubscriptionId,
    /// Monitored item that fired.
    pub monitored_item_id: MonitoredItemId,
    /// Node being monitored.
    pub address: NodeAddress,
    /// New value.
    pub value: Variant,
    /// Value status.
    pub status: StatusCode,
    /// Timestamp assigned by the data source.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Timestamp assigned by the server.
    pub server_timestamp: Option<DateTime<Utc>>,
}

/// Callback receiving state transitions.
pub type StateCallback = Box<dyn Fn(StateNotification) + Send + Sync>;

/// Callback receiving data change notifications.
pub type DataCallback = Box<dyn Fn(RawDataChange) + Send + Sync>;

// =============================================================================
// ProtocolEngine
// =============================================================================

/// The narrow interface the typed layer needs from an OPC UA stack.
///
/// Per-node failures are reported as status codes, never as panics.
/// Service-level failures (the whole request failed) are the `Err` side of
/// the batch calls.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    /// Opens a channel to `endpoint_url` and starts session establishment.
    ///
    /// Returns once the channel exists; session progress is reported through
    /// the state callback.
    async fn connect(&self, endpoint_url: &str) -> Result<ChannelHandle, StatusCode>;

    /// Closes the session and channel. Unknown or closed handles are ignored.
    async fn disconnect(&self, handle: ChannelHandle);

    /// Reads the value attribute of one node.
    async fn read_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        expected: TypeTag,
    ) -> Result<Variant, StatusCode>;

    /// Reads several nodes in one request, index-aligned.
    async fn read_batch(
        &self,
        handle: ChannelHandle,
        addresses: &[NodeAddress],
    ) -> Result<Vec<Result<Variant, StatusCode>>, StatusCode>;

    /// Writes the value attribute of one node.
    async fn write_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        value: Variant,
    ) -> StatusCode;

    /// Writes several nodes in one request, returning one status per element.
    async fn write_batch(
        &self,
        handle: ChannelHandle,
        writes: &[(NodeAddress, Variant)],
    ) -> Result<Vec<StatusCode>, StatusCode>;

    /// Registers the state callback for `handle`, replacing any previous one.
    ///
    /// The callback is invoked once with the current state before returning.
    fn on_session_state_changed(&self, handle: ChannelHandle, callback: StateCallback);

    /// Registers the data change callback for `handle`, replacing any previous one.
    fn on_data_changed(&self, handle: ChannelHandle, callback: DataCallback);

    /// Returns the current channel and session state of `handle`.
    fn current_state(&self, handle: ChannelHandle) -> (ChannelState, SessionState);

    /// Creates a subscription with the given publishing interval.
    async fn create_subscription(
        &self,
        handle: ChannelHandle,
        publishing_interval: Duration,
    ) -> Result<SubscriptionId, StatusCode>;

    /// Adds a monitored item on the value attribute of `address`.
    async fn add_monitored_item(
        &self,
        handle: ChannelHandle,
        subscription: SubscriptionId,
        address: &NodeAddress,
    ) -> Result<MonitoredItemId, StatusCode>;

    /// Processes pending publish responses for up to `timeout`, delivering
    /// data change notifications to the registered callback.
    async fn run_iterate(&self, handle: ChannelHandle, timeout: Duration) -> StatusCode;

    /// Short engine name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<E: ProtocolEngine + ?Sized> ProtocolEngine for Box<E> {
    async fn connect(&self, endpoint_url: &str) -> Result<ChannelHandle, StatusCode> {
        (**self).connect(endpoint_url).await
    }

    async fn disconnect(&self, handle: ChannelHandle) {
        (**self).disconnect(handle).await
    }

    async fn read_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        expected: TypeTag,
    ) -> Result<Variant, StatusCode> {
        (**self).read_value(handle, address, expected).await
    }

    async fn read_batch(
        &self,
        handle: ChannelHandle,
        addresses: &[NodeAddress],
    ) -> Result<Vec<Result<Variant, StatusCode>>, StatusCode> {
        (**self).read_batch(handle, addresses).await
    }

    async fn write_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        value: Variant,
    ) -> StatusCode {
        (**self).write_value(handle, address, value).await
    }

    async fn write_batch(
        &self,
        handle: ChannelHandle,
        writes: &[(NodeAddress, Variant)],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        (**self).write_batch(handle, writes).await
    }

    fn on_session_state_changed(&self, handle: ChannelHandle, callback: StateCallback) {
        (**self).on_session_state_changed(handle, callback)
    }

    fn on_data_changed(&self, handle: ChannelHandle, callback: DataCallback) {
        (**self).on_data_changed(handle, callback)
    }

    fn current_state(&self, handle: ChannelHandle) -> (ChannelState, SessionState) {
        (**self).current_state(handle)
    }

    async fn create_subscription(
        &self,
        handle: ChannelHandle,
        publishing_interval: Duration,
    ) -> Result<SubscriptionId, StatusCode> {
        (**self).create_subscription(handle, publishing_interval).await
    }

    async fn add_monitored_item(
        &self,
        handle: ChannelHandle,
        subscription: SubscriptionId,
        address: &NodeAddress,
    ) -> Result<MonitoredItemId, StatusCode> {
        (**self).add_monitored_item(handle, subscription, address).await
    }

    async fn run_iterate(&self, handle: ChannelHandle, timeout: Duration) -> StatusCode {
        (**self).run_iterate(handle, timeout).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// =============================================================================
// Tests
// =============================================================================
