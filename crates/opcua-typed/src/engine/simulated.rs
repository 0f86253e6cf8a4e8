// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process protocol engine.
//!
//! [`SimulatedEngine`] behaves like a small OPC UA server reached over a
//! loopback channel: sessions walk through the real lifecycle states, the
//! server checks types on write, and monitored items queue data changes
//! that [`run_iterate`](ProtocolEngine::run_iterate) delivers.
//!
//! It is seeded with the namespace 5 test node set (`uint32a`, `byte_test`,
//! `string_hello`, `int32_array`, ...) unless built with
//! [`SimulatedEngineBuilder::without_default_nodes`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::events::ChannelEvents;
use super::{
    ChannelHandle, DataCallback, MonitoredItemId, ProtocolEngine, RawDataChange, Scalar,
    ScalarType, StateCallback, StateNotification, SubscriptionId, Variant,
};
use crate::address::NodeAddress;
use crate::config::ENDPOINT_SCHEME;
use crate::session::{ChannelState, SessionState};
use crate::status::StatusCode;
use crate::value::TypeTag;

/// Namespace of the seeded test nodes.
pub const TEST_NAMESPACE: u16 = 5;

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone)]
struct SimNode {
    value: Variant,
    readable: bool,
    writable: bool,
}

impl SimNode {
    fn new(value: Variant) -> Self {
        Self {
            value,
            readable: true,
            writable: true,
        }
    }
}

fn scalar(value: Scalar) -> Variant {
    Variant::Scalar(value)
}

fn array(element_type: ScalarType, values: Vec<Scalar>) -> Variant {
    Variant::Array {
        element_type,
        values,
    }
}

fn text(value: &str) -> Variant {
    scalar(Scalar::String(value.as_bytes().to_vec()))
}

/// The namespace 5 node set of the reference test server.
fn default_nodes() -> Vec<(NodeAddress, Variant)> {
    let node = |name: &str, value: Variant| (NodeAddress::new(TEST_NAMESPACE, name), value);
    vec![
        node("uint32a", scalar(Scalar::UInt32(0))),
        node("uint32b", scalar(Scalar::UInt32(1000))),
        node("uint32c", scalar(Scalar::UInt32(2000))),
        node("uint16a", scalar(Scalar::UInt16(0))),
        node("uint16b", scalar(Scalar::UInt16(100))),
        node("uint16c", scalar(Scalar::UInt16(200))),
        node("true_var", scalar(Scalar::Boolean(true))),
        node("false_var", scalar(Scalar::Boolean(false))),
        node("byte_zero", scalar(Scalar::Byte(0))),
        node("byte_42", scalar(Scalar::Byte(42))),
        node("byte_max", scalar(Scalar::Byte(255))),
        node("byte_test", scalar(Scalar::Byte(128))),
        node("string_empty", text("")),
        node("string_hello", text("Hello World")),
        node("string_test", text("Test String Value")),
        node("float_zero", scalar(Scalar::Float(0.0))),
        node("float_pi", scalar(Scalar::Float(3.14159))),
        node("float_negative", scalar(Scalar::Float(-123.456))),
        node("double_zero", scalar(Scalar::Double(0.0))),
        node("double_pi", scalar(Scalar::Double(std::f64::consts::PI))),
        node("double_negative", scalar(Scalar::Double(-987.654321))),
        node("double_large", scalar(Scalar::Double(1.23456789e100))),
        node(
            "int32_array",
            array(ScalarType::Int32, (1..=5).map(Scalar::Int32).collect()),
        ),
        node("int32_array_empty", array(ScalarType::Int32, Vec::new())),
        node(
            "float_array",
            array(
                ScalarType::Float,
                [1.1, 2.2, 3.3].into_iter().map(Scalar::Float).collect(),
            ),
        ),
        node(
            "bool_array",
            array(
                ScalarType::Boolean,
                [true, false, true, true, false]
                    .into_iter()
                    .map(Scalar::Boolean)
                    .collect(),
            ),
        ),
        node(
            "byte_array",
            array(
                ScalarType::Byte,
                [10, 20, 30, 40].into_iter().map(Scalar::Byte).collect(),
            ),
        ),
        node(
            "uint32_array",
            array(
                ScalarType::UInt32,
                [100, 200, 300].into_iter().map(Scalar::UInt32).collect(),
            ),
        ),
        node(
            "double_array",
            array(
                ScalarType::Double,
                [1.111, 2.222, 3.333, 4.444]
                    .into_iter()
                    .map(Scalar::Double)
                    .collect(),
            ),
        ),
    ]
}

/// A write must keep the stored type and shape.
fn same_shape(stored: &Variant, incoming: &Variant) -> bool {
    match (stored, incoming) {
        (Variant::Empty, _) => true,
        (Variant::Scalar(a), Variant::Scalar(b)) => a.scalar_type() == b.scalar_type(),
        (
            Variant::Array {
                element_type: a, ..
            },
            Variant::Array {
                element_type: b, ..
            },
        ) => a == b,
        _ => false,
    }
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone)]
struct Settings {
    activation_step: Duration,
    response_delay: Duration,
    stall_activation: bool,
    activation_failure: Option<StatusCode>,
    refuse_connections: Option<StatusCode>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            activation_step: Duration::ZERO,
            response_delay: Duration::ZERO,
            stall_activation: false,
            activation_failure: None,
            refuse_connections: None,
        }
    }
}

// =============================================================================
// Channel
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct MonitoredItem {
    subscription: SubscriptionId,
    item: MonitoredItemId,
}

struct Channel {
    events: ChannelEvents,
    subscriptions: Mutex<HashSet<SubscriptionId>>,
    monitored: Mutex<HashMap<NodeAddress, Vec<MonitoredItem>>>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    fn new() -> Self {
        Self {
            events: ChannelEvents::new(ChannelState::SecureChannelEstablished, SessionState::Closed),
            subscriptions: Mutex::new(HashSet::new()),
            monitored: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(None),
        }
    }

    fn queue_value(&self, address: &NodeAddress, value: &Variant) {
        let items = self
            .monitored
            .lock()
            .get(address)
            .cloned()
            .unwrap_or_default();
        let now = Utc::now();
        for monitored in items {
            self.events.queue(RawDataChange {
                subscription_id: monitored.subscription,
                monitored_item_id: monitored.item,
                address: address.clone(),
                value: value.clone(),
                status: StatusCode::GOOD,
                source_timestamp: Some(now),
                server_timestamp: Some(now),
            });
        }
    }

    fn stop_lifecycle(&self) {
        if let Some(task) = self.lifecycle.lock().take() {
            task.abort();
        }
    }
}

// =============================================================================
// SimulatedEngine
// =============================================================================

struct Inner {
    settings: Settings,
    nodes: Mutex<HashMap<NodeAddress, SimNode>>,
    channels: Mutex<HashMap<u64, Arc<Channel>>>,
    write_faults: Mutex<HashMap<NodeAddress, StatusCode>>,
    next_handle: AtomicU64,
    next_subscription: AtomicU32,
    next_item: AtomicU32,
    writes: AtomicU64,
    connects: AtomicU64,
}

/// An in-process [`ProtocolEngine`] with an embedded address space.
///
/// Cloning is cheap; clones share the same server. Keep a clone around to
/// inspect or mutate server-side state while a client owns the other.
///
/// # Examples
///
/// ```
/// use opcua_typed::engine::{Scalar, SimulatedEngine, Variant};
/// use opcua_typed::NodeAddress;
///
/// let engine = SimulatedEngine::new();
/// let value = engine.value(&NodeAddress::new(5, "byte_42"));
/// assert_eq!(value, Some(Variant::Scalar(Scalar::Byte(42))));
/// ```
#[derive(Clone)]
pub struct SimulatedEngine {
    inner: Arc<Inner>,
}

impl SimulatedEngine {
    /// Creates an engine seeded with the default test nodes.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder.
    pub fn builder() -> SimulatedEngineBuilder {
        SimulatedEngineBuilder::default()
    }

    // =========================================================================
    // Server-side access
    // =========================================================================

    /// Returns the stored value of a node.
    pub fn value(&self, address: &NodeAddress) -> Option<Variant> {
        self.inner
            .nodes
            .lock()
            .get(address)
            .map(|node| node.value.clone())
    }

    /// Sets a node's value from the server side, creating the node if needed.
    ///
    /// No type check is applied. Monitored items on the node are notified.
    pub fn set_value(&self, address: NodeAddress, value: Variant) {
        self.inner
            .nodes
            .lock()
            .entry(address.clone())
            .and_modify(|node| node.value = value.clone())
            .or_insert_with(|| SimNode::new(value.clone()));
        self.publish(&address, &value);
    }

    /// Makes every subsequent write to `address` fail with `status`.
    pub fn fail_writes_for(&self, address: NodeAddress, status: StatusCode) {
        self.inner.write_faults.lock().insert(address, status);
    }

    /// Removes all injected write failures.
    pub fn clear_write_faults(&self) {
        self.inner.write_faults.lock().clear();
    }

    /// Drops every open connection as if the network went away.
    ///
    /// Clients see `Disconnected` with `BadConnectionClosed`; operations on
    /// the old handles fail with `BadConnectionClosed`.
    pub fn sever_connections(&self) {
        let channels: Vec<_> = self.inner.channels.lock().values().cloned().collect();
        for channel in channels {
            channel.stop_lifecycle();
            if channel.events.is_open() {
                channel.events.transition(
                    ChannelState::Disconnected,
                    SessionState::Closed,
                    StatusCode::BAD_CONNECTION_CLOSED,
                );
            }
        }
        tracing::debug!("Simulated server severed all connections");
    }

    /// Number of node writes the server has applied.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Number of connect requests accepted.
    pub fn connect_count(&self) -> u64 {
        self.inner.connects.load(Ordering::Relaxed)
    }

    /// Number of channels currently open.
    pub fn open_channels(&self) -> usize {
        self.inner
            .channels
            .lock()
            .values()
            .filter(|channel| channel.events.is_open())
            .count()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn channel(&self, handle: ChannelHandle) -> Option<Arc<Channel>> {
        self.inner.channels.lock().get(&handle.id()).cloned()
    }

    /// Resolves a handle whose session is usable for services.
    fn active(&self, handle: ChannelHandle) -> Result<Arc<Channel>, StatusCode> {
        let channel = self
            .channel(handle)
            .ok_or(StatusCode::BAD_CONNECTION_CLOSED)?;
        channel.events.ensure_active()?;
        Ok(channel)
    }

    async fn respond(&self) {
        let delay = self.inner.settings.response_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn read_node(&self, address: &NodeAddress) -> Result<Variant, StatusCode> {
        let nodes = self.inner.nodes.lock();
        let node = nodes.get(address).ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
        if !node.readable {
            return Err(StatusCode::BAD_NOT_READABLE);
        }
        Ok(node.value.clone())
    }

    fn write_node(&self, address: &NodeAddress, value: Variant) -> StatusCode {
        if let Some(status) = self.inner.write_faults.lock().get(address) {
            return *status;
        }

        {
            let mut nodes = self.inner.nodes.lock();
            let Some(node) = nodes.get_mut(address) else {
                return StatusCode::BAD_NODE_ID_UNKNOWN;
            };
            if !node.writable {
                return StatusCode::BAD_NOT_WRITABLE;
            }
            if !same_shape(&node.value, &value) {
                return StatusCode::BAD_TYPE_MISMATCH;
            }
            node.value = value.clone();
        }

        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.publish(address, &value);
        StatusCode::GOOD
    }

    fn publish(&self, address: &NodeAddress, value: &Variant) {
        let channels: Vec<_> = self.inner.channels.lock().values().cloned().collect();
        for channel in channels.iter().filter(|channel| channel.events.is_open()) {
            channel.queue_value(address, value);
        }
    }

    fn spawn_lifecycle(&self, channel: Arc<Channel>) -> JoinHandle<()> {
        let settings = self.inner.settings.clone();
        let task_channel = Arc::clone(&channel);
        tokio::spawn(async move {
            let channel = task_channel;
            let open = ChannelState::SecureChannelEstablished;
            let steps = [
                SessionState::CreateRequested,
                SessionState::Created,
                SessionState::ActivateRequested,
                SessionState::Activated,
            ];

            for session in steps {
                tokio::time::sleep(settings.activation_step).await;
                if !channel.events.is_open() {
                    return;
                }

                if session == SessionState::Activated {
                    if settings.stall_activation {
                        return;
                    }
                    if let Some(status) = settings.activation_failure {
                        channel.events.transition(ChannelState::Disconnected, SessionState::Closed, status);
                        return;
                    }
                }

                channel.events.transition(open, session, StatusCode::GOOD);
            }
        })
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEngine")
            .field("nodes", &self.inner.nodes.lock().len())
            .field("open_channels", &self.open_channels())
            .finish()
    }
}

#[async_trait]
impl ProtocolEngine for SimulatedEngine {
    async fn connect(&self, endpoint_url: &str) -> Result<ChannelHandle, StatusCode> {
        if !endpoint_url.starts_with(ENDPOINT_SCHEME) {
            return Err(StatusCode::BAD_TCP_ENDPOINT_URL_INVALID);
        }
        if let Some(status) = self.inner.settings.refuse_connections {
            return Err(status);
        }

        let id = self.inner.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let channel = Arc::new(Channel::new());
        self.inner.channels.lock().insert(id, Arc::clone(&channel));
        self.inner.connects.fetch_add(1, Ordering::Relaxed);

        let task = self.spawn_lifecycle(Arc::clone(&channel));
        *channel.lifecycle.lock() = Some(task);

        tracing::debug!(endpoint = %endpoint_url, channel = id, "Simulated channel opened");
        Ok(ChannelHandle::new(id))
    }

    async fn disconnect(&self, handle: ChannelHandle) {
        let Some(channel) = self.inner.channels.lock().remove(&handle.id()) else {
            return;
        };
        channel.stop_lifecycle();
        if channel.events.is_open() {
            let session = channel.events.snapshot().session;
            if session != SessionState::Closed {
                channel.events.transition(
                    ChannelState::SecureChannelEstablished,
                    SessionState::Closing,
                    StatusCode::GOOD,
                );
            }
            channel.events.transition(ChannelState::Disconnected, SessionState::Closed, StatusCode::GOOD);
        }
        tracing::debug!(channel = %handle, "Simulated channel closed");
    }

    async fn read_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        _expected: TypeTag,
    ) -> Result<Variant, StatusCode> {
        self.active(handle)?;
        self.respond().await;
        self.read_node(address)
    }

    async fn read_batch(
        &self,
        handle: ChannelHandle,
        addresses: &[NodeAddress],
    ) -> Result<Vec<Result<Variant, StatusCode>>, StatusCode> {
        self.active(handle)?;
        self.respond().await;
        Ok(addresses.iter().map(|address| self.read_node(address)).collect())
    }

    async fn write_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        value: Variant,
    ) -> StatusCode {
        if let Err(status) = self.active(handle) {
            return status;
        }
        self.respond().await;
        self.write_node(address, value)
    }

    async fn write_batch(
        &self,
        handle: ChannelHandle,
        writes: &[(NodeAddress, Variant)],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        self.active(handle)?;
        self.respond().await;
        Ok(writes
            .iter()
            .map(|(address, value)| self.write_node(address, value.clone()))
            .collect())
    }

    fn on_session_state_changed(&self, handle: ChannelHandle, callback: StateCallback) {
        match self.channel(handle) {
            Some(channel) => channel.events.set_state_callback(callback),
            None => callback(StateNotification {
                channel: ChannelState::Disconnected,
                session: SessionState::Closed,
                connect_status: StatusCode::BAD_CONNECTION_CLOSED,
            }),
        }
    }

    fn on_data_changed(&self, handle: ChannelHandle, callback: DataCallback) {
        if let Some(channel) = self.channel(handle) {
            channel.events.set_data_callback(callback);
        }
    }

    fn current_state(&self, handle: ChannelHandle) -> (ChannelState, SessionState) {
        self.channel(handle)
            .map(|channel| {
                let state = channel.events.snapshot();
                (state.channel, state.session)
            })
            .unwrap_or_default()
    }

    async fn create_subscription(
        &self,
        handle: ChannelHandle,
        publishing_interval: Duration,
    ) -> Result<SubscriptionId, StatusCode> {
        let channel = self.active(handle)?;
        self.respond().await;
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);
        channel.subscriptions.lock().insert(id);
        tracing::debug!(
            subscription_id = %id,
            publishing_interval_ms = publishing_interval.as_millis() as u64,
            "Simulated subscription created"
        );
        Ok(id)
    }

    async fn add_monitored_item(
        &self,
        handle: ChannelHandle,
        subscription: SubscriptionId,
        address: &NodeAddress,
    ) -> Result<MonitoredItemId, StatusCode> {
        let channel = self.active(handle)?;
        self.respond().await;
        if !channel.subscriptions.lock().contains(&subscription) {
            return Err(StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
        }
        let initial = self.read_node(address)?;

        let item = MonitoredItemId(self.inner.next_item.fetch_add(1, Ordering::Relaxed) + 1);
        channel
            .monitored
            .lock()
            .entry(address.clone())
            .or_default()
            .push(MonitoredItem { subscription, item });

        // The first publish after creation carries the current value.
        let now = Utc::now();
        channel.events.queue(RawDataChange {
            subscription_id: subscription,
            monitored_item_id: item,
            address: address.clone(),
            value: initial,
            status: StatusCode::GOOD,
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        });
        Ok(item)
    }

    async fn run_iterate(&self, handle: ChannelHandle, timeout: Duration) -> StatusCode {
        match self.active(handle) {
            Ok(channel) => channel.events.pump(timeout).await,
            Err(status) => status,
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// =============================================================================
// SimulatedEngineBuilder
// =============================================================================

/// Builder for [`SimulatedEngine`].
#[derive(Debug)]
pub struct SimulatedEngineBuilder {
    settings: Settings,
    seed_defaults: bool,
    nodes: Vec<(NodeAddress, Variant)>,
    read_only: Vec<NodeAddress>,
    unreadable: Vec<NodeAddress>,
}

impl Default for SimulatedEngineBuilder {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            seed_defaults: true,
            nodes: Vec::new(),
            read_only: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl SimulatedEngineBuilder {
    /// Starts from an empty address space.
    pub fn without_default_nodes(mut self) -> Self {
        self.seed_defaults = false;
        self
    }

    /// Adds or replaces a node.
    pub fn node(mut self, address: NodeAddress, value: Variant) -> Self {
        self.nodes.push((address, value));
        self
    }

    /// Rejects writes to `address` with `BadNotWritable`.
    pub fn read_only(mut self, address: NodeAddress) -> Self {
        self.read_only.push(address);
        self
    }

    /// Rejects reads of `address` with `BadNotReadable`.
    pub fn unreadable(mut self, address: NodeAddress) -> Self {
        self.unreadable.push(address);
        self
    }

    /// Delay before each session lifecycle step.
    pub fn activation_delay(mut self, step: Duration) -> Self {
        self.settings.activation_step = step;
        self
    }

    /// Delay before every service response.
    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.settings.response_delay = delay;
        self
    }

    /// Sessions stop at `ActivateRequested` and never activate.
    pub fn stall_activation(mut self) -> Self {
        self.settings.stall_activation = true;
        self
    }

    /// Activation fails and the channel closes with `status`.
    pub fn fail_activation(mut self, status: StatusCode) -> Self {
        self.settings.activation_failure = Some(status);
        self
    }

    /// Every connect attempt fails immediately with `status`.
    pub fn refuse_connections(mut self, status: StatusCode) -> Self {
        self.settings.refuse_connections = Some(status);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> SimulatedEngine {
        let mut nodes: HashMap<NodeAddress, SimNode> = HashMap::new();
        let seed = if self.seed_defaults {
            default_nodes()
        } else {
            Vec::new()
        };
        for (address, value) in seed.into_iter().chain(self.nodes) {
            nodes.insert(address, SimNode::new(value));
        }
        for address in self.read_only {
            if let Some(node) = nodes.get_mut(&address) {
                node.writable = false;
            }
        }
        for address in self.unreadable {
            if let Some(node) = nodes.get_mut(&address) {
                node.readable = false;
            }
        }

        SimulatedEngine {
            inner: Arc::new(Inner {
                settings: self.settings,
                nodes: Mutex::new(nodes),
                channels: Mutex::new(HashMap::new()),
                write_faults: Mutex::new(HashMap::new()),
                next_handle: AtomicU64::new(0),
                next_subscription: AtomicU32::new(0),
                next_item: AtomicU32::new(0),
                writes: AtomicU64::new(0),
                connects: AtomicU64::new(0),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
