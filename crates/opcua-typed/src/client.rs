// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed access client.
//!
//! [`TypedAccessClient`] is the façade over a [`ProtocolEngine`]: it owns one
//! connection, tracks its session through a [`SessionStateMachine`], converts
//! between Rust types and wire values, and translates status codes into
//! [`UaError`].
//!
//! # Connection rules
//!
//! - `connect` returns only once the session is activated, or fails within
//!   `connect_timeout`.
//! - Every engine call runs under `request_timeout`.
//! - An operation that fails with `ConnectionTimeout` or `ConnectionClosed`
//!   releases the engine handle; the client is `Disconnected` afterwards.
//! - `disconnect` always succeeds, also when called twice or never connected.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::address::NodeAddress;
use crate::config::{validate_endpoint, ClientConfig};
use crate::engine::{ChannelHandle, MonitoredItemId, ProtocolEngine, SubscriptionId};
use crate::error::{ErrorTranslator, UaError, UaResult};
use crate::session::{ClientState, DataChange, SessionStateMachine};
use crate::status::StatusCode;
use crate::value::{TypeTag, TypedValue, UaType};

/// Future returned by the closure passed to [`TypedAccessClient::with_connection`].
pub type ClientFuture<'c, T> = Pin<Box<dyn Future<Output = UaResult<T>> + Send + 'c>>;

// =============================================================================
// WriteOutcome
// =============================================================================

/// Result of one element of a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Position in the submitted batch.
    pub index: usize,
    /// Target node.
    pub address: NodeAddress,
    /// Status reported for this element.
    pub status: StatusCode,
}

impl WriteOutcome {
    /// Returns `true` if the server accepted this write.
    pub fn is_committed(&self) -> bool {
        !self.status.is_bad()
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.index, self.address, self.status)
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Operation counters for one client.
#[derive(Debug, Default)]
pub struct ClientStats {
    reads: AtomicU64,
    writes: AtomicU64,
    batches: AtomicU64,
    errors: AtomicU64,
    connections: AtomicU64,
    rollbacks: AtomicU64,
    round_trips: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl ClientStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_response(&self, elapsed: Duration) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful single reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Successful single writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Batch requests sent.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Operations that surfaced an error.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Sessions activated.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Connections torn down after a connection-level failure.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Requests that were handed to the engine, successful or not.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Mean engine round trip. Requests rejected before reaching the engine
    /// are not counted.
    pub fn avg_response_time(&self) -> Duration {
        let round_trips = self.round_trips();
        if round_trips == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_response_time_us.load(Ordering::Relaxed) / round_trips)
    }
}

// =============================================================================
// TypedAccessClient
// =============================================================================

/// Typed OPC UA client bound to one engine connection.
///
/// Operations take `&mut self`, so calls on one client are serialised by the
/// borrow checker. Share a client across tasks behind a `tokio::sync::Mutex`;
/// separate clients are fully independent.
///
/// # Examples
///
/// ```
/// use opcua_typed::engine::SimulatedEngine;
/// use opcua_typed::{ClientConfig, NodeAddress, TypedAccessClient};
///
/// # tokio_test_main();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test_main() {
/// let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
/// client.connect("opc.tcp://127.0.0.1:4840").await.unwrap();
///
/// let address = NodeAddress::new(5, "byte_test");
/// client.write::<u8>(&address, 200).await.unwrap();
/// assert_eq!(client.read::<u8>(&address).await.unwrap(), 200);
///
/// client.disconnect().await.unwrap();
/// # }
/// ```
pub struct TypedAccessClient<E> {
    engine: Arc<E>,
    config: ClientConfig,
    machine: Arc<SessionStateMachine>,
    handle: Option<ChannelHandle>,
    endpoint: Option<String>,
    stats: ClientStats,
}

impl<E: ProtocolEngine + 'static> TypedAccessClient<E> {
    /// Creates a disconnected client.
    pub fn new(engine: E, config: ClientConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
            machine: Arc::new(SessionStateMachine::new()),
            handle: None,
            endpoint: None,
            stats: ClientStats::new(),
        }
    }

    /// Connects, runs `f`, and disconnects whether or not `f` succeeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use opcua_typed::engine::SimulatedEngine;
    /// use opcua_typed::{ClientConfig, NodeAddress, TypedAccessClient};
    ///
    /// # tokio_test_main();
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn tokio_test_main() {
    /// let greeting = TypedAccessClient::with_connection(
    ///     SimulatedEngine::new(),
    ///     ClientConfig::default(),
    ///     "opc.tcp://127.0.0.1:4840",
    ///     |client| Box::pin(async move {
    ///         client.read::<String>(&NodeAddress::new(5, "string_hello")).await
    ///     }),
    /// )
    /// .await
    /// .unwrap();
    /// assert_eq!(greeting, "Hello World");
    /// # }
    /// ```
    pub async fn with_connection<T, F>(
        engine: E,
        config: ClientConfig,
        endpoint_url: &str,
        f: F,
    ) -> UaResult<T>
    where
        F: for<'c> FnOnce(&'c mut Self) -> ClientFuture<'c, T>,
    {
        let mut client = Self::new(engine, config);
        client.connect(endpoint_url).await?;
        let result = f(&mut client).await;
        client.disconnect().await?;
        result
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Returns the session state machine.
    pub fn session(&self) -> &SessionStateMachine {
        &self.machine
    }

    /// Returns the current state.
    pub fn state(&self) -> ClientState {
        self.machine.state()
    }

    /// Returns a human-readable label for the current state.
    pub fn state_label(&self) -> &'static str {
        self.machine.state().label()
    }

    /// Returns a receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.machine.subscribe()
    }

    /// Returns `true` if the session is activated.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some() && self.machine.state().is_activated()
    }

    /// Returns the endpoint of the current connection.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Registers the hook run once per session establishment.
    ///
    /// Replaces any previous hook. The hook runs on the engine's notification
    /// thread and must not block or call into the client.
    pub fn on_session_created<F>(&self, hook: F)
    where
        F: Fn(&ClientState) + Send + Sync + 'static,
    {
        self.machine.set_session_created_hook(Some(Box::new(hook)));
    }

    /// Removes the session created hook.
    pub fn clear_session_created_hook(&self) {
        self.machine.set_session_created_hook(None);
    }

    /// Registers the hook run once per delivered data change.
    ///
    /// Replaces any previous hook. Same threading rules as
    /// [`on_session_created`](Self::on_session_created).
    pub fn on_data_changed<F>(&self, hook: F)
    where
        F: Fn(&DataChange) + Send + Sync + 'static,
    {
        self.machine.set_data_changed_hook(Some(Box::new(hook)));
    }

    /// Removes the data changed hook.
    pub fn clear_data_changed_hook(&self) {
        self.machine.set_data_changed_hook(None);
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Connects to `endpoint_url` and waits for the session to activate.
    ///
    /// An existing connection is closed first.
    pub async fn connect(&mut self, endpoint_url: &str) -> UaResult<()> {
        let context = format!("connect to {endpoint_url}");

        if let Err(error) = validate_endpoint(endpoint_url) {
            tracing::debug!(error = %error, "Rejected endpoint");
            return Err(UaError::protocol(context, StatusCode::BAD_TCP_ENDPOINT_URL_INVALID));
        }

        if self.handle.is_some() {
            tracing::info!(endpoint = %endpoint_url, "Reconnecting");
            self.disconnect().await?;
        }

        tracing::info!(
            endpoint = %endpoint_url,
            engine = self.engine.name(),
            "Connecting to OPC UA server"
        );

        let started = Instant::now();
        let deadline = self.config.connect_timeout;
        let generation = self.machine.begin_generation();

        let handle = match tokio::time::timeout(deadline, self.engine.connect(endpoint_url)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(status)) => {
                self.machine.reset();
                let error = ErrorTranslator::for_service(status, context);
                error.log("connect");
                self.stats.record_error();
                return Err(error);
            }
            Err(_) => {
                self.machine.reset();
                let error = UaError::timeout(context, deadline);
                error.log("connect");
                self.stats.record_error();
                return Err(error);
            }
        };

        self.register_callbacks(handle, generation);

        let mut states = self.machine.subscribe();
        let remaining = deadline.saturating_sub(started.elapsed());
        let settled = tokio::time::timeout(remaining, async {
            states
                .wait_for(|state| state.is_activated() || state.is_failed())
                .await
                .map(|state| *state)
        })
        .await;

        let error = match settled {
            Ok(Ok(state)) if state.is_activated() => {
                self.handle = Some(handle);
                self.endpoint = Some(endpoint_url.to_string());
                self.stats.record_connection();
                tracing::info!(
                    endpoint = %endpoint_url,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "OPC UA session activated"
                );
                return Ok(());
            }
            Ok(Ok(state)) => ErrorTranslator::for_service(state.connect_status, context),
            Ok(Err(_)) => UaError::closed(context, StatusCode::BAD_CONNECTION_CLOSED),
            Err(_) => UaError::timeout(context, deadline),
        };

        tracing::warn!(
            endpoint = %endpoint_url,
            state = %self.machine.state(),
            "Session did not activate, rolling back"
        );
        let _ = tokio::time::timeout(self.config.request_timeout, self.engine.disconnect(handle))
            .await;
        self.machine.reset();
        self.stats.record_error();
        error.log("connect");
        Err(error)
    }

    /// Closes the session and channel.
    ///
    /// Always succeeds; calling it twice or on a never-connected client is a
    /// no-op.
    pub async fn disconnect(&mut self) -> UaResult<()> {
        if let Some(handle) = self.handle.take() {
            let closed = tokio::time::timeout(
                self.config.request_timeout,
                self.engine.disconnect(handle),
            )
            .await;
            if closed.is_err() {
                tracing::warn!(channel = %handle, "Engine did not close the channel in time");
            }
            tracing::info!(
                endpoint = self.endpoint.as_deref().unwrap_or_default(),
                "Disconnected from OPC UA server"
            );
        }
        self.endpoint = None;
        self.machine.reset();
        Ok(())
    }

    fn register_callbacks(&self, handle: ChannelHandle, generation: u64) {
        let machine = Arc::clone(&self.machine);
        self.engine.on_session_state_changed(
            handle,
            Box::new(move |notification| machine.apply(generation, notification)),
        );

        let machine = Arc::clone(&self.machine);
        self.engine.on_data_changed(
            handle,
            Box::new(move |change| machine.deliver(generation, change)),
        );
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Reads a scalar of type `T`.
    pub async fn read<T: UaType>(&mut self, address: &NodeAddress) -> UaResult<T> {
        let expected = TypeTag::scalar(T::WIRE_TYPE);
        let value = self.read_value(address, expected).await?;
        T::from_value(value)
            .map_err(|other| UaError::type_mismatch(address.to_string(), expected, other.type_tag().to_string()))
    }

    /// Reads an array of `T`. An empty array is a valid result.
    pub async fn read_array<T: UaType>(&mut self, address: &NodeAddress) -> UaResult<Vec<T>> {
        let expected = TypeTag::array(T::WIRE_TYPE);
        let value = self.read_value(address, expected).await?;
        T::from_array_value(value)
            .map_err(|other| UaError::type_mismatch(address.to_string(), expected, other.type_tag().to_string()))
    }

    /// Reads a value that must have exactly the type and shape of `expected`.
    pub async fn read_value(
        &mut self,
        address: &NodeAddress,
        expected: TypeTag,
    ) -> UaResult<TypedValue> {
        let context = format!("read {address}");
        let value = self
            .run(&context, |engine, handle| async move {
                let variant = engine
                    .read_value(handle, address, expected)
                    .await
                    .map_err(|status| ErrorTranslator::for_node(status, address, expected))?;
                TypedValue::from_variant(variant, expected)
                    .map_err(|error| error.into_ua_error(address.to_string(), expected))
            })
            .await?;

        self.stats.record_read();
        tracing::trace!(address = %address, value = %value, "Read value");
        Ok(value)
    }

    /// Reads several nodes of one namespace in a single request.
    ///
    /// Each value is decoded as the type the server reports. Any failing
    /// element fails the whole call with that element's error.
    pub async fn multi_read<S: AsRef<str>>(
        &mut self,
        namespace_index: u16,
        names: &[S],
    ) -> UaResult<Vec<TypedValue>> {
        let addresses = NodeAddress::in_namespace(namespace_index, names);
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let context = format!("multi read of {} nodes", addresses.len());
        let addresses = &addresses;
        let batch_context = context.clone();
        let values = self
            .run(&context, |engine, handle| async move {
                let results = engine
                    .read_batch(handle, addresses)
                    .await
                    .map_err(|status| ErrorTranslator::for_service(status, batch_context))?;

                if results.len() != addresses.len() {
                    return Err(UaError::protocol(
                        format!("multi read: {} replies for {} nodes", results.len(), addresses.len()),
                        StatusCode::BAD_UNKNOWN_RESPONSE,
                    ));
                }

                addresses
                    .iter()
                    .zip(results)
                    .map(|(address, result)| {
                        let variant = result.map_err(|status| {
                            ErrorTranslator::for_node(status, address, "any supported type")
                        })?;
                        TypedValue::from_variant_any(variant).map_err(|error| {
                            UaError::type_mismatch(
                                address.to_string(),
                                "any supported type",
                                error.to_string(),
                            )
                        })
                    })
                    .collect::<UaResult<Vec<_>>>()
            })
            .await?;

        self.stats.record_batch();
        tracing::debug!(count = values.len(), "Multi read completed");
        Ok(values)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Writes a scalar of type `T`.
    pub async fn write<T: UaType>(&mut self, address: &NodeAddress, value: T) -> UaResult<()> {
        self.write_value(address, value.into_value()).await
    }

    /// Writes an array of `T`. An empty array is a valid value.
    pub async fn write_array<T: UaType>(
        &mut self,
        address: &NodeAddress,
        values: Vec<T>,
    ) -> UaResult<()> {
        self.write_value(address, T::into_array_value(values)).await
    }

    /// Writes a dynamically typed value.
    pub async fn write_value(&mut self, address: &NodeAddress, value: TypedValue) -> UaResult<()> {
        let context = format!("write {address}");
        let tag = value.type_tag();
        tracing::debug!(address = %address, value = %value, "Writing value");

        self.run(&context, |engine, handle| async move {
            let status = engine.write_value(handle, address, value.into_variant()).await;
            if status.is_bad() {
                return Err(ErrorTranslator::for_node(status, address, tag));
            }
            Ok(())
        })
        .await?;

        self.stats.record_write();
        Ok(())
    }

    /// Writes one value per name in a single request.
    ///
    /// `names` and `values` must have the same length; otherwise the call
    /// fails with [`UaError::ArityMismatch`] before anything is sent. If any
    /// element fails, the error is [`UaError::PartialWriteFailure`], listing
    /// every failed element and every committed index.
    ///
    /// # Examples
    ///
    /// ```
    /// use opcua_typed::engine::SimulatedEngine;
    /// use opcua_typed::{ClientConfig, ErrorKind, TypedAccessClient};
    ///
    /// # tokio_test_main();
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn tokio_test_main() {
    /// let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
    /// client.connect("opc.tcp://127.0.0.1:4840").await.unwrap();
    ///
    /// let names = ["uint32a", "uint32b", "uint32c"];
    /// client.multi_write(5, &names, vec![10u32, 20, 30]).await.unwrap();
    ///
    /// let err = client.multi_write(5, &names, vec![1u32, 2]).await.unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::ArityMismatch);
    /// # }
    /// ```
    pub async fn multi_write<T: UaType, S: AsRef<str>>(
        &mut self,
        namespace_index: u16,
        names: &[S],
        values: Vec<T>,
    ) -> UaResult<()> {
        let values = values.into_iter().map(UaType::into_value).collect();
        self.multi_write_values(namespace_index, names, values).await
    }

    /// Dynamically typed form of [`multi_write`](Self::multi_write).
    pub async fn multi_write_values<S: AsRef<str>>(
        &mut self,
        namespace_index: u16,
        names: &[S],
        values: Vec<TypedValue>,
    ) -> UaResult<()> {
        let (addresses, statuses) = self.write_batch(namespace_index, names, values).await?;
        match ErrorTranslator::for_batch(&addresses, &statuses) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.stats.record_error();
                error.log("multi write");
                Err(error)
            }
        }
    }

    /// Like [`multi_write`](Self::multi_write), but returns one outcome per
    /// element instead of failing on element errors.
    ///
    /// Arity, connection and service-level failures are still errors.
    pub async fn multi_write_outcomes<T: UaType, S: AsRef<str>>(
        &mut self,
        namespace_index: u16,
        names: &[S],
        values: Vec<T>,
    ) -> UaResult<Vec<WriteOutcome>> {
        let values = values.into_iter().map(UaType::into_value).collect();
        let (addresses, statuses) = self.write_batch(namespace_index, names, values).await?;

        Ok(addresses
            .into_iter()
            .enumerate()
            .map(|(index, address)| WriteOutcome {
                index,
                address,
                status: statuses
                    .get(index)
                    .copied()
                    .unwrap_or(StatusCode::BAD_UNKNOWN_RESPONSE),
            })
            .collect())
    }

    async fn write_batch<S: AsRef<str>>(
        &mut self,
        namespace_index: u16,
        names: &[S],
        values: Vec<TypedValue>,
    ) -> UaResult<(Vec<NodeAddress>, Vec<StatusCode>)> {
        if names.len() != values.len() {
            let error = UaError::arity_mismatch(names.len(), values.len());
            self.stats.record_error();
            error.log("multi write");
            return Err(error);
        }

        let addresses = NodeAddress::in_namespace(namespace_index, names);
        if addresses.is_empty() {
            return Ok((addresses, Vec::new()));
        }

        let writes: Vec<_> = addresses
            .iter()
            .cloned()
            .zip(values.into_iter().map(TypedValue::into_variant))
            .collect();

        let context = format!("multi write of {} nodes", writes.len());
        let batch_context = context.clone();
        let writes = &writes;
        let statuses = self
            .run(&context, |engine, handle| async move {
                engine
                    .write_batch(handle, writes)
                    .await
                    .map_err(|status| ErrorTranslator::for_service(status, batch_context))
            })
            .await?;

        self.stats.record_batch();
        tracing::debug!(
            count = addresses.len(),
            failed = statuses.iter().filter(|status| status.is_bad()).count(),
            "Multi write completed"
        );
        Ok((addresses, statuses))
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates a subscription using the configured publishing interval.
    pub async fn create_subscription(&mut self) -> UaResult<SubscriptionId> {
        let interval = self.config.publishing_interval;
        let id = self
            .run("create subscription", |engine, handle| async move {
                engine
                    .create_subscription(handle, interval)
                    .await
                    .map_err(|status| ErrorTranslator::for_service(status, "create subscription"))
            })
            .await?;

        tracing::info!(subscription_id = %id, "Created subscription");
        Ok(id)
    }

    /// Monitors the value of `address`; changes reach the data changed hook.
    pub async fn add_monitored_item(
        &mut self,
        subscription: SubscriptionId,
        address: &NodeAddress,
    ) -> UaResult<MonitoredItemId> {
        let context = format!("monitor {address}");
        let id = self
            .run(&context, |engine, handle| async move {
                engine
                    .add_monitored_item(handle, subscription, address)
                    .await
                    .map_err(|status| ErrorTranslator::for_node(status, address, "any supported type"))
            })
            .await?;

        tracing::debug!(
            subscription_id = %subscription,
            monitored_item_id = %id,
            address = %address,
            "Added monitored item"
        );
        Ok(id)
    }

    /// Lets the engine deliver pending notifications for up to `timeout`.
    pub async fn run_monitoring_cycle(&mut self, timeout: Duration) -> UaResult<()> {
        let deadline = timeout + self.config.request_timeout;
        let result = match self.active_handle("monitoring cycle") {
            Ok(handle) => {
                let cycle = self.engine.run_iterate(handle, timeout);
                match tokio::time::timeout(deadline, cycle).await {
                    Ok(status) if status.is_bad() => {
                        Err(ErrorTranslator::for_service(status, "monitoring cycle"))
                    }
                    Ok(_) => Ok(()),
                    Err(_) => Err(UaError::timeout("monitoring cycle", deadline)),
                }
            }
            Err(error) => Err(error),
        };
        self.settle("monitoring cycle", result).await
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn active_handle(&self, context: &str) -> UaResult<ChannelHandle> {
        match self.handle {
            Some(handle) if self.machine.state().is_activated() => Ok(handle),
            _ => Err(UaError::not_activated(context)),
        }
    }

    /// Runs one engine request under the request timeout.
    async fn run<T, F, Fut>(&mut self, context: &str, op: F) -> UaResult<T>
    where
        F: FnOnce(Arc<E>, ChannelHandle) -> Fut,
        Fut: Future<Output = UaResult<T>>,
    {
        let result = match self.active_handle(context) {
            Ok(handle) => {
                let deadline = self.config.request_timeout;
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(deadline, op(Arc::clone(&self.engine), handle)).await;
                self.stats.record_response(started.elapsed());
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(UaError::timeout(context, deadline)),
                }
            }
            Err(error) => Err(error),
        };
        self.settle(context, result).await
    }

    async fn settle<T>(&mut self, context: &str, result: UaResult<T>) -> UaResult<T> {
        if let Err(ref error) = result {
            self.stats.record_error();
            error.log(context);
            if error.is_connection_loss() {
                self.teardown(context).await;
            }
        }
        result
    }

    /// Releases the engine handle after a connection-level failure.
    async fn teardown(&mut self, context: &str) {
        if let Some(handle) = self.handle.take() {
            tracing::warn!(
                context = context,
                channel = %handle,
                "Connection lost, rolling back to Disconnected"
            );
            self.stats.record_rollback();
            let _ = tokio::time::timeout(self.config.request_timeout, self.engine.disconnect(handle))
                .await;
        }
        self.endpoint = None;
        self.machine.reset();
    }
}

impl<E> fmt::Debug for TypedAccessClient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedAccessClient")
            .field("endpoint", &self.endpoint)
            .field("handle", &self.handle)
            .field("state", &self.machine.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::engine::{Scalar, SimulatedEngine, Variant};
    use crate::error::ErrorKind;
    use crate::session::LifecyclePhase;

    const ENDPOINT: &str = "opc.tcp://127.0.0.1:4840";

    fn addr(name: &str) -> NodeAddress {
        NodeAddress::new(5, name)
    }

    async fn connected(engine: SimulatedEngine) -> TypedAccessClient<SimulatedEngine> {
        let mut client = TypedAccessClient::new(engine, ClientConfig::default());
        client.connect(ENDPOINT).await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_connect_reaches_activated() {
        let client = connected(SimulatedEngine::new()).await;
        assert!(client.is_connected());
        assert_eq!(client.state().phase(), LifecyclePhase::SessionActivated);
        assert_eq!(client.state_label(), "Session activated");
        assert_eq!(client.endpoint(), Some(ENDPOINT));
        assert_eq!(client.stats().connections(), 1);
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail_closed() {
        let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
        let err = client.read::<u8>(&addr("byte_42")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionClosed);
        assert_eq!(err.status_code(), StatusCode::BAD_SESSION_NOT_ACTIVATED);
    }

    #[tokio::test]
    async fn test_local_rejections_are_not_round_trips() {
        let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
        assert!(client.read::<u8>(&addr("byte_42")).await.is_err());

        client.connect(ENDPOINT).await.unwrap();
        assert!(client
            .multi_write(5, &["uint32a", "uint32b"], vec![1u32])
            .await
            .is_err());
        assert_eq!(client.stats().errors(), 2);
        assert_eq!(client.stats().round_trips(), 0);
        assert_eq!(client.stats().avg_response_time(), Duration::ZERO);

        client.read::<u8>(&addr("byte_42")).await.unwrap();
        assert_eq!(client.stats().round_trips(), 1);
    }

    #[tokio::test]
    async fn test_invalid_endpoint() {
        let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
        let err = client.connect("localhost:4840").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.status_code(), StatusCode::BAD_TCP_ENDPOINT_URL_INVALID);
        assert_eq!(client.engine().connect_count(), 0);
    }

    #[tokio::test]
    async fn test_scalar_type_mismatch() {
        let mut client = connected(SimulatedEngine::new()).await;
        let err = client.read::<i32>(&addr("byte_42")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        // Scalar requested from an array node.
        let err = client.read::<i32>(&addr("int32_array")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        // Type errors leave the connection intact.
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_server_rejects_wrong_write_type() {
        let engine = SimulatedEngine::new();
        let mut client = connected(engine.clone()).await;
        let err = client.write::<i32>(&addr("uint32a"), 7).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.status_code(), StatusCode::BAD_TYPE_MISMATCH);
        assert_eq!(
            engine.value(&addr("uint32a")),
            Some(Variant::Scalar(Scalar::UInt32(0)))
        );
    }

    #[tokio::test]
    async fn test_multi_write_outcomes_report_each_element() {
        let engine = SimulatedEngine::new();
        engine.fail_writes_for(addr("uint32b"), StatusCode::BAD_NOT_WRITABLE);
        let mut client = connected(engine).await;

        let outcomes = client
            .multi_write_outcomes(5, &["uint32a", "uint32b", "uint32c"], vec![1u32, 2, 3])
            .await
            .unwrap();
        let committed: Vec<bool> = outcomes.iter().map(WriteOutcome::is_committed).collect();
        assert_eq!(committed, vec![true, false, true]);
        assert_eq!(outcomes[1].status, StatusCode::BAD_NOT_WRITABLE);
    }

    #[tokio::test]
    async fn test_session_created_hook_fires_once_per_connect() {
        let mut client = TypedAccessClient::new(SimulatedEngine::new(), ClientConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on_session_created(move |state| sink.lock().push(state.session));

        client.connect(ENDPOINT).await.unwrap();
        client.disconnect().await.unwrap();
        client.connect(ENDPOINT).await.unwrap();

        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_request_timeout_rolls_back() {
        let engine = SimulatedEngine::builder()
            .response_delay(Duration::from_millis(200))
            .build();
        let config = ClientConfig::builder()
            .request_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        let mut client = TypedAccessClient::new(engine.clone(), config);
        client.connect(ENDPOINT).await.unwrap();

        let err = client.read::<u8>(&addr("byte_42")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
        assert_eq!(client.state().phase(), LifecyclePhase::Disconnected);
        assert!(!client.is_connected());
        assert_eq!(engine.open_channels(), 0);
        assert_eq!(client.stats().rollbacks(), 1);
    }
}
