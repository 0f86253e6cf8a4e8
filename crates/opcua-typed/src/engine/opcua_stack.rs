// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol engine backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous, so every service call runs on the
//! blocking pool via [`tokio::task::spawn_blocking`]. Security is fixed to
//! policy `None` with anonymous identity.
//!
//! # Example
//!
//! ```rust,ignore
//! use opcua_typed::engine::OpcUaStackEngine;
//! use opcua_typed::{ClientConfig, TypedAccessClient};
//!
//! let config = ClientConfig::default();
//! let engine = OpcUaStackEngine::new(&config);
//! let mut client = TypedAccessClient::new(engine, config);
//! client.connect("opc.tcp://127.0.0.1:4840").await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use opcua::client::prelude::{
    AttributeService, ClientBuilder, ConnectionStatusCallback, DataChangeCallback,
    IdentityToken, MonitoredItemService, Session, SessionCommand, SubscriptionService,
};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types as ua;

use super::events::ChannelEvents;
use super::{
    ChannelHandle, DataCallback, MonitoredItemId, ProtocolEngine, RawDataChange, Scalar,
    ScalarType, StateCallback, StateNotification, SubscriptionId, Variant,
};
use crate::address::NodeAddress;
use crate::config::ClientConfig;
use crate::session::{ChannelState, SessionState};
use crate::status::StatusCode;
use crate::value::TypeTag;

/// Sampling interval requested for monitored items.
const SAMPLING_INTERVAL_MS: f64 = 250.0;

// =============================================================================
// Conversion
// =============================================================================

fn status(code: ua::StatusCode) -> StatusCode {
    StatusCode::new(code.bits())
}

fn node_id(address: &NodeAddress) -> ua::NodeId {
    ua::NodeId::new(address.namespace_index(), address.identifier().to_string())
}

fn timestamp(value: &ua::DateTime) -> DateTime<Utc> {
    value.as_chrono()
}

fn variant_type(scalar_type: ScalarType) -> ua::VariantTypeId {
    match scalar_type {
        ScalarType::Boolean => ua::VariantTypeId::Boolean,
        ScalarType::SByte => ua::VariantTypeId::SByte,
        ScalarType::Byte => ua::VariantTypeId::Byte,
        ScalarType::Int16 => ua::VariantTypeId::Int16,
        ScalarType::UInt16 => ua::VariantTypeId::UInt16,
        ScalarType::Int32 => ua::VariantTypeId::Int32,
        ScalarType::UInt32 => ua::VariantTypeId::UInt32,
        ScalarType::Int64 => ua::VariantTypeId::Int64,
        ScalarType::UInt64 => ua::VariantTypeId::UInt64,
        ScalarType::Float => ua::VariantTypeId::Float,
        ScalarType::Double => ua::VariantTypeId::Double,
        ScalarType::String => ua::VariantTypeId::String,
        ScalarType::DateTime => ua::VariantTypeId::DateTime,
        ScalarType::ByteString => ua::VariantTypeId::ByteString,
    }
}

fn scalar_type(type_id: ua::VariantTypeId) -> Option<ScalarType> {
    Some(match type_id {
        ua::VariantTypeId::Boolean => ScalarType::Boolean,
        ua::VariantTypeId::SByte => ScalarType::SByte,
        ua::VariantTypeId::Byte => ScalarType::Byte,
        ua::VariantTypeId::Int16 => ScalarType::Int16,
        ua::VariantTypeId::UInt16 => ScalarType::UInt16,
        ua::VariantTypeId::Int32 => ScalarType::Int32,
        ua::VariantTypeId::UInt32 => ScalarType::UInt32,
        ua::VariantTypeId::Int64 => ScalarType::Int64,
        ua::VariantTypeId::UInt64 => ScalarType::UInt64,
        ua::VariantTypeId::Float => ScalarType::Float,
        ua::VariantTypeId::Double => ScalarType::Double,
        ua::VariantTypeId::String => ScalarType::String,
        ua::VariantTypeId::DateTime => ScalarType::DateTime,
        ua::VariantTypeId::ByteString => ScalarType::ByteString,
        _ => return None,
    })
}

fn encode_scalar(value: Scalar) -> Result<ua::Variant, StatusCode> {
    Ok(match value {
        Scalar::Boolean(v) => ua::Variant::Boolean(v),
        Scalar::SByte(v) => ua::Variant::SByte(v),
        Scalar::Byte(v) => ua::Variant::Byte(v),
        Scalar::Int16(v) => ua::Variant::Int16(v),
        Scalar::UInt16(v) => ua::Variant::UInt16(v),
        Scalar::Int32(v) => ua::Variant::Int32(v),
        Scalar::UInt32(v) => ua::Variant::UInt32(v),
        Scalar::Int64(v) => ua::Variant::Int64(v),
        Scalar::UInt64(v) => ua::Variant::UInt64(v),
        Scalar::Float(v) => ua::Variant::Float(v),
        Scalar::Double(v) => ua::Variant::Double(v),
        Scalar::String(bytes) => {
            let text = String::from_utf8(bytes).map_err(|_| StatusCode::BAD_ENCODING_ERROR)?;
            ua::Variant::String(ua::UAString::from(text))
        }
        Scalar::DateTime(v) => ua::Variant::DateTime(Box::new(ua::DateTime::from(v))),
        Scalar::ByteString(v) => ua::Variant::ByteString(ua::ByteString::from(v.as_slice())),
    })
}

fn encode(value: Variant) -> Result<ua::Variant, StatusCode> {
    match value {
        Variant::Empty => Ok(ua::Variant::Empty),
        Variant::Scalar(scalar) => encode_scalar(scalar),
        Variant::Array {
            element_type,
            values,
        } => {
            let values = values
                .into_iter()
                .map(encode_scalar)
                .collect::<Result<Vec<_>, _>>()?;
            let array = ua::Array::new(variant_type(element_type), values)
                .map_err(|_| StatusCode::BAD_ENCODING_ERROR)?;
            Ok(ua::Variant::Array(Box::new(array)))
        }
    }
}

fn decode_scalar(value: &ua::Variant) -> Option<Scalar> {
    Some(match value {
        ua::Variant::Boolean(v) => Scalar::Boolean(*v),
        ua::Variant::SByte(v) => Scalar::SByte(*v),
        ua::Variant::Byte(v) => Scalar::Byte(*v),
        ua::Variant::Int16(v) => Scalar::Int16(*v),
        ua::Variant::UInt16(v) => Scalar::UInt16(*v),
        ua::Variant::Int32(v) => Scalar::Int32(*v),
        ua::Variant::UInt32(v) => Scalar::UInt32(*v),
        ua::Variant::Int64(v) => Scalar::Int64(*v),
        ua::Variant::UInt64(v) => Scalar::UInt64(*v),
        ua::Variant::Float(v) => Scalar::Float(*v),
        ua::Variant::Double(v) => Scalar::Double(*v),
        ua::Variant::String(v) => Scalar::String(v.as_ref().as_bytes().to_vec()),
        ua::Variant::DateTime(v) => Scalar::DateTime(timestamp(v)),
        ua::Variant::ByteString(v) => Scalar::ByteString(v.value.clone().unwrap_or_default()),
        _ => return None,
    })
}

/// Values with no typed counterpart surface as `BadDataTypeIdUnknown`.
fn decode(value: &ua::Variant) -> Result<Variant, StatusCode> {
    match value {
        ua::Variant::Empty => Ok(Variant::Empty),
        ua::Variant::Array(array) => {
            let element_type =
                scalar_type(array.value_type).ok_or(StatusCode::BAD_DATA_TYPE_ID_UNKNOWN)?;
            let values = array
                .values
                .iter()
                .map(decode_scalar)
                .collect::<Option<Vec<_>>>()
                .ok_or(StatusCode::BAD_DATA_TYPE_ID_UNKNOWN)?;
            Ok(Variant::Array {
                element_type,
                values,
            })
        }
        other => decode_scalar(other)
            .map(Variant::Scalar)
            .ok_or(StatusCode::BAD_DATA_TYPE_ID_UNKNOWN),
    }
}

fn decode_data_value(value: &ua::DataValue) -> Result<Variant, StatusCode> {
    if let Some(code) = value.status {
        if code.is_bad() {
            return Err(status(code));
        }
    }
    match value.value {
        Some(ref variant) => decode(variant),
        None => Ok(Variant::Empty),
    }
}

fn read_request(address: &NodeAddress) -> ua::ReadValueId {
    ua::ReadValueId {
        node_id: node_id(address),
        attribute_id: ua::AttributeId::Value as u32,
        index_range: ua::UAString::null(),
        data_encoding: ua::QualifiedName::null(),
    }
}

// =============================================================================
// Session handover
// =============================================================================

/// Result of a blocking call that must be released if nobody claims it.
///
/// A connect future that is dropped (for instance by a timeout) detaches its
/// blocking task. When that task later finishes, the runtime drops its output
/// and the value is closed instead of leaking.
struct Handover<T: Send + 'static> {
    value: Option<T>,
    close: fn(T),
}

impl<T: Send + 'static> Handover<T> {
    fn new(value: T, close: fn(T)) -> Self {
        Self {
            value: Some(value),
            close,
        }
    }

    fn claim(mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T: Send + 'static> Drop for Handover<T> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        tracing::warn!("Releasing unclaimed OPC UA session");
        let close = self.close;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || close(value));
            }
            Err(_) => close(value),
        }
    }
}

fn close_session(session: Arc<OpcUaRwLock<Session>>) {
    session.read().disconnect();
}

// =============================================================================
// OpcUaStackEngine
// =============================================================================

struct StackChannel {
    session: Arc<OpcUaRwLock<Session>>,
    events: Arc<ChannelEvents>,
    runner: Mutex<Option<tokio::sync::oneshot::Sender<SessionCommand>>>,
    monitored: Arc<Mutex<HashMap<u32, (SubscriptionId, NodeAddress)>>>,
}

/// [`ProtocolEngine`] on top of the `opcua` crate's client.
pub struct OpcUaStackEngine {
    application_name: String,
    application_uri: String,
    session_timeout: Duration,
    channels: Mutex<HashMap<u64, Arc<StackChannel>>>,
    next_handle: AtomicU64,
}

impl OpcUaStackEngine {
    /// Creates an engine using the application identity and session timeout
    /// from `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            application_name: config.application_name.clone(),
            application_uri: config.application_uri.clone(),
            session_timeout: config.session_timeout,
            channels: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
        }
    }

    fn channel(&self, handle: ChannelHandle) -> Result<Arc<StackChannel>, StatusCode> {
        let channel = self
            .channels
            .lock()
            .get(&handle.id())
            .cloned()
            .ok_or(StatusCode::BAD_CONNECTION_CLOSED)?;
        channel.events.ensure_active()?;
        Ok(channel)
    }

    /// Runs a blocking session call on the blocking pool.
    async fn blocking<T, F>(channel: &StackChannel, call: F) -> Result<T, StatusCode>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T, ua::StatusCode> + Send + 'static,
    {
        let session = Arc::clone(&channel.session);
        tokio::task::spawn_blocking(move || {
            let session = session.read();
            call(&session)
        })
        .await
        .map_err(|_| StatusCode::BAD_INTERNAL_ERROR)?
        .map_err(status)
    }

    fn open_session(
        application_name: String,
        application_uri: String,
        session_timeout: Duration,
        endpoint_url: String,
    ) -> Result<Handover<Arc<OpcUaRwLock<Session>>>, StatusCode> {
        let mut client = ClientBuilder::new()
            .application_name(application_name)
            .application_uri(application_uri)
            .session_retry_limit(0)
            .session_timeout(session_timeout.as_millis() as u32)
            .trust_server_certs(true)
            .client()
            .ok_or(StatusCode::BAD_INTERNAL_ERROR)?;

        let endpoints = client
            .get_server_endpoints_from_url(endpoint_url.as_str())
            .map_err(status)?;

        let endpoint = endpoints
            .into_iter()
            .find(|e| {
                e.security_policy_uri.as_ref() == ua::SecurityPolicy::None.to_uri()
                    && e.security_mode == ua::MessageSecurityMode::None
            })
            .ok_or(StatusCode::BAD_SECURITY_CHECKS_FAILED)?;

        client
            .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
            .map(|session| Handover::new(session, close_session))
            .map_err(status)
    }
}

impl std::fmt::Debug for OpcUaStackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaStackEngine")
            .field("application_name", &self.application_name)
            .field("channels", &self.channels.lock().len())
            .finish()
    }
}

#[async_trait]
impl ProtocolEngine for OpcUaStackEngine {
    async fn connect(&self, endpoint_url: &str) -> Result<ChannelHandle, StatusCode> {
        let events = Arc::new(ChannelEvents::new(
            ChannelState::SecureChannelEstablished,
            SessionState::CreateRequested,
        ));

        tracing::info!(endpoint = %endpoint_url, "Connecting to OPC UA server");
        let session = tokio::task::spawn_blocking({
            let name = self.application_name.clone();
            let uri = self.application_uri.clone();
            let timeout = self.session_timeout;
            let url = endpoint_url.to_string();
            move || Self::open_session(name, uri, timeout, url)
        })
        .await
        .map_err(|_| StatusCode::BAD_INTERNAL_ERROR)??
        .claim()
        .ok_or(StatusCode::BAD_INTERNAL_ERROR)?;

        // `connect_to_endpoint` returns an activated session.
        events.transition(
            ChannelState::SecureChannelEstablished,
            SessionState::Activated,
            StatusCode::GOOD,
        );

        {
            let lost = Arc::clone(&events);
            session
                .write()
                .set_connection_status_callback(ConnectionStatusCallback::new(move |connected| {
                    if !connected {
                        lost.transition(
                            ChannelState::Disconnected,
                            SessionState::Closed,
                            StatusCode::BAD_CONNECTION_CLOSED,
                        );
                    }
                }));
        }

        let runner = Session::run_async(Arc::clone(&session));
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.channels.lock().insert(
            id,
            Arc::new(StackChannel {
                session,
                events,
                runner: Mutex::new(Some(runner)),
                monitored: Arc::new(Mutex::new(HashMap::new())),
            }),
        );

        tracing::info!(endpoint = %endpoint_url, channel = id, "Connected to OPC UA server");
        Ok(ChannelHandle::new(id))
    }

    async fn disconnect(&self, handle: ChannelHandle) {
        let Some(channel) = self.channels.lock().remove(&handle.id()) else {
            return;
        };

        if let Some(runner) = channel.runner.lock().take() {
            let _ = runner.send(SessionCommand::Stop);
        }

        if channel.events.is_open() {
            channel.events.transition(
                ChannelState::SecureChannelEstablished,
                SessionState::Closing,
                StatusCode::GOOD,
            );
            let session = Arc::clone(&channel.session);
            let _ = tokio::task::spawn_blocking(move || session.read().disconnect()).await;
            channel.events.transition(
                ChannelState::Disconnected,
                SessionState::Closed,
                StatusCode::GOOD,
            );
        }
        tracing::info!(channel = %handle, "Disconnected from OPC UA server");
    }

    async fn read_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        _expected: TypeTag,
    ) -> Result<Variant, StatusCode> {
        let channel = self.channel(handle)?;
        let request = read_request(address);
        tracing::trace!(address = %address, "Reading node value");

        let values = Self::blocking(&channel, move |session| {
            session.read(&[request], ua::TimestampsToReturn::Both, 0.0)
        })
        .await?;

        values
            .first()
            .ok_or(StatusCode::BAD_UNKNOWN_RESPONSE)
            .and_then(decode_data_value)
    }

    async fn read_batch(
        &self,
        handle: ChannelHandle,
        addresses: &[NodeAddress],
    ) -> Result<Vec<Result<Variant, StatusCode>>, StatusCode> {
        let channel = self.channel(handle)?;
        let requests: Vec<_> = addresses.iter().map(read_request).collect();
        tracing::trace!(count = addresses.len(), "Reading multiple node values");

        let values = Self::blocking(&channel, move |session| {
            session.read(&requests, ua::TimestampsToReturn::Both, 0.0)
        })
        .await?;

        Ok(values.iter().map(decode_data_value).collect())
    }

    async fn write_value(
        &self,
        handle: ChannelHandle,
        address: &NodeAddress,
        value: Variant,
    ) -> StatusCode {
        let writes = [(address.clone(), value)];
        match self.write_batch(handle, &writes).await {
            Ok(statuses) => statuses
                .first()
                .copied()
                .unwrap_or(StatusCode::BAD_UNKNOWN_RESPONSE),
            Err(status) => status,
        }
    }

    async fn write_batch(
        &self,
        handle: ChannelHandle,
        writes: &[(NodeAddress, Variant)],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let channel = self.channel(handle)?;
        let requests = writes
            .iter()
            .map(|(address, value)| {
                Ok(ua::WriteValue {
                    node_id: node_id(address),
                    attribute_id: ua::AttributeId::Value as u32,
                    index_range: ua::UAString::null(),
                    value: ua::DataValue::new_now(encode(value.clone())?),
                })
            })
            .collect::<Result<Vec<_>, StatusCode>>()?;
        tracing::trace!(count = writes.len(), "Writing node values");

        let statuses = Self::blocking(&channel, move |session| session.write(&requests)).await?;
        Ok(statuses.into_iter().map(status).collect())
    }

    fn on_session_state_changed(&self, handle: ChannelHandle, callback: StateCallback) {
        match self.channels.lock().get(&handle.id()) {
            Some(channel) => channel.events.set_state_callback(callback),
            None => callback(StateNotification {
                channel: ChannelState::Disconnected,
                session: SessionState::Closed,
                connect_status: StatusCode::BAD_CONNECTION_CLOSED,
            }),
        }
    }

    fn on_data_changed(&self, handle: ChannelHandle, callback: DataCallback) {
        if let Some(channel) = self.channels.lock().get(&handle.id()) {
            channel.events.set_data_callback(callback);
        }
    }

    fn current_state(&self, handle: ChannelHandle) -> (ChannelState, SessionState) {
        self.channels
            .lock()
            .get(&handle.id())
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
        let channel = self.channel(handle)?;
        let events = Arc::clone(&channel.events);
        let monitored = Arc::clone(&channel.monitored);
        let interval_ms = publishing_interval.as_millis() as f64;

        let id = Self::blocking(&channel, move |session| {
            session.create_subscription(
                interval_ms,
                10,
                30,
                0,
                0,
                true,
                DataChangeCallback::new(move |items| {
                    for item in items {
                        let Some((subscription_id, address)) =
                            monitored.lock().get(&item.id()).cloned()
                        else {
                            continue;
                        };
                        let data = item.last_value();
                        events.queue(RawDataChange {
                            subscription_id,
                            monitored_item_id: MonitoredItemId(item.id()),
                            address,
                            value: data
                                .value
                                .as_ref()
                                .and_then(|v| decode(v).ok())
                                .unwrap_or(Variant::Empty),
                            status: data.status.map(status).unwrap_or(StatusCode::GOOD),
                            source_timestamp: data.source_timestamp.as_ref().map(timestamp),
                            server_timestamp: data.server_timestamp.as_ref().map(timestamp),
                        });
                    }
                }),
            )
        })
        .await?;

        tracing::info!(subscription_id = id, "Created subscription");
        Ok(SubscriptionId(id))
    }

    async fn add_monitored_item(
        &self,
        handle: ChannelHandle,
        subscription: SubscriptionId,
        address: &NodeAddress,
    ) -> Result<MonitoredItemId, StatusCode> {
        let channel = self.channel(handle)?;
        let request = ua::MonitoredItemCreateRequest {
            item_to_monitor: read_request(address),
            monitoring_mode: ua::MonitoringMode::Reporting,
            requested_parameters: ua::MonitoringParameters {
                sampling_interval: SAMPLING_INTERVAL_MS,
                filter: ua::ExtensionObject::null(),
                queue_size: 10,
                discard_oldest: true,
                client_handle: 0,
            },
        };

        let results = Self::blocking(&channel, move |session| {
            session.create_monitored_items(
                subscription.0,
                ua::TimestampsToReturn::Both,
                &[request],
            )
        })
        .await?;

        let result = results.first().ok_or(StatusCode::BAD_UNKNOWN_RESPONSE)?;
        if result.status_code.is_bad() {
            return Err(status(result.status_code));
        }

        channel
            .monitored
            .lock()
            .insert(result.monitored_item_id, (subscription, address.clone()));
        Ok(MonitoredItemId(result.monitored_item_id))
    }

    async fn run_iterate(&self, handle: ChannelHandle, timeout: Duration) -> StatusCode {
        match self.channel(handle) {
            Ok(channel) => channel.events.pump(timeout).await,
            Err(status) => status,
        }
    }

    fn name(&self) -> &str {
        "opcua-stack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_bytes_survive_conversion() {
        let text = "Grüße 🌍";
        let wire = encode(Variant::Scalar(Scalar::String(text.as_bytes().to_vec()))).unwrap();
        let back = decode(&wire).unwrap();
        assert_eq!(back, Variant::Scalar(Scalar::String(text.as_bytes().to_vec())));
    }

    #[test]
    fn test_array_keeps_element_type() {
        let array = Variant::Array {
            element_type: ScalarType::Int32,
            values: Vec::new(),
        };
        let back = decode(&encode(array.clone()).unwrap()).unwrap();
        assert_eq!(back, array);
    }

    #[test]
    fn test_bad_data_value_status() {
        let mut value = ua::DataValue::null();
        value.status = Some(ua::StatusCode::BadNodeIdUnknown);
        assert_eq!(
            decode_data_value(&value),
            Err(StatusCode::BAD_NODE_ID_UNKNOWN)
        );
    }

    static RELEASED: AtomicU64 = AtomicU64::new(0);

    fn release(_: u32) {
        RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    static CLAIMED_RELEASED: AtomicU64 = AtomicU64::new(0);

    fn release_claimed(_: u32) {
        CLAIMED_RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_abandoned_session_is_released() {
        let slow_open = tokio::task::spawn_blocking(|| {
            std::thread::sleep(Duration::from_millis(100));
            Handover::new(7u32, release)
        });

        let outcome = tokio::time::timeout(Duration::from_millis(10), slow_open).await;
        assert!(outcome.is_err());

        for _ in 0..50 {
            if RELEASED.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_claimed_session_is_kept() {
        let opened = tokio::task::spawn_blocking(|| Handover::new(7u32, release_claimed))
            .await
            .unwrap();
        assert_eq!(opened.claim(), Some(7));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(CLAIMED_RELEASED.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA server"]
    async fn test_live_read() {
        let engine = OpcUaStackEngine::new(&ClientConfig::default());
        let handle = engine.connect("opc.tcp://127.0.0.1:4840").await.unwrap();
        let value = engine
            .read_value(
                handle,
                &NodeAddress::new(5, "byte_42"),
                TypeTag::scalar(crate::value::WireType::Byte),
            )
            .await
            .unwrap();
        assert_eq!(value, Variant::Scalar(Scalar::Byte(42)));
        engine.disconnect(handle).await;
    }
}
