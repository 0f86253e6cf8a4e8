// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection and session lifecycle tracking.
//!
//! The protocol engine drives every transition; [`SessionStateMachine`]
//! records what it reports, exposes it as an enum and a label, and fans
//! lifecycle events out to user hooks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::address::NodeAddress;
use crate::engine::{MonitoredItemId, RawDataChange, StateNotification, SubscriptionId};
use crate::status::StatusCode;
use crate::value::TypedValue;

// =============================================================================
// ChannelState / SessionState
// =============================================================================

/// State of the secure channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// No transport connection.
    #[default]
    Disconnected,

    /// Transport connected, secure channel not yet open.
    Connected,

    /// Secure channel open.
    SecureChannelEstablished,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::SecureChannelEstablished => write!(f, "SecureChannelEstablished"),
        }
    }
}

/// State of the session on top of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session.
    #[default]
    Closed,

    /// CreateSession sent.
    CreateRequested,

    /// Session created but not activated.
    Created,

    /// ActivateSession sent.
    ActivateRequested,

    /// Session active; reads and writes are allowed.
    Activated,

    /// CloseSession in progress.
    Closing,
}

impl SessionState {
    /// Returns `true` once the server has created the session.
    #[inline]
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Created | Self::ActivateRequested | Self::Activated)
    }

    /// Returns `true` if the session is active.
    #[inline]
    pub fn is_activated(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::CreateRequested => write!(f, "CreateRequested"),
            Self::Created => write!(f, "Created"),
            Self::ActivateRequested => write!(f, "ActivateRequested"),
            Self::Activated => write!(f, "Activated"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

// =============================================================================
// LifecyclePhase
// =============================================================================

/// Flattened view of channel and session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// No channel.
    #[default]
    Disconnected,
    /// Channel open, no session.
    ChannelOpen,
    /// Session creation requested.
    SessionCreateRequested,
    /// Session created.
    SessionCreated,
    /// Session activation requested.
    SessionActivateRequested,
    /// Session active.
    SessionActivated,
    /// Session closing.
    SessionClosing,
}

impl LifecyclePhase {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::ChannelOpen => "Channel open, no session",
            Self::SessionCreateRequested => "Session create requested",
            Self::SessionCreated => "Session created",
            Self::SessionActivateRequested => "Session activate requested",
            Self::SessionActivated => "Session activated",
            Self::SessionClosing => "Session closing",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// ClientState
// =============================================================================

/// Combined channel and session state plus the last connect status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClientState {
    /// Channel state.
    pub channel: ChannelState,
    /// Session state.
    pub session: SessionState,
    /// Status of the most recent connect attempt.
    pub connect_status: StatusCode,
}

impl ClientState {
    /// Returns the flattened lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        if self.channel == ChannelState::Disconnected {
            return LifecyclePhase::Disconnected;
        }
        match self.session {
            SessionState::Closed => LifecyclePhase::ChannelOpen,
            SessionState::CreateRequested => LifecyclePhase::SessionCreateRequested,
            SessionState::Created => LifecyclePhase::SessionCreated,
            SessionState::ActivateRequested => LifecyclePhase::SessionActivateRequested,
            SessionState::Activated => LifecyclePhase::SessionActivated,
            SessionState::Closing => LifecyclePhase::SessionClosing,
        }
    }

    /// Human-readable label of the current phase.
    pub fn label(&self) -> &'static str {
        self.phase().label()
    }

    /// Returns `true` if reads and writes are allowed.
    pub fn is_activated(&self) -> bool {
        self.channel != ChannelState::Disconnected && self.session.is_activated()
    }

    /// Returns `true` if the engine gave up on the connection.
    pub fn is_failed(&self) -> bool {
        self.channel == ChannelState::Disconnected && self.connect_status.is_bad()
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (channel: {}, session: {})",
            self.phase(),
            self.channel,
            self.session
        )
    }
}

impl From<StateNotification> for ClientState {
    fn from(notification: StateNotification) -> Self {
        Self {
            channel: notification.channel,
            session: notification.session,
            connect_status: notification.connect_status,
        }
    }
}

// =============================================================================
// DataChange
// =============================================================================

/// A decoded data change delivered to the data changed hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataChange {
    /// Node that changed.
    pub address: NodeAddress,
    /// New value.
    pub value: TypedValue,
    /// Value status.
    pub status: StatusCode,
    /// Owning subscription.
    pub subscription_id: SubscriptionId,
    /// Monitored item that fired.
    pub monitored_item_id: MonitoredItemId,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

/// Hook invoked once per session establishment.
pub type SessionCreatedHook = Box<dyn Fn(&ClientState) + Send + Sync>;

/// Hook invoked once per delivered data change.
pub type DataChangedHook = Box<dyn Fn(&DataChange) + Send + Sync>;

// =============================================================================
// SessionStateMachine
// =============================================================================

/// Records engine-reported state and dispatches lifecycle hooks.
///
/// # Hooks
///
/// Each hook kind has a single slot: registering again replaces the
/// previous hook. A slot's lock is held while its hook runs, so two
/// invocations of the same hook never overlap. Hooks run on the engine's
/// notification thread and must neither block nor call into the client.
///
/// # Generations
///
/// Every connect attempt starts a new generation. Notifications tagged with
/// an older generation are ignored, so a late callback from a torn-down
/// connection cannot overwrite the state of the current one.
pub struct SessionStateMachine {
    state: watch::Sender<ClientState>,
    generation: Mutex<u64>,
    on_session_created: Mutex<Option<SessionCreatedHook>>,
    on_data_changed: Mutex<Option<DataChangedHook>>,
    stats: SessionStats,
}

impl SessionStateMachine {
    /// Creates a state machine in the `Disconnected` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ClientState::default());
        Self {
            state,
            generation: Mutex::new(0),
            on_session_created: Mutex::new(None),
            on_data_changed: Mutex::new(None),
            stats: SessionStats::new(),
        }
    }

    /// Returns the latest recorded state.
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes every recorded state.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Returns the statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Installs the session created hook, replacing any previous one.
    pub fn set_session_created_hook(&self, hook: Option<SessionCreatedHook>) {
        *self.on_session_created.lock() = hook;
    }

    /// Installs the data changed hook, replacing any previous one.
    pub fn set_data_changed_hook(&self, hook: Option<DataChangedHook>) {
        *self.on_data_changed.lock() = hook;
    }

    /// Starts a new generation and returns its number.
    ///
    /// The recorded state is reset to `Disconnected`.
    pub fn begin_generation(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.replace(ClientState::default());
        *generation
    }

    /// Resets to `Disconnected` and invalidates the current generation.
    pub fn reset(&self) {
        self.begin_generation();
    }

    /// Records a state notification from the engine.
    pub fn apply(&self, generation: u64, notification: StateNotification) {
        let new_state = ClientState::from(notification);
        let old_state = {
            let current = self.generation.lock();
            if *current != generation {
                tracing::trace!(
                    generation,
                    current = *current,
                    "Ignoring state notification from a stale connection"
                );
                return;
            }
            self.replace(new_state)
        };

        let established = !old_state.session.is_established()
            && new_state.session.is_established()
            && new_state.channel != ChannelState::Disconnected;

        if established {
            self.stats.record_establishment();
            tracing::info!(state = %new_state, "OPC UA session created");

            if let Some(ref hook) = *self.on_session_created.lock() {
                hook(&new_state);
            }
        }
    }

    /// Decodes and dispatches a data change notification from the engine.
    pub fn deliver(&self, generation: u64, change: RawDataChange) {
        if *self.generation.lock() != generation {
            return;
        }

        let address = change.address;
        let value = match TypedValue::from_variant_any(change.value) {
            Ok(value) => value,
            Err(error) => {
                self.stats.record_dropped();
                tracing::warn!(
                    address = %address,
                    error = %error,
                    "Dropping data change with an unsupported value"
                );
                return;
            }
        };

        let change = DataChange {
            address,
            value,
            status: change.status,
            subscription_id: change.subscription_id,
            monitored_item_id: change.monitored_item_id,
            source_timestamp: change.source_timestamp,
            server_timestamp: change.server_timestamp,
        };

        tracing::trace!(
            address = %change.address,
            subscription_id = %change.subscription_id,
            monitored_item_id = %change.monitored_item_id,
            "Data change"
        );
        self.stats.record_notification();

        if let Some(ref hook) = *self.on_data_changed.lock() {
            hook(&change);
        }
    }

    fn replace(&self, new_state: ClientState) -> ClientState {
        let old_state = self.state.send_replace(new_state);
        if old_state != new_state {
            self.stats.record_transition();
            tracing::trace!(
                old_state = %old_state,
                new_state = %new_state,
                "Session state changed"
            );
        }
        old_state
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Lifecycle counters.
#[derive(Debug, Default)]
pub struct SessionStats {
    establishments: AtomicU64,
    transitions: AtomicU64,
    notifications: AtomicU64,
    dropped: AtomicU64,
}

impl SessionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_establishment(&self) {
        self.establishments.fetch_add(1, Ordering::Relaxed);
    }

    fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of sessions established.
    pub fn establishments(&self) -> u64 {
        self.establishments.load(Ordering::Relaxed)
    }

    /// Number of recorded state changes.
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Number of data changes dispatched.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Number of data changes dropped as undecodable.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;
    use crate::engine::{Scalar, Variant};

    fn notify(channel: ChannelState, session: SessionState) -> StateNotification {
        StateNotification {
            channel,
            session,
            connect_status: StatusCode::GOOD,
        }
    }

    fn walk_to_activated(machine: &SessionStateMachine, generation: u64) {
        use ChannelState::SecureChannelEstablished as Open;
        for session in [
            SessionState::Closed,
            SessionState::CreateRequested,
            SessionState::Created,
            SessionState::ActivateRequested,
            SessionState::Activated,
        ] {
            machine.apply(generation, notify(Open, session));
        }
    }

    #[test]
    fn test_phase_mapping() {
        let mut state = ClientState::default();
        assert_eq!(state.phase(), LifecyclePhase::Disconnected);
        assert_eq!(state.label(), "Disconnected");

        state.channel = ChannelState::SecureChannelEstablished;
        assert_eq!(state.phase(), LifecyclePhase::ChannelOpen);

        state.session = SessionState::Activated;
        assert_eq!(state.phase(), LifecyclePhase::SessionActivated);
        assert!(state.is_activated());

        // A session without a channel is not usable.
        state.channel = ChannelState::Disconnected;
        assert_eq!(state.phase(), LifecyclePhase::Disconnected);
        assert!(!state.is_activated());
    }

    #[test]
    fn test_session_created_fires_once_per_establishment() {
        let machine = SessionStateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        machine.set_session_created_hook(Some(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));

        let generation = machine.begin_generation();
        walk_to_activated(&machine, generation);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Replayed state does not fire again.
        machine.apply(
            generation,
            notify(ChannelState::SecureChannelEstablished, SessionState::Activated),
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A new connection is a new establishment.
        let generation = machine.begin_generation();
        walk_to_activated(&machine, generation);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(machine.stats().establishments(), 2);
    }

    #[test]
    fn test_hook_overwrite() {
        let machine = SessionStateMachine::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        machine.set_session_created_hook(Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        let counter = second.clone();
        machine.set_session_created_hook(Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let generation = machine.begin_generation();
        walk_to_activated(&machine, generation);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let machine = SessionStateMachine::new();
        let old = machine.begin_generation();
        let current = machine.begin_generation();

        walk_to_activated(&machine, old);
        assert_eq!(machine.state().phase(), LifecyclePhase::Disconnected);

        walk_to_activated(&machine, current);
        assert!(machine.state().is_activated());

        machine.reset();
        assert_eq!(machine.state(), ClientState::default());
    }

    #[test]
    fn test_data_change_dispatch() {
        let machine = SessionStateMachine::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        machine.set_data_changed_hook(Some(Box::new(move |change| {
            sink.lock().push(change.clone());
        })));

        let generation = machine.begin_generation();
        let raw = |value| RawDataChange {
            subscription_id: SubscriptionId(1),
            monitored_item_id: MonitoredItemId(7),
            address: NodeAddress::new(5, "uint32a"),
            value,
            status: StatusCode::GOOD,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        };

        machine.deliver(generation, raw(Variant::Scalar(Scalar::UInt32(42))));
        machine.deliver(generation, raw(Variant::Empty));
        machine.deliver(generation + 1, raw(Variant::Scalar(Scalar::UInt32(43))));

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].value, TypedValue::UInt32(42));
        assert_eq!(received[0].monitored_item_id, MonitoredItemId(7));
        assert_eq!(machine.stats().dropped(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_observes_latest() {
        let machine = SessionStateMachine::new();
        let mut rx = machine.subscribe();
        let generation = machine.begin_generation();
        walk_to_activated(&machine, generation);

        let state = rx.wait_for(|s| s.is_activated()).await.map(|s| *s).unwrap();
        assert_eq!(state.phase(), LifecyclePhase::SessionActivated);
    }
}
