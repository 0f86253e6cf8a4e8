// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-channel notification plumbing shared by the engines.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{DataCallback, RawDataChange, StateCallback, StateNotification};
use crate::session::{ChannelState, SessionState};
use crate::status::StatusCode;

/// State, callbacks and the pending data change queue of one channel.
pub(crate) struct ChannelEvents {
    state: Mutex<StateNotification>,
    state_callback: Mutex<Option<StateCallback>>,
    data_callback: Mutex<Option<DataCallback>>,
    pending: Mutex<VecDeque<RawDataChange>>,
    wakeup: Notify,
}

impl ChannelEvents {
    pub(crate) fn new(channel: ChannelState, session: SessionState) -> Self {
        Self {
            state: Mutex::new(StateNotification {
                channel,
                session,
                connect_status: StatusCode::GOOD,
            }),
            state_callback: Mutex::new(None),
            data_callback: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
            wakeup: Notify::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> StateNotification {
        *self.state.lock()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.snapshot().channel != ChannelState::Disconnected
    }

    /// Resolves a channel whose session can serve requests.
    pub(crate) fn ensure_active(&self) -> Result<(), StatusCode> {
        let state = self.snapshot();
        if state.channel == ChannelState::Disconnected {
            return Err(StatusCode::BAD_CONNECTION_CLOSED);
        }
        if !state.session.is_activated() {
            return Err(StatusCode::BAD_SESSION_NOT_ACTIVATED);
        }
        Ok(())
    }

    /// Records a transition and reports it.
    ///
    /// The callback slot stays locked for the whole update, which keeps
    /// notifications for one channel ordered and non-overlapping.
    pub(crate) fn transition(&self, channel: ChannelState, session: SessionState, status: StatusCode) {
        let callback = self.state_callback.lock();
        let notification = {
            let mut state = self.state.lock();
            *state = StateNotification {
                channel,
                session,
                connect_status: status,
            };
            *state
        };
        if let Some(ref callback) = *callback {
            callback(notification);
        }
        if channel == ChannelState::Disconnected {
            self.wakeup.notify_one();
        }
    }

    /// Installs the state callback and replays the current state to it.
    pub(crate) fn set_state_callback(&self, callback: StateCallback) {
        let mut slot = self.state_callback.lock();
        callback(self.snapshot());
        *slot = Some(callback);
    }

    pub(crate) fn set_data_callback(&self, callback: DataCallback) {
        *self.data_callback.lock() = Some(callback);
    }

    pub(crate) fn queue(&self, change: RawDataChange) {
        self.pending.lock().push_back(change);
        self.wakeup.notify_one();
    }

    /// Delivers queued data changes, waiting up to `timeout` for the first.
    pub(crate) async fn pump(&self, timeout: Duration) -> StatusCode {
        let mut changes: Vec<_> = self.pending.lock().drain(..).collect();
        if changes.is_empty() {
            let _ = tokio::time::timeout(timeout, self.wakeup.notified()).await;
            if !self.is_open() {
                return StatusCode::BAD_CONNECTION_CLOSED;
            }
            changes = self.pending.lock().drain(..).collect();
        }

        let callback = self.data_callback.lock();
        if let Some(ref callback) = *callback {
            for change in changes {
                callback(change);
            }
        }
        StatusCode::GOOD
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::address::NodeAddress;
    use crate::engine::{MonitoredItemId, Scalar, SubscriptionId, Variant};

    fn change(value: i32) -> RawDataChange {
        RawDataChange {
            subscription_id: SubscriptionId(1),
            monitored_item_id: MonitoredItemId(1),
            address: NodeAddress::new(5, "x"),
            value: Variant::Scalar(Scalar::Int32(value)),
            status: StatusCode::GOOD,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    #[test]
    fn test_registration_replays_state() {
        let events = ChannelEvents::new(ChannelState::SecureChannelEstablished, SessionState::Created);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.set_state_callback(Box::new(move |n| sink.lock().push(n.session)));
        events.transition(
            ChannelState::SecureChannelEstablished,
            SessionState::Activated,
            StatusCode::GOOD,
        );
        assert_eq!(*seen.lock(), vec![SessionState::Created, SessionState::Activated]);
    }

    #[tokio::test]
    async fn test_pump_delivers_in_order() {
        let events = ChannelEvents::new(ChannelState::SecureChannelEstablished, SessionState::Activated);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.set_data_callback(Box::new(move |c| sink.lock().push(c.value)));

        events.queue(change(1));
        events.queue(change(2));
        assert_eq!(events.pump(Duration::from_millis(1)).await, StatusCode::GOOD);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[0], Variant::Scalar(Scalar::Int32(1)));
    }

    #[tokio::test]
    async fn test_pump_reports_closed_channel() {
        let events = ChannelEvents::new(ChannelState::SecureChannelEstablished, SessionState::Activated);
        events.transition(
            ChannelState::Disconnected,
            SessionState::Closed,
            StatusCode::BAD_CONNECTION_CLOSED,
        );
        assert_eq!(
            events.pump(Duration::from_millis(50)).await,
            StatusCode::BAD_CONNECTION_CLOSED
        );
        assert_eq!(events.ensure_active(), Err(StatusCode::BAD_CONNECTION_CLOSED));
    }
}
