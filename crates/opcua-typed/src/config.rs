// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// URL scheme accepted for endpoints.
pub const ENDPOINT_SCHEME: &str = "opc.tcp://";

// =============================================================================
// ClientConfig
// =============================================================================

/// Settings for [`TypedAccessClient`](crate::TypedAccessClient).
///
/// Durations use human-readable form when (de)serialized, e.g. `"10s"`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use opcua_typed::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .connect_timeout(Duration::from_secs(5))
///     .request_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.connect_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI announced to the server.
    #[serde(default = "default_application_uri")]
    pub application_uri: String,

    /// Deadline for channel open plus session activation.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Deadline for a single read or write round trip.
    #[serde(default = "default_request_timeout")]
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Session timeout requested from the server.
    #[serde(default = "default_session_timeout")]
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Publishing interval for subscriptions.
    #[serde(default = "default_publishing_interval")]
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// How long one monitoring cycle waits for notifications.
    #[serde(default = "default_monitoring_cycle")]
    #[serde(with = "humantime_serde")]
    pub monitoring_cycle: Duration,
}

fn default_application_name() -> String {
    "opcua-typed client".to_string()
}

fn default_application_uri() -> String {
    "urn:opcua-typed:client".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_monitoring_cycle() -> Duration {
    Duration::from_millis(1000)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            application_uri: default_application_uri(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            session_timeout: default_session_timeout(),
            publishing_interval: default_publishing_interval(),
            monitoring_cycle: default_monitoring_cycle(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::missing_field("application_name"));
        }

        for (field, value) in [
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
            ("session_timeout", self.session_timeout),
            ("publishing_interval", self.publishing_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        Ok(())
    }
}

/// Checks that `endpoint` is an `opc.tcp://host[:port][/path]` URL.
pub fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let rest = endpoint
        .strip_prefix(ENDPOINT_SCHEME)
        .ok_or_else(|| ConfigError::invalid_endpoint(endpoint, "Endpoint must start with opc.tcp://"))?;

    let authority = rest.split('/').next().unwrap_or_default();
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };

    if host.is_empty() {
        return Err(ConfigError::invalid_endpoint(endpoint, "missing host"));
    }

    if let Some(port) = port {
        port.parse::<u16>()
            .map_err(|_| ConfigError::invalid_endpoint(endpoint, format!("invalid port '{port}'")))?;
    }

    Ok(())
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    application_name: Option<String>,
    application_uri: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    session_timeout: Option<Duration>,
    publishing_interval: Option<Duration>,
    monitoring_cycle: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.application_uri = Some(uri.into());
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the subscription publishing interval.
    pub fn publishing_interval(mut self, interval: Duration) -> Self {
        self.publishing_interval = Some(interval);
        self
    }

    /// Sets the monitoring cycle length.
    pub fn monitoring_cycle(mut self, cycle: Duration) -> Self {
        self.monitoring_cycle = Some(cycle);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            application_name: self.application_name.unwrap_or(defaults.application_name),
            application_uri: self.application_uri.unwrap_or(defaults.application_uri),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            session_timeout: self.session_timeout.unwrap_or(defaults.session_timeout),
            publishing_interval: self
                .publishing_interval
                .unwrap_or(defaults.publishing_interval),
            monitoring_cycle: self.monitoring_cycle.unwrap_or(defaults.monitoring_cycle),
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================
