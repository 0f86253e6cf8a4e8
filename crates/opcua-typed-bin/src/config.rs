// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! The file is optional TOML. Command-line flags and environment variables
//! override its values.
//!
//! ```toml
//! endpoint = "opc.tcp://127.0.0.1:4840"
//! namespace = 5
//!
//! [client]
//! application_name = "line-3 probe"
//! connect_timeout = "5s"
//! request_timeout = "2s"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use opcua_typed::config::validate_endpoint;
use opcua_typed::engine::TEST_NAMESPACE;
use opcua_typed::ClientConfig;

use crate::cli::Cli;
use crate::error::{BinError, BinResult};

/// Endpoint used when neither the file nor the flags name one.
pub const DEFAULT_ENDPOINT: &str = "opc.tcp://127.0.0.1:4840";

// =============================================================================
// CliConfig
// =============================================================================

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Server endpoint.
    pub endpoint: Option<String>,

    /// Namespace index of node identifiers.
    pub namespace: Option<u16>,

    /// Client settings.
    pub client: ClientConfig,
}

impl CliConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> BinResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BinError::io(e.to_string()).with_context(format!("reading {}", path.display()))
        })?;
        let config = Self::from_toml(&text)
            .map_err(|e| e.with_context(format!("loading {}", path.display())))?;
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(text: &str) -> BinResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BinError::config(e.to_string()))?;
        config.client.validate()?;
        if let Some(ref endpoint) = config.endpoint {
            validate_endpoint(endpoint)?;
        }
        Ok(config)
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Effective connection settings after merging file and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Server endpoint.
    pub endpoint: String,
    /// Namespace index of node identifiers.
    pub namespace: u16,
    /// Client settings.
    pub client: ClientConfig,
}

impl Settings {
    /// Resolves settings: flags, then file, then defaults.
    pub fn resolve(cli: &Cli) -> BinResult<Self> {
        let file = match cli.config {
            Some(ref path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Merges a loaded file with the flags.
    pub fn merge(cli: &Cli, file: CliConfig) -> BinResult<Self> {
        let endpoint = cli
            .endpoint
            .clone()
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        validate_endpoint(&endpoint)?;

        Ok(Self {
            endpoint,
            namespace: cli.namespace.or(file.namespace).unwrap_or(TEST_NAMESPACE),
            client: file.client,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use clap::Parser;

    use super::*;

    #[test]
    fn test_from_toml() {
        let config = CliConfig::from_toml(
            r#"
            endpoint = "opc.tcp://plc.local:4840"
            namespace = 2

            [client]
            connect_timeout = "3s"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("opc.tcp://plc.local:4840"));
        assert_eq!(config.namespace, Some(2));
        assert_eq!(config.client.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let err = CliConfig::from_toml(r#"endpoint = "http://plc:80""#).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(CliConfig::from_toml("endpont = \"opc.tcp://x:1\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespace = 7").unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.namespace, Some(7));
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn test_missing_file() {
        let err = CliConfig::load(Path::new("/nonexistent/opcua-typed.toml")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_flags_override_file() {
        let cli = Cli::parse_from(["opcua-typed", "state", "-n", "9"]);
        let file = CliConfig {
            endpoint: Some("opc.tcp://plc:4840".to_string()),
            namespace: Some(2),
            client: ClientConfig::default(),
        };

        let settings = Settings::merge(&cli, file).unwrap();
        assert_eq!(settings.endpoint, "opc.tcp://plc:4840");
        assert_eq!(settings.namespace, 9);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["opcua-typed", "state"]);
        let settings = Settings::merge(&cli, CliConfig::default()).unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.namespace, TEST_NAMESPACE);
    }
}
