// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `read`: Read one node as a given type
//! - `write`: Write one node from text input
//! - `batch`: Write several nodes of one namespace in a single request
//! - `multi-read`: Read several nodes in a single request
//! - `watch`: Print data changes of monitored nodes
//! - `state`: Connect and report the session state
//! - `status-name`: Describe a status code (offline)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use opcua_typed::{StatusCode, TypeTag};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Typed OPC UA client
///
/// Reads and writes OPC UA variables with strict type checking.
#[derive(Parser, Debug)]
#[command(
    name = "opcua-typed",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "Typed OPC UA reads, writes and subscriptions",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "OPCUA_TYPED_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server endpoint, e.g. opc.tcp://127.0.0.1:4840
    #[arg(short, long, env = "OPCUA_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Namespace index of the node identifiers
    #[arg(short, long, env = "OPCUA_NAMESPACE", global = true)]
    pub namespace: Option<u16>,

    /// Protocol engine to connect with (default: stack)
    #[arg(long, env = "OPCUA_ENGINE", global = true)]
    pub engine: Option<EngineKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "OPCUA_TYPED_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "OPCUA_TYPED_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Output format for command results
    #[arg(short, long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read one node
    ///
    /// The node must hold exactly the requested type and shape.
    Read(ReadArgs),

    /// Write one node
    ///
    /// The value is range-checked locally before anything is sent.
    Write(WriteArgs),

    /// Write several nodes in one request
    ///
    /// Every element is reported; any failed element fails the command.
    Batch(BatchArgs),

    /// Read several nodes in one request
    #[command(name = "multi-read")]
    MultiRead(MultiReadArgs),

    /// Print data changes of monitored nodes until interrupted
    Watch(WatchArgs),

    /// Connect and report the session state
    State,

    /// Describe a status code by name, hex or decimal value
    #[command(name = "status-name")]
    StatusName(StatusNameArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Node identifier within the namespace
    pub name: String,

    /// Expected type, e.g. byte, uint32, string, double[]
    #[arg(short = 't', long = "type")]
    pub type_tag: TypeTag,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Node identifier within the namespace
    pub name: String,

    /// Value to write; arrays are comma separated
    #[arg(allow_hyphen_values = true)]
    pub value: String,

    /// Type to write as, e.g. byte, uint32, string, double[]
    #[arg(short = 't', long = "type")]
    pub type_tag: TypeTag,
}

/// Arguments for the `batch` command.
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Scalar type shared by every element
    #[arg(short = 't', long = "type")]
    pub type_tag: TypeTag,

    /// Node identifiers
    #[arg(long = "name", required = true, num_args = 1..)]
    pub names: Vec<String>,

    /// Values, index-aligned with the names
    #[arg(long = "value", required = true, num_args = 1.., allow_hyphen_values = true)]
    pub values: Vec<String>,
}

/// Arguments for the `multi-read` command.
#[derive(Args, Debug, Clone)]
pub struct MultiReadArgs {
    /// Node identifiers
    #[arg(required = true)]
    pub names: Vec<String>,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Node identifiers to monitor
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Stop after this long (e.g. 30s, 5m); runs until Ctrl-C if omitted
    #[arg(short, long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub duration: Option<Duration>,
}

/// Arguments for the `status-name` command.
#[derive(Args, Debug, Clone)]
pub struct StatusNameArgs {
    /// Status code: BadTimeout, 0x800A0000 or 2148139008
    pub code: StatusCode,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Protocol engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineKind {
    /// In-process server with the reference test node set
    Simulated,
    /// Real server through the `opcua` crate (feature `opcua-stack`)
    Stack,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Returns the selected engine.
    ///
    /// The simulated engine is only used when asked for explicitly.
    pub fn effective_engine(&self) -> EngineKind {
        self.engine.unwrap_or(EngineKind::Stack)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use opcua_typed::WireType;

    use super::*;

    #[test]
    fn test_read_command() {
        let cli = Cli::parse_from(["opcua-typed", "read", "byte_42", "-t", "byte"]);
        if let Commands::Read(args) = cli.command {
            assert_eq!(args.name, "byte_42");
            assert_eq!(args.type_tag, TypeTag::scalar(WireType::Byte));
        } else {
            panic!("Expected Read command");
        }
    }

    #[test]
    fn test_array_type_tag() {
        let cli = Cli::parse_from(["opcua-typed", "write", "int32_array", "1,2,3", "-t", "int32[]"]);
        if let Commands::Write(args) = cli.command {
            assert_eq!(args.type_tag, TypeTag::array(WireType::Int32));
            assert_eq!(args.value, "1,2,3");
        } else {
            panic!("Expected Write command");
        }
    }

    #[test]
    fn test_negative_write_value() {
        let cli = Cli::parse_from(["opcua-typed", "write", "float_negative", "-1.5", "-t", "float"]);
        assert!(matches!(cli.command, Commands::Write(ref args) if args.value == "-1.5"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = Cli::try_parse_from(["opcua-typed", "read", "x", "-t", "decimal"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_command() {
        let cli = Cli::parse_from([
            "opcua-typed",
            "batch",
            "-t",
            "uint32",
            "--name",
            "uint32a",
            "uint32b",
            "--value",
            "1",
            "2",
        ]);
        if let Commands::Batch(args) = cli.command {
            assert_eq!(args.names, vec!["uint32a", "uint32b"]);
            assert_eq!(args.values, vec!["1", "2"]);
        } else {
            panic!("Expected Batch command");
        }
    }

    #[test]
    fn test_global_connection_args() {
        let cli = Cli::parse_from([
            "opcua-typed",
            "state",
            "-e",
            "opc.tcp://plc:4840",
            "-n",
            "3",
            "--engine",
            "simulated",
        ]);
        assert_eq!(cli.endpoint.as_deref(), Some("opc.tcp://plc:4840"));
        assert_eq!(cli.namespace, Some(3));
        assert_eq!(cli.effective_engine(), EngineKind::Simulated);
    }

    #[test]
    fn test_engine_defaults_to_stack() {
        let cli = Cli::parse_from(["opcua-typed", "state", "-e", "opc.tcp://plc:4840"]);
        assert_eq!(cli.engine, None);
        assert_eq!(cli.effective_engine(), EngineKind::Stack);
    }

    #[test]
    fn test_watch_duration() {
        let cli = Cli::parse_from(["opcua-typed", "watch", "uint32a", "-d", "2s"]);
        if let Commands::Watch(args) = cli.command {
            assert_eq!(args.duration, Some(Duration::from_secs(2)));
        } else {
            panic!("Expected Watch command");
        }
    }

    #[test]
    fn test_status_name_parses_hex() {
        let cli = Cli::parse_from(["opcua-typed", "status-name", "0x80340000"]);
        if let Commands::StatusName(args) = cli.command {
            assert_eq!(args.code, StatusCode::BAD_NODE_ID_UNKNOWN);
        } else {
            panic!("Expected StatusName command");
        }
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["opcua-typed", "state", "-q"]);
        assert_eq!(cli.effective_log_level(), "warn");
        let cli = Cli::parse_from(["opcua-typed", "state", "-v"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }
}
