// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcua-typed-bin
//!
//! Command-line client for typed OPC UA reads and writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │  cli.rs  │ │ config   │ │ logging  │
//!        └────┬─────┘ └────┬─────┘ └──────────┘
//!             └─────┬──────┘
//!            ┌──────▼──────┐
//!            │  commands   │
//!            └──────┬──────┘
//!            ┌──────▼──────┐
//!            │ opcua-typed │
//!            └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Read a byte
//! opcua-typed -e opc.tcp://127.0.0.1:4840 -n 5 read byte_42 -t byte
//!
//! # Write an array
//! opcua-typed write int32_array "[1, 2, 3]" -t "int32[]"
//!
//! # Batch write
//! opcua-typed batch -t uint32 --name uint32a uint32b --value 10 20
//!
//! # Watch data changes for a minute
//! opcua-typed watch uint32a uint32b -d 1m
//!
//! # Look up a status code
//! opcua-typed status-name 0x80340000
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use config::{CliConfig, Settings};
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
