// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! Every command except `status-name` opens one connection, does its work
//! and disconnects, also when the work failed.

mod batch;
mod read;
mod state;
mod status;
mod watch;
mod write;

pub use batch::{batch, multi_read};
pub use read::read;
pub use state::state;
pub use status::status_name;
pub use watch::watch;
pub use write::write;

use opcua_typed::engine::{ProtocolEngine, SimulatedEngine};
use opcua_typed::{NodeAddress, TypedAccessClient};

use crate::cli::{Cli, Commands, EngineKind, OutputFormat};
use crate::config::Settings;
use crate::error::{BinError, BinResult};

/// Client type used by the commands.
pub type Client = TypedAccessClient<Box<dyn ProtocolEngine>>;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    if let Commands::StatusName(ref args) = cli.command {
        return status::status_name(&cli, args);
    }

    let settings = Settings::resolve(&cli)?;
    let mut client = connect(&cli, &settings).await?;

    let result = match cli.command.clone() {
        Commands::Read(args) => read::read(&cli, &settings, &mut client, args).await,
        Commands::Write(args) => write::write(&cli, &settings, &mut client, args).await,
        Commands::Batch(args) => batch::batch(&cli, &settings, &mut client, args).await,
        Commands::MultiRead(args) => batch::multi_read(&cli, &settings, &mut client, args).await,
        Commands::Watch(args) => watch::watch(&cli, &settings, &mut client, args).await,
        Commands::State => state::state(&cli, &client),
        Commands::StatusName(_) => Ok(()),
    };

    client.disconnect().await?;
    result
}

/// Creates the selected engine.
pub fn engine_for(kind: EngineKind, settings: &Settings) -> BinResult<Box<dyn ProtocolEngine>> {
    match kind {
        EngineKind::Simulated => Ok(Box::new(SimulatedEngine::new())),
        #[cfg(feature = "opcua-stack")]
        EngineKind::Stack => Ok(Box::new(opcua_typed::engine::OpcUaStackEngine::new(
            &settings.client,
        ))),
        #[cfg(not(feature = "opcua-stack"))]
        EngineKind::Stack => {
            let _ = settings;
            Err(BinError::config(
                "engine 'stack' requires building with the opcua-stack feature",
            ))
        }
    }
}

async fn connect(cli: &Cli, settings: &Settings) -> BinResult<Client> {
    let engine = engine_for(cli.effective_engine(), settings)?;
    let mut client = TypedAccessClient::new(engine, settings.client.clone());
    client
        .connect(&settings.endpoint)
        .await
        .map_err(|e| BinError::from(e).with_context(format!("connecting to {}", settings.endpoint)))?;
    Ok(client)
}

fn address(settings: &Settings, name: &str) -> NodeAddress {
    NodeAddress::new(settings.namespace, name)
}

/// Prints a result in the selected output format.
fn emit(cli: &Cli, text: impl std::fmt::Display, json: serde_json::Value) -> BinResult<()> {
    match cli.output {
        OutputFormat::Text => println!("{text}"),
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&json)
                .map_err(|e| BinError::io(format!("rendering JSON output: {e}")))?;
            println!("{rendered}");
        }
    }
    Ok(())
}
