// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.

use tokio::time::Instant;

use opcua_typed::DataChange;

use super::{address, Client};
use crate::cli::{Cli, OutputFormat, WatchArgs};
use crate::config::Settings;
use crate::error::BinResult;

/// Monitors the named nodes and prints every data change.
///
/// Runs until the duration elapses, Ctrl-C is pressed, or the connection
/// is lost.
pub async fn watch(
    cli: &Cli,
    settings: &Settings,
    client: &mut Client,
    args: WatchArgs,
) -> BinResult<()> {
    let output = cli.output;
    client.on_data_changed(move |change| print_change(output, change));

    let subscription = client.create_subscription().await?;
    for name in &args.names {
        client
            .add_monitored_item(subscription, &address(settings, name))
            .await?;
    }
    tracing::info!(
        subscription_id = %subscription,
        items = args.names.len(),
        "Watching for data changes"
    );

    let result = run_cycles(client, args.duration.map(|d| Instant::now() + d)).await;
    client.clear_data_changed_hook();
    result
}

async fn run_cycles(client: &mut Client, deadline: Option<Instant>) -> BinResult<()> {
    let cycle = client.config().monitoring_cycle;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(());
        }
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, stopping watch");
                return Ok(());
            }
            result = client.run_monitoring_cycle(cycle) => result?,
        }
    }
}

fn print_change(output: OutputFormat, change: &DataChange) {
    match output {
        OutputFormat::Text => {
            let at = change
                .source_timestamp
                .or(change.server_timestamp)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("{at} {} = {} ({})", change.address, change.value, change.status);
        }
        OutputFormat::Json => match serde_json::to_string(change) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::warn!(error = %error, "Could not render data change"),
        },
    }
}
