// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `batch` and `multi-read` commands.

use serde_json::json;

use opcua_typed::{NodeAddress, TypedValue, UaResult};

use super::{emit, Client};
use crate::cli::{BatchArgs, Cli, MultiReadArgs};
use crate::config::Settings;
use crate::error::{BinError, BinResult};

/// Writes every name/value pair in a single request.
pub async fn batch(
    cli: &Cli,
    settings: &Settings,
    client: &mut Client,
    args: BatchArgs,
) -> BinResult<()> {
    if args.type_tag.is_array {
        return Err(BinError::input(format!(
            "batch writes take scalar values, not {}",
            args.type_tag
        )));
    }

    let values = args
        .values
        .iter()
        .map(|input| TypedValue::parse(args.type_tag, input))
        .collect::<UaResult<Vec<_>>>()?;

    client
        .multi_write_values(settings.namespace, &args.names, values.clone())
        .await?;

    let addresses = NodeAddress::in_namespace(settings.namespace, &args.names);
    let text = addresses
        .iter()
        .zip(&values)
        .map(|(address, value)| format!("{address} <- {value}"))
        .collect::<Vec<_>>()
        .join("\n");
    let elements: Vec<_> = addresses
        .iter()
        .zip(&values)
        .map(|(address, value)| json!({ "address": address.to_string(), "written": value }))
        .collect();

    emit(
        cli,
        text,
        json!({ "type": args.type_tag.to_string(), "elements": elements }),
    )
}

/// Reads every name in a single request, each as the type the server reports.
pub async fn multi_read(
    cli: &Cli,
    settings: &Settings,
    client: &mut Client,
    args: MultiReadArgs,
) -> BinResult<()> {
    let values = client.multi_read(settings.namespace, &args.names).await?;
    let addresses = NodeAddress::in_namespace(settings.namespace, &args.names);

    let text = addresses
        .iter()
        .zip(&values)
        .map(|(address, value)| format!("{address} = {value} ({})", value.type_tag()))
        .collect::<Vec<_>>()
        .join("\n");
    let elements: Vec<_> = addresses
        .iter()
        .zip(&values)
        .map(|(address, value)| {
            json!({
                "address": address.to_string(),
                "type": value.type_tag().to_string(),
                "value": value,
            })
        })
        .collect();

    emit(cli, text, json!({ "elements": elements }))
}
