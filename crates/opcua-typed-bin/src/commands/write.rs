// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use serde_json::json;

use opcua_typed::TypedValue;

use super::{address, emit, Client};
use crate::cli::{Cli, WriteArgs};
use crate::config::Settings;
use crate::error::{BinError, BinResult};

/// Parses the input as the requested type and writes it.
///
/// Input that does not fit the type is rejected before anything is sent.
pub async fn write(
    cli: &Cli,
    settings: &Settings,
    client: &mut Client,
    args: WriteArgs,
) -> BinResult<()> {
    let address = address(settings, &args.name);
    let value = TypedValue::parse(args.type_tag, &args.value)
        .map_err(|e| BinError::from(e).with_context(format!("parsing value for {address}")))?;

    client.write_value(&address, value.clone()).await?;
    tracing::info!(address = %address, value = %value, "Value written");

    emit(
        cli,
        format!("{address} <- {value}"),
        json!({
            "address": address.to_string(),
            "type": value.type_tag().to_string(),
            "written": value,
        }),
    )
}
