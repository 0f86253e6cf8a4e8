// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use serde_json::json;

use super::{address, emit, Client};
use crate::cli::{Cli, ReadArgs};
use crate::config::Settings;
use crate::error::BinResult;

/// Reads one node as the requested type.
pub async fn read(
    cli: &Cli,
    settings: &Settings,
    client: &mut Client,
    args: ReadArgs,
) -> BinResult<()> {
    let address = address(settings, &args.name);
    let value = client.read_value(&address, args.type_tag).await?;

    emit(
        cli,
        format!("{address} = {value} ({})", value.type_tag()),
        json!({
            "address": address.to_string(),
            "type": value.type_tag().to_string(),
            "value": value,
        }),
    )
}
