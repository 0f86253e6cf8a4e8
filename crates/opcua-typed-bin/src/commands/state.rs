// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `state` command.

use serde_json::json;

use super::{emit, Client};
use crate::cli::Cli;
use crate::error::BinResult;

/// Reports the state of the freshly opened session.
pub fn state(cli: &Cli, client: &Client) -> BinResult<()> {
    let state = client.state();
    let stats = client.session().stats();

    let text = format!(
        "Endpoint: {}\nEngine: {}\nState: {}\nChannel: {}\nSession: {}\nConnect status: {}\nTransitions: {}",
        client.endpoint().unwrap_or_default(),
        client.engine().name(),
        state.label(),
        state.channel,
        state.session,
        state.connect_status,
        stats.transitions(),
    );

    emit(
        cli,
        text,
        json!({
            "endpoint": client.endpoint(),
            "engine": client.engine().name(),
            "label": state.label(),
            "state": state,
            "transitions": stats.transitions(),
            "establishments": stats.establishments(),
        }),
    )
}
