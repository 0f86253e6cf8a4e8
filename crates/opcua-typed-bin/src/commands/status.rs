// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `status-name` command.

use serde_json::json;

use opcua_typed::ErrorTranslator;

use super::emit;
use crate::cli::{Cli, StatusNameArgs};
use crate::error::BinResult;

/// Describes a status code and the error kind it maps to. Needs no server.
pub fn status_name(cli: &Cli, args: &StatusNameArgs) -> BinResult<()> {
    let code = args.code;
    let severity = if code.is_good() {
        "good"
    } else if code.is_uncertain() {
        "uncertain"
    } else {
        "bad"
    };
    let kind = code.is_bad().then(|| ErrorTranslator::classify(code));

    let mut text = format!("{code}\nSeverity: {severity}");
    if let Some(kind) = kind {
        text.push_str(&format!("\nError kind: {kind}"));
    }
    if !code.is_known() {
        text.push_str("\n(unknown code)");
    }

    emit(
        cli,
        text,
        json!({
            "code": code.bits(),
            "hex": format!("0x{:08X}", code.bits()),
            "name": code.name(),
            "known": code.is_known(),
            "severity": severity,
            "error_kind": kind,
        }),
    )
}
