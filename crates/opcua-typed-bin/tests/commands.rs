// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end command tests against the simulated engine.

use std::io::Write;

use clap::Parser;

use opcua_typed_bin::{commands, BinError, Cli};

async fn run(args: &[&str]) -> Result<(), BinError> {
    let mut argv = vec!["opcua-typed", "--engine", "simulated", "-q"];
    argv.extend_from_slice(args);
    commands::execute(Cli::parse_from(argv)).await
}

fn exit_code(result: Result<(), BinError>) -> i32 {
    result.err().map(|e| e.exit_code()).unwrap_or(0)
}

#[tokio::test]
async fn test_read_and_write() {
    assert_eq!(exit_code(run(&["read", "byte_42", "-t", "byte"]).await), 0);
    assert_eq!(exit_code(run(&["write", "byte_test", "200", "-t", "byte"]).await), 0);
    assert_eq!(
        exit_code(run(&["write", "double_array", "[1.5, -2.5]", "-t", "double[]"]).await),
        0
    );
}

#[tokio::test]
async fn test_type_mismatch_exit_code() {
    assert_eq!(exit_code(run(&["read", "byte_42", "-t", "int32"]).await), 12);
}

#[tokio::test]
async fn test_out_of_range_input_exit_code() {
    assert_eq!(exit_code(run(&["write", "byte_test", "256", "-t", "byte"]).await), 12);
}

#[tokio::test]
async fn test_unknown_node_exit_code() {
    assert_eq!(
        exit_code(run(&["-n", "12", "read", "byte_42", "-t", "byte"]).await),
        11
    );
}

#[tokio::test]
async fn test_batch_commands() {
    let ok = run(&[
        "batch", "-t", "uint32", "--name", "uint32a", "uint32b", "uint32c", "--value", "1", "2",
        "3",
    ])
    .await;
    assert_eq!(exit_code(ok), 0);

    let mismatch = run(&["batch", "-t", "uint32", "--name", "uint32a", "uint32b", "--value", "1"]).await;
    assert_eq!(exit_code(mismatch), 12);

    let arrays = run(&["batch", "-t", "uint32[]", "--name", "uint32a", "--value", "1"]).await;
    assert_eq!(exit_code(arrays), 2);

    let read = run(&["multi-read", "byte_42", "string_hello", "int32_array"]).await;
    assert_eq!(exit_code(read), 0);
}

#[tokio::test]
async fn test_state_and_status_name() {
    assert_eq!(exit_code(run(&["state"]).await), 0);
    assert_eq!(exit_code(run(&["-o", "json", "state"]).await), 0);
    assert_eq!(exit_code(run(&["status-name", "BadNodeIdUnknown"]).await), 0);
}

#[tokio::test]
async fn test_watch_with_duration() {
    let result = run(&["watch", "uint32a", "-d", "50ms"]).await;
    assert_eq!(exit_code(result), 0);
}

#[tokio::test]
async fn test_config_file_supplies_namespace() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "namespace = 12").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let result = run(&["-c", path.as_str(), "read", "byte_42", "-t", "byte"]).await;
    assert_eq!(exit_code(result), 11);
}

#[tokio::test]
async fn test_invalid_endpoint_is_a_config_error() {
    let result = run(&["-e", "tcp://127.0.0.1:4840", "state"]).await;
    assert_eq!(exit_code(result), 1);
}

#[tokio::test]
async fn test_write_without_engine_flag_never_fakes_success() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[client]\nconnect_timeout = \"300ms\"").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let cli = Cli::parse_from([
        "opcua-typed",
        "-q",
        "-c",
        path.as_str(),
        "-e",
        "opc.tcp://192.0.2.1:4840",
        "write",
        "byte_test",
        "200",
        "-t",
        "byte",
    ]);
    let result = commands::execute(cli).await;
    assert_ne!(exit_code(result), 0);
}

#[cfg(not(feature = "opcua-stack"))]
#[tokio::test]
async fn test_stack_engine_requires_feature() {
    let cli = Cli::parse_from(["opcua-typed", "--engine", "stack", "state"]);
    let result = commands::execute(cli).await;
    assert_eq!(exit_code(result), 1);
}
