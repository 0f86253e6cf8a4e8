// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed read and write integration tests.
//!
//! Most tests run against [`SimulatedEngine`], which serves the namespace 5
//! node set of the reference test server. The tests at the bottom need a
//! real server and are ignored by default.
//!
//! # Environment Variables
//!
//! - `OPCUA_TEST_ENDPOINT`: OPC UA server endpoint (default: opc.tcp://127.0.0.1:4840)
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p opcua-typed --test typed_access
//! cargo test -p opcua-typed --features opcua-stack --test typed_access -- --ignored
//! ```

use std::f64::consts::PI;

use opcua_typed::engine::{Scalar, SimulatedEngine, Variant, TEST_NAMESPACE};
use opcua_typed::{
    ClientConfig, ErrorKind, NodeAddress, StatusCode, TypedAccessClient, TypedValue, UaError,
    WireType,
};

// =============================================================================
// Test Configuration
// =============================================================================

const ENDPOINT: &str = "opc.tcp://127.0.0.1:4840";

fn node(name: &str) -> NodeAddress {
    NodeAddress::new(TEST_NAMESPACE, name)
}

async fn connect(engine: &SimulatedEngine) -> TypedAccessClient<SimulatedEngine> {
    let mut client = TypedAccessClient::new(engine.clone(), ClientConfig::default());
    client.connect(ENDPOINT).await.expect("simulated connect");
    client
}

// =============================================================================
// Scalars
// =============================================================================

#[tokio::test]
async fn test_read_seeded_scalars() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    assert_eq!(client.read::<u8>(&node("byte_42")).await.unwrap(), 42);
    assert_eq!(client.read::<u8>(&node("byte_max")).await.unwrap(), 255);
    assert!(client.read::<bool>(&node("true_var")).await.unwrap());
    assert!(!client.read::<bool>(&node("false_var")).await.unwrap());
    assert_eq!(client.read::<u32>(&node("uint32b")).await.unwrap(), 1000);
    assert_eq!(client.read::<u16>(&node("uint16c")).await.unwrap(), 200);
    assert_eq!(
        client.read::<String>(&node("string_hello")).await.unwrap(),
        "Hello World"
    );
}

#[tokio::test]
async fn test_byte_write_then_read() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;
    let address = node("byte_test");

    for value in 0..=u8::MAX {
        client.write(&address, value).await.unwrap();
        assert_eq!(client.read::<u8>(&address).await.unwrap(), value);
    }
    assert_eq!(engine.write_count(), 256);
}

#[tokio::test]
async fn test_out_of_range_input_never_reaches_server() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;
    let address = node("byte_test");

    let err = TypedValue::from_integer(WireType::Byte, 256).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueOutOfRange);
    assert_eq!(err.status_code(), StatusCode::BAD_OUT_OF_RANGE);

    let err = TypedValue::from_integer(WireType::Byte, -1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueOutOfRange);

    assert_eq!(engine.write_count(), 0);
    assert_eq!(client.read::<u8>(&address).await.unwrap(), 128);
}

#[tokio::test]
async fn test_string_round_trip_preserves_bytes() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;
    let address = node("string_test");

    assert_eq!(client.read::<String>(&node("string_empty")).await.unwrap(), "");

    for text in ["", "plain", "Grüße aus Köln", "🌍🚀 emoji", "line\nbreak\ttab"] {
        client.write(&address, text.to_string()).await.unwrap();
        let back = client.read::<String>(&address).await.unwrap();
        assert_eq!(back.as_bytes(), text.as_bytes());
    }
}

#[tokio::test]
async fn test_invalid_utf8_is_a_type_mismatch() {
    let engine = SimulatedEngine::new();
    engine.set_value(
        node("string_test"),
        Variant::Scalar(Scalar::String(vec![0x66, 0xff, 0x6f])),
    );
    let mut client = connect(&engine).await;

    let err = client.read::<String>(&node("string_test")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_floating_point_precision() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    let pi = client.read::<f64>(&node("double_pi")).await.unwrap();
    assert_eq!(pi, PI);

    let pi = client.read::<f32>(&node("float_pi")).await.unwrap();
    assert!((pi - 3.14159).abs() < 1e-5);

    let large = client.read::<f64>(&node("double_large")).await.unwrap();
    assert_eq!(large, 1.23456789e100);

    client.write(&node("double_zero"), PI).await.unwrap();
    let double_error = (client.read::<f64>(&node("double_zero")).await.unwrap() - PI).abs();
    assert!(double_error < 1e-15);

    client.write(&node("float_zero"), PI as f32).await.unwrap();
    let single = client.read::<f32>(&node("float_zero")).await.unwrap();
    let float_error = (f64::from(single) - PI).abs();
    assert!(float_error > double_error);
}

#[tokio::test]
async fn test_unknown_node() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    let err = client
        .read::<u8>(&NodeAddress::new(12, "byte_42"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeNotFound);
    assert_eq!(err.status_code(), StatusCode::BAD_NODE_ID_UNKNOWN);

    let err = client.write(&node("no_such_node"), 1u8).await.unwrap_err();
    assert!(matches!(err, UaError::NodeNotFound { ref address, .. } if address.identifier() == "no_such_node"));

    // Per-node failures keep the session.
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_access_rights() {
    let engine = SimulatedEngine::builder()
        .read_only(node("byte_42"))
        .unreadable(node("byte_zero"))
        .build();
    let mut client = connect(&engine).await;

    let err = client.write(&node("byte_42"), 1u8).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(client.read::<u8>(&node("byte_42")).await.unwrap(), 42);

    let err = client.read::<u8>(&node("byte_zero")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}

// =============================================================================
// Arrays
// =============================================================================

#[tokio::test]
async fn test_read_seeded_arrays() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    assert_eq!(
        client.read_array::<i32>(&node("int32_array")).await.unwrap(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(client
        .read_array::<i32>(&node("int32_array_empty"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        client.read_array::<bool>(&node("bool_array")).await.unwrap(),
        vec![true, false, true, true, false]
    );
    assert_eq!(
        client.read_array::<u8>(&node("byte_array")).await.unwrap(),
        vec![10, 20, 30, 40]
    );
}

#[tokio::test]
async fn test_array_write_then_read() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;
    let address = node("double_array");

    let values = vec![0.5, -1.25, PI];
    client.write_array(&address, values.clone()).await.unwrap();
    assert_eq!(client.read_array::<f64>(&address).await.unwrap(), values);

    client.write_array::<f64>(&address, Vec::new()).await.unwrap();
    assert!(client.read_array::<f64>(&address).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_array_shape_and_element_type_are_checked() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    let err = client.read_array::<u8>(&node("byte_42")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = client.read_array::<i64>(&node("int32_array")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = client
        .write_array(&node("uint32_array"), vec![1i32, 2])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(
        client.read_array::<u32>(&node("uint32_array")).await.unwrap(),
        vec![100, 200, 300]
    );
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_multi_write_then_read_back() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;
    let names = ["uint16a", "uint16b", "uint16c"];

    client
        .multi_write(TEST_NAMESPACE, &names, vec![7u16, 8, 9])
        .await
        .unwrap();

    let values = client.multi_read(TEST_NAMESPACE, &names).await.unwrap();
    assert_eq!(
        values,
        vec![
            TypedValue::UInt16(7),
            TypedValue::UInt16(8),
            TypedValue::UInt16(9)
        ]
    );
    assert_eq!(client.stats().batches(), 2);
}

#[tokio::test]
async fn test_multi_write_then_individual_reads() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    client
        .multi_write(TEST_NAMESPACE, &["uint32a", "uint32b", "uint32c"], vec![10u32, 20, 30])
        .await
        .unwrap();

    assert_eq!(client.read::<u32>(&node("uint32a")).await.unwrap(), 10);
    assert_eq!(client.read::<u32>(&node("uint32b")).await.unwrap(), 20);
    assert_eq!(client.read::<u32>(&node("uint32c")).await.unwrap(), 30);
}

#[tokio::test]
async fn test_arity_mismatch_writes_nothing() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    let err = client
        .multi_write(TEST_NAMESPACE, &["uint32a", "uint32b"], vec![1u32, 2, 3])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        UaError::ArityMismatch {
            names: 2,
            values: 3,
            status: StatusCode::BAD_INVALID_ARGUMENT,
        }
    );
    assert_eq!(engine.write_count(), 0);
    assert_eq!(client.read::<u32>(&node("uint32a")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;
    let names: [&str; 0] = [];

    client
        .multi_write::<u32, _>(TEST_NAMESPACE, &names, Vec::new())
        .await
        .unwrap();
    assert!(client.multi_read(TEST_NAMESPACE, &names).await.unwrap().is_empty());
    assert_eq!(engine.write_count(), 0);
}

#[tokio::test]
async fn test_partial_write_failure_lists_every_element() {
    let engine = SimulatedEngine::new();
    engine.fail_writes_for(node("uint32b"), StatusCode::BAD_NOT_WRITABLE);
    let mut client = connect(&engine).await;

    let err = client
        .multi_write(TEST_NAMESPACE, &["uint32a", "uint32b", "uint32c"], vec![5u32, 6, 7])
        .await
        .unwrap_err();

    match err {
        UaError::PartialWriteFailure {
            ref failures,
            ref committed,
            total,
            status,
        } => {
            assert_eq!(total, 3);
            assert_eq!(committed, &vec![0, 2]);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
            assert_eq!(failures[0].address, node("uint32b"));
            assert_eq!(status, StatusCode::BAD_NOT_WRITABLE);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Elements the server accepted stay written.
    assert_eq!(client.read::<u32>(&node("uint32a")).await.unwrap(), 5);
    assert_eq!(client.read::<u32>(&node("uint32b")).await.unwrap(), 1000);
    assert_eq!(client.read::<u32>(&node("uint32c")).await.unwrap(), 7);
}

#[tokio::test]
async fn test_multi_read_fails_on_any_bad_element() {
    let engine = SimulatedEngine::new();
    let mut client = connect(&engine).await;

    let err = client
        .multi_read(TEST_NAMESPACE, &["byte_42", "missing", "true_var"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeNotFound);
}

// =============================================================================
// Integration Tests (Requires OPC UA Server)
// =============================================================================

#[cfg(feature = "opcua-stack")]
mod live {
    use super::*;
    use opcua_typed::engine::OpcUaStackEngine;

    fn test_endpoint() -> String {
        std::env::var("OPCUA_TEST_ENDPOINT").unwrap_or_else(|_| ENDPOINT.to_string())
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA server"]
    async fn test_live_byte_round_trip() {
        let config = ClientConfig::default();
        let mut client = TypedAccessClient::new(OpcUaStackEngine::new(&config), config);
        client.connect(&test_endpoint()).await.unwrap();

        let address = node("byte_test");
        for value in [255u8, 0, 127] {
            client.write(&address, value).await.unwrap();
            assert_eq!(client.read::<u8>(&address).await.unwrap(), value);
        }

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA server"]
    async fn test_live_multi_write() {
        let config = ClientConfig::default();
        let mut client = TypedAccessClient::new(OpcUaStackEngine::new(&config), config);
        client.connect(&test_endpoint()).await.unwrap();

        let names = ["uint32a", "uint32b", "uint32c"];
        client
            .multi_write(TEST_NAMESPACE, &names, vec![1u32, 2, 3])
            .await
            .unwrap();
        assert_eq!(client.read::<u32>(&node("uint32c")).await.unwrap(), 3);

        client.disconnect().await.unwrap();
    }
}
