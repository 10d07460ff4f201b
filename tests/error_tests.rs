// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io;

use arcana::error::ArcanaError;

#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let error: ArcanaError = io_error.into();

    match error {
        ArcanaError::Io(_) => {} // Expected
        _ => panic!("Expected Io error, got different error type"),
    }
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: ArcanaError = json_error.into();
    assert!(matches!(error, ArcanaError::Json(_)));
}

#[test]
fn test_transport_error_display() {
    let error = ArcanaError::Transport {
        status: 401,
        status_text: "Unauthorized".to_string(),
        detail: None,
    };
    assert_eq!(error.to_string(), "API request failed: 401 Unauthorized");
    assert!(error.is_configuration_related());

    let error = ArcanaError::Transport {
        status: 429,
        status_text: "Too Many Requests".to_string(),
        detail: Some("slow down".to_string()),
    };
    assert_eq!(
        error.to_string(),
        "API request failed: 429 Too Many Requests (slow down)"
    );
    assert!(!error.is_configuration_related());
}

#[test]
fn test_in_stream_error_is_verbatim() {
    let error = ArcanaError::InStream("rate limited".to_string());
    assert_eq!(error.to_string(), "rate limited");
}

#[test]
fn test_outcome_messages() {
    assert_eq!(
        ArcanaError::StreamUnavailable.to_string(),
        "Unable to read response stream"
    );
    assert_eq!(
        ArcanaError::EmptyResponse.to_string(),
        "The model returned no content"
    );
    assert_eq!(ArcanaError::Cancelled.to_string(), "cancelled");
}

#[test]
fn test_configuration_missing_points_at_config() {
    let message = ArcanaError::ConfigurationMissing.to_string();
    assert!(message.contains("configuration missing"));
    assert!(message.contains("arcana config set"));
    assert!(ArcanaError::ConfigurationMissing.is_configuration_related());
}
