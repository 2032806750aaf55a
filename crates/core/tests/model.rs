//! Tests for model metadata and the default token limit map.

use aistudio_core::{DEFAULT_TOKEN_FLOOR, ModelDescriptor, RemoteModel, default_token_limit};

#[test]
fn limit_gemini_15_pro() {
    assert_eq!(default_token_limit("gemini-1.5-pro-latest"), 2_097_152);
    assert_eq!(default_token_limit("models/gemini-1.5-pro-002"), 2_097_152);
}

#[test]
fn limit_gemini_flash_and_2x() {
    assert_eq!(default_token_limit("models/gemini-1.5-flash-latest"), 1_048_576);
    assert_eq!(default_token_limit("gemini-2.0-flash"), 1_048_576);
}

#[test]
fn limit_gemini_10() {
    assert_eq!(default_token_limit("models/gemini-pro"), 30_720);
    assert_eq!(default_token_limit("gemini-pro-vision"), 12_288);
}

#[test]
fn limit_unknown_defaults_to_floor() {
    assert_eq!(default_token_limit("text-bison-001"), DEFAULT_TOKEN_FLOOR);
    assert_eq!(default_token_limit(""), DEFAULT_TOKEN_FLOOR);
}

#[test]
fn descriptor_fills_missing_fields() {
    let descriptor = RemoteModel::new("models/mystery-model").into_descriptor();
    assert_eq!(descriptor.id, "models/mystery-model");
    assert_eq!(descriptor.display_name, "mystery-model");
    assert_eq!(descriptor.token_limit, DEFAULT_TOKEN_FLOOR);
    assert!(!descriptor.supports_streaming);
    assert!(!descriptor.supports_multimodal);
}

#[test]
fn descriptor_keeps_reported_fields() {
    let remote = RemoteModel {
        id: "models/gemini-1.5-flash".into(),
        display_name: Some("Gemini 1.5 Flash".into()),
        token_limit: Some(1_000),
        methods: vec!["generateContent".into()],
        supports_streaming: Some(true),
        supports_multimodal: Some(true),
    };
    let descriptor = remote.into_descriptor();
    assert_eq!(descriptor.display_name, "Gemini 1.5 Flash");
    assert_eq!(descriptor.token_limit, 1_000);
    assert!(descriptor.supports_streaming);
    assert!(descriptor.supports_multimodal);
}

#[test]
fn zero_token_limit_is_treated_as_unknown() {
    let remote = RemoteModel {
        token_limit: Some(0),
        ..RemoteModel::new("models/gemini-pro")
    };
    assert_eq!(remote.into_descriptor().token_limit, 30_720);
}

#[test]
fn matches_with_and_without_prefix() {
    let descriptor = ModelDescriptor {
        id: "models/gemini-1.5-flash".into(),
        display_name: "Flash".into(),
        token_limit: 10,
        supports_streaming: true,
        supports_multimodal: false,
    };
    assert!(descriptor.matches("gemini-1.5-flash"));
    assert!(descriptor.matches("models/gemini-1.5-flash"));
    assert!(!descriptor.matches("gemini-1.5-pro"));
    assert_eq!(descriptor.short_id(), "gemini-1.5-flash");
}
