//! Tests for the model registry.

use acore::{ProviderError, ProviderErrorKind, RegistryConfig, RemoteModel};
use aistudio_client::{ManualClock, ModelRegistry, testing::ScriptedProvider};
use std::{sync::Arc, time::Duration};

fn remote(id: &str, limit: Option<u64>, streaming: bool) -> RemoteModel {
    RemoteModel {
        token_limit: limit,
        methods: vec!["generateContent".into()],
        supports_streaming: Some(streaming),
        ..RemoteModel::new(id)
    }
}

fn registry(
    provider: &ScriptedProvider,
    priority: &[&str],
) -> (ModelRegistry<ScriptedProvider>, ManualClock) {
    let clock = ManualClock::new();
    let config = RegistryConfig {
        priority: priority.iter().map(|id| id.to_string()).collect(),
        cache_ttl_secs: 300,
    };
    (
        ModelRegistry::new(provider.clone(), &config, Arc::new(clock.clone())),
        clock,
    )
}

#[tokio::test]
async fn sorts_priority_then_capability() {
    let provider = ScriptedProvider::new().with_models(vec![
        remote("models/small", Some(1_000), true),
        remote("models/batch", Some(9_000), false),
        remote("models/large", Some(5_000), true),
        remote("models/favourite", Some(10), false),
    ]);
    let (registry, _) = registry(&provider, &["favourite"]);
    let ids: Vec<_> = registry
        .list()
        .await
        .unwrap()
        .iter()
        .map(|m| m.short_id().to_owned())
        .collect();
    assert_eq!(ids, vec!["favourite", "large", "small", "batch"]);
}

#[tokio::test]
async fn skips_models_without_generation_and_fills_gaps() {
    let provider = ScriptedProvider::new().with_models(vec![
        RemoteModel {
            methods: vec!["embedContent".into()],
            ..RemoteModel::new("models/embedding-001")
        },
        RemoteModel::new("models/mystery"),
        remote("models/mystery", Some(1), true),
    ]);
    let (registry, _) = registry(&provider, &[]);
    let models = registry.list().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].display_name, "mystery");
    assert_eq!(models[0].token_limit, 8_192);
    assert!(!models[0].supports_streaming);
}

#[tokio::test]
async fn caches_until_the_ttl_expires() {
    let provider = ScriptedProvider::new().with_models(vec![remote("models/a", None, true)]);
    let (registry, clock) = registry(&provider, &[]);
    registry.list().await.unwrap();
    registry.list().await.unwrap();
    assert_eq!(provider.list_calls(), 1);

    clock.advance(Duration::from_secs(300));
    registry.list().await.unwrap();
    assert_eq!(provider.list_calls(), 2);

    registry.refresh().await.unwrap();
    assert_eq!(provider.list_calls(), 3);
    assert!(registry.cached("a").is_some());
    assert!(registry.cached("models/a").is_some());
    assert!(registry.cached("b").is_none());
}

#[tokio::test]
async fn stale_listing_survives_a_failed_refetch() {
    let provider = ScriptedProvider::new().with_models(vec![remote("models/a", None, true)]);
    let (registry, clock) = registry(&provider, &[]);
    registry.list().await.unwrap();

    provider.fail_listing(Some(ProviderError::new(ProviderErrorKind::Network, "down")));
    clock.advance(Duration::from_secs(600));
    assert_eq!(registry.list().await.unwrap().len(), 1);
    assert!(registry.refresh().await.is_err());
}

#[tokio::test]
async fn listing_error_without_cache_surfaces() {
    let provider = ScriptedProvider::new();
    provider.fail_listing(Some(ProviderError::status(401, "denied")));
    let (registry, _) = registry(&provider, &[]);
    let err = registry.list().await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Unauthorized);
}

#[tokio::test]
async fn concurrent_lists_share_one_fetch() {
    let provider = ScriptedProvider::new().with_models(vec![remote("models/a", None, true)]);
    let (registry, _) = registry(&provider, &[]);
    let (a, b) = tokio::join!(registry.list(), registry.list());
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(provider.list_calls(), 1);
}
