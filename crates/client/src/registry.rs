//! Model discovery with a TTL cache.

use crate::clock::Clock;
use acore::{ModelDescriptor, Provider, ProviderError, RegistryConfig, RemoteModel};
use parking_lot::RwLock;
use std::{cmp::Reverse, collections::HashSet, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::Instant};

/// Generation method a listed model must support.
const GENERATE_METHOD: &str = "generateContent";

struct Listing {
    fetched_at: Instant,
    models: Arc<[ModelDescriptor]>,
}

/// Caches the provider's model listing.
///
/// Reads go through a `RwLock` snapshot; refreshes are serialized by an
/// async mutex so concurrent callers share one fetch.
pub struct ModelRegistry<P> {
    provider: P,
    priority: Vec<String>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    listing: RwLock<Option<Listing>>,
    refresh: Mutex<()>,
}

impl<P: Provider> ModelRegistry<P> {
    /// Create a registry over `provider`.
    pub fn new(provider: P, config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            priority: config.priority.clone(),
            ttl: config.cache_ttl(),
            clock,
            listing: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// The sorted model list, fetched if the cache is missing or stale.
    ///
    /// When a refetch fails and an older listing exists, the older listing
    /// is returned.
    pub async fn list(&self) -> Result<Arc<[ModelDescriptor]>, ProviderError> {
        if let Some(models) = self.fresh() {
            return Ok(models);
        }
        let _guard = self.refresh.lock().await;
        if let Some(models) = self.fresh() {
            return Ok(models);
        }
        match self.fetch().await {
            Ok(models) => Ok(models),
            Err(err) => match self.listing.read().as_ref() {
                Some(stale) => {
                    tracing::warn!("model refresh failed, serving cached list: {err}");
                    Ok(stale.models.clone())
                }
                None => Err(err),
            },
        }
    }

    /// Fetch the listing regardless of the cache.
    pub async fn refresh(&self) -> Result<Arc<[ModelDescriptor]>, ProviderError> {
        let _guard = self.refresh.lock().await;
        self.fetch().await
    }

    /// Look up a model in the cache without touching the network.
    pub fn cached(&self, id: &str) -> Option<ModelDescriptor> {
        self.listing
            .read()
            .as_ref()?
            .models
            .iter()
            .find(|model| model.matches(id))
            .cloned()
    }

    /// Filter, resolve and order a raw listing.
    pub fn resolve(&self, remote: Vec<RemoteModel>) -> Vec<ModelDescriptor> {
        let mut seen = HashSet::new();
        let mut models: Vec<ModelDescriptor> = remote
            .into_iter()
            .filter(|model| {
                model.methods.is_empty() || model.methods.iter().any(|m| m == GENERATE_METHOD)
            })
            .map(RemoteModel::into_descriptor)
            .filter(|model| seen.insert(model.short_id().to_owned()))
            .collect();
        models.sort_by_cached_key(|model| {
            (
                self.rank(model),
                !model.supports_streaming,
                Reverse(model.token_limit),
                model.id.clone(),
            )
        });
        models
    }

    fn rank(&self, model: &ModelDescriptor) -> usize {
        self.priority
            .iter()
            .position(|id| model.matches(id))
            .unwrap_or(usize::MAX)
    }

    fn fresh(&self) -> Option<Arc<[ModelDescriptor]>> {
        let listing = self.listing.read();
        let listing = listing.as_ref()?;
        (self.clock.now() < listing.fetched_at + self.ttl).then(|| listing.models.clone())
    }

    async fn fetch(&self) -> Result<Arc<[ModelDescriptor]>, ProviderError> {
        let remote = self.provider.list_models().await?;
        let models: Arc<[ModelDescriptor]> = self.resolve(remote).into();
        tracing::debug!("model registry refreshed with {} models", models.len());
        *self.listing.write() = Some(Listing {
            fetched_at: self.clock.now(),
            models: models.clone(),
        });
        Ok(models)
    }
}
