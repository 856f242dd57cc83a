//! Bridges list queries to the transport through the shared cache.

use std::{sync::Arc, time::Duration};

use shared::domain::Resource;
use tracing::{debug, warn};

use crate::{
    cache::RemoteDataCache,
    error::TransportError,
    normalize::{normalize_list, ListResult},
    query::{CacheKey, ListQuery},
    transport::BackofficeApi,
};

pub type ListCache = RemoteDataCache<ListResult, TransportError>;

#[derive(Clone)]
pub struct DataFetchOrchestrator {
    api: Arc<dyn BackofficeApi>,
    cache: Arc<ListCache>,
}

impl DataFetchOrchestrator {
    pub fn new(api: Arc<dyn BackofficeApi>, stale_after: Duration) -> Self {
        Self::with_cache(api, Arc::new(ListCache::new(stale_after)))
    }

    /// Screens built on the same cache share loads and invalidations.
    pub fn with_cache(api: Arc<dyn BackofficeApi>, cache: Arc<ListCache>) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &Arc<dyn BackofficeApi> {
        &self.api
    }

    pub fn cache(&self) -> &Arc<ListCache> {
        &self.cache
    }

    /// Fetches and normalizes one page. Identical concurrent queries share a
    /// single request.
    pub async fn load(&self, query: &ListQuery) -> Result<ListResult, TransportError> {
        let key = query.cache_key();
        let resource = query.resource;
        let params = query.to_params();
        let api = Arc::clone(&self.api);
        self.cache
            .fetch(&key, move || async move {
                let body = api.fetch_list(resource, &params).await.map_err(|err| {
                    warn!(%resource, error = %err, "list request failed");
                    err
                })?;
                let result = normalize_list(resource, &body);
                debug!(%resource, rows = result.items.len(), total = result.total, "list loaded");
                Ok::<_, TransportError>(result)
            })
            .await
    }

    /// Marks every cached page of `resource` stale. Loads already in flight
    /// still resolve for their callers but are not stored.
    pub async fn invalidate_resource(&self, resource: Resource) -> usize {
        let prefix = CacheKey::resource_prefix(resource);
        let dropped = self.cache.invalidate(&prefix).await;
        debug!(%resource, dropped, "invalidated cached pages");
        dropped
    }
}
