//! Retrieval strategies: stale-while-revalidate and cache-first.

use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::cache::CachePartitionStore;
use crate::http::{Method, Request, RequestKey, RequestMode, Response};
use crate::net::Network;

/// Stale-while-revalidate against the dynamic partition.
///
/// A cache hit is returned immediately; a detached task refreshes the entry
/// in the background and its errors are discarded. A miss waits on the
/// network, caching only 2xx responses, and degrades to a synthesized 503
/// when the transport fails.
pub struct StaleWhileRevalidate {
  store: Arc<dyn CachePartitionStore>,
  network: Arc<dyn Network>,
  partition: String,
}

impl StaleWhileRevalidate {
  pub fn new(
    store: Arc<dyn CachePartitionStore>,
    network: Arc<dyn Network>,
    partition: impl Into<String>,
  ) -> Self {
    Self {
      store,
      network,
      partition: partition.into(),
    }
  }

  pub async fn handle(&self, request: &Request) -> Result<Response> {
    let key = request.key();

    if let Some(cached) = self.store.get(&self.partition, &key)? {
      debug!(url = %request.url, "serving cached API response");
      self.spawn_revalidation(request.clone());
      return Ok(cached.response);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.ok() {
          self.store.put(&self.partition, &key, &response)?;
        }
        Ok(response)
      }
      Err(error) => {
        debug!(url = %request.url, %error, "network failed with no cached response");
        Ok(Response::network_fallback())
      }
    }
  }

  /// Fire-and-forget refresh. The caller already holds the stale response;
  /// failures here are swallowed after a debug log. The task owns Arc clones
  /// of the store and network, so it cannot outlive either.
  fn spawn_revalidation(&self, request: Request) {
    let store = Arc::clone(&self.store);
    let network = Arc::clone(&self.network);
    let partition = self.partition.clone();

    tokio::spawn(async move {
      match network.fetch(&request).await {
        Ok(response) if response.ok() => {
          if let Err(error) = store.put(&partition, &request.key(), &response) {
            debug!(url = %request.url, %error, "failed to refresh cached entry");
          }
        }
        // Non-2xx responses never overwrite the cached entry
        Ok(_) => {}
        Err(error) => {
          debug!(url = %request.url, %error, "background revalidation failed");
        }
      }
    });
  }
}

/// Cache-first with network fallback-and-populate, for the static partition.
pub struct CacheFirst {
  store: Arc<dyn CachePartitionStore>,
  network: Arc<dyn Network>,
  partition: String,
  fallback_document: String,
}

impl CacheFirst {
  pub fn new(
    store: Arc<dyn CachePartitionStore>,
    network: Arc<dyn Network>,
    partition: impl Into<String>,
    fallback_document: impl Into<String>,
  ) -> Self {
    Self {
      store,
      network,
      partition: partition.into(),
      fallback_document: fallback_document.into(),
    }
  }

  pub async fn handle(&self, request: &Request) -> Result<Response> {
    // The lookup spans every partition, not just the static one.
    if let Some(cached) = self.store.get_any(&request.key())? {
      debug!(url = %request.url, "serving cached static file");
      return Ok(cached.response);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        // Don't cache non-successful responses
        if response.ok() {
          self.store.put(&self.partition, &request.key(), &response)?;
        }
        Ok(response)
      }
      Err(error) => {
        debug!(url = %request.url, "network failed for static request");

        // Offline navigations get the cached fallback document
        if request.mode == RequestMode::Navigate {
          let fallback = RequestKey::of(Method::Get, &self.fallback_document);
          if let Some(cached) = self.store.get_any(&fallback)? {
            return Ok(cached.response);
          }
        }

        Err(error)
      }
    }
  }
}
