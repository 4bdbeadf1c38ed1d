//! Install and activate: version deployment for the cache partitions.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CachePartitionStore;
use crate::http::Request;
use crate::net::Network;
use crate::platform::Platform;

/// Worker lifecycle states.
///
/// `Installing -> Installed (waiting) -> Activating -> Active`. A failed
/// install leaves the worker in `Installing`; the previous version keeps
/// serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Installing,
  Installed,
  Activating,
  Active,
}

/// Runs install (precache the static manifest) and activate (delete stale
/// partitions, claim clients) for one version.
pub struct LifecycleManager {
  store: Arc<dyn CachePartitionStore>,
  network: Arc<dyn Network>,
  static_partition: String,
  dynamic_partition: String,
  precache: Vec<String>,
}

impl LifecycleManager {
  pub fn new(
    store: Arc<dyn CachePartitionStore>,
    network: Arc<dyn Network>,
    static_partition: impl Into<String>,
    dynamic_partition: impl Into<String>,
    precache: Vec<String>,
  ) -> Self {
    Self {
      store,
      network,
      static_partition: static_partition.into(),
      dynamic_partition: dynamic_partition.into(),
      precache,
    }
  }

  /// Populate the static partition from the manifest. All-or-nothing: a
  /// single unfetchable URL fails the whole install and nothing activates.
  pub async fn install(&self) -> Result<()> {
    info!(
      partition = %self.static_partition,
      files = self.precache.len(),
      "caching static files"
    );

    self.store.open_partition(&self.static_partition)?;

    try_join_all(self.precache.iter().map(|url| self.precache_one(url))).await?;

    info!("static files cached");
    Ok(())
  }

  async fn precache_one(&self, url: &str) -> Result<()> {
    let request = Request::get(url);

    let response = self
      .network
      .fetch(&request)
      .await
      .map_err(|e| eyre!("Failed to precache {}: {}", url, e))?;

    if !response.ok() {
      return Err(eyre!("Failed to precache {}: status {}", url, response.status));
    }

    self.store.put(&self.static_partition, &request.key(), &response)
  }

  /// Delete every partition that does not belong to the current version,
  /// then claim all open clients. Per-partition delete failures are logged
  /// and deletion continues; an aggregate error is reported at the end.
  pub async fn activate(&self, platform: &dyn Platform) -> Result<()> {
    let mut failed = Vec::new();

    for name in self.store.list_partitions()? {
      if name == self.static_partition || name == self.dynamic_partition {
        continue;
      }

      info!(partition = %name, "deleting old cache partition");
      if let Err(error) = self.store.delete_partition(&name) {
        warn!(partition = %name, %error, "failed to delete partition");
        failed.push(name);
      }
    }

    if !failed.is_empty() {
      return Err(eyre!(
        "Failed to delete stale partitions: {}",
        failed.join(", ")
      ));
    }

    platform.claim_clients().await?;
    info!("activated");
    Ok(())
  }
}
