//! The worker: event-dispatch surface over router, strategies, and lifecycle.
//!
//! A host dispatch loop constructs one `Worker` per deployed version and
//! feeds it discrete events: install, activate, intercepted fetches, control
//! messages, sync, push, and notification clicks.

use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CachePartitionStore;
use crate::config::Config;
use crate::http::{Request, Response};
use crate::lifecycle::{LifecycleManager, WorkerState};
use crate::net::Network;
use crate::notify::{NotificationOptions, PushPayload, ACTION_EXPLORE, SYNC_TAG};
use crate::platform::Platform;
use crate::router::{RequestRouter, Route};
use crate::strategy::{CacheFirst, StaleWhileRevalidate};

/// Control message type that forces a waiting version to activate.
const SKIP_WAITING: &str = "SKIP_WAITING";

pub struct Worker {
  state: WorkerState,
  skip_waiting: bool,
  router: RequestRouter,
  swr: StaleWhileRevalidate,
  cache_first: CacheFirst,
  lifecycle: LifecycleManager,
  network: Arc<dyn Network>,
  platform: Arc<dyn Platform>,
}

impl Worker {
  pub fn new(
    config: &Config,
    store: Arc<dyn CachePartitionStore>,
    network: Arc<dyn Network>,
    platform: Arc<dyn Platform>,
  ) -> Result<Self> {
    let router = RequestRouter::new(&config.api_patterns)?;
    let swr = StaleWhileRevalidate::new(
      Arc::clone(&store),
      Arc::clone(&network),
      config.dynamic_partition(),
    );
    let cache_first = CacheFirst::new(
      Arc::clone(&store),
      Arc::clone(&network),
      config.static_partition(),
      config.fallback_document.clone(),
    );
    let lifecycle = LifecycleManager::new(
      store,
      Arc::clone(&network),
      config.static_partition(),
      config.dynamic_partition(),
      config.precache.clone(),
    );

    Ok(Self {
      state: WorkerState::Installing,
      skip_waiting: false,
      router,
      swr,
      cache_first,
      lifecycle,
      network,
      platform,
    })
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  /// Whether this version may activate without waiting for clients to close.
  pub fn skip_waiting(&self) -> bool {
    self.skip_waiting
  }

  /// Precache the static manifest. On success the worker becomes eligible
  /// for immediate activation; on failure it stays in `Installing` and the
  /// old version keeps serving.
  pub async fn install(&mut self) -> Result<()> {
    self.lifecycle.install().await?;
    self.skip_waiting = true;
    self.state = WorkerState::Installed;
    Ok(())
  }

  /// Delete stale partitions and take over clients.
  pub async fn activate(&mut self) -> Result<()> {
    self.state = WorkerState::Activating;
    self.lifecycle.activate(self.platform.as_ref()).await?;
    self.state = WorkerState::Active;
    Ok(())
  }

  /// Route an intercepted request to exactly one strategy, or pass it
  /// through to the network untouched.
  pub async fn handle_fetch(&self, request: &Request) -> Result<Response> {
    match self.router.route(request) {
      Route::Api => self.swr.handle(request).await,
      Route::Static => self.cache_first.handle(request).await,
      Route::PassThrough => self.network.fetch(request).await,
    }
  }

  /// Control channel: a `SKIP_WAITING` message forces a waiting version into
  /// activation. Everything else is ignored.
  pub async fn on_message(&mut self, message: &Value) -> Result<()> {
    if message.get("type").and_then(Value::as_str) != Some(SKIP_WAITING) {
      return Ok(());
    }

    self.skip_waiting = true;
    if self.state == WorkerState::Installed {
      self.activate().await?;
    }
    Ok(())
  }

  /// Background sync stub: recognized tags resolve immediately.
  pub async fn on_sync(&self, tag: &str) -> Result<()> {
    if tag == SYNC_TAG {
      info!("background sync triggered");
    }
    Ok(())
  }

  /// Parse a push payload and forward it to the platform notification
  /// display. Malformed payloads are dropped with a warning.
  pub async fn on_push(&self, payload: &[u8]) -> Result<()> {
    let payload: PushPayload = match serde_json::from_slice(payload) {
      Ok(payload) => payload,
      Err(error) => {
        warn!(%error, "ignoring malformed push payload");
        return Ok(());
      }
    };

    let options = NotificationOptions::for_push(&payload);
    self.platform.show_notification(&payload.title, &options).await
  }

  /// A notification click always dismisses the notification; the "explore"
  /// action additionally opens the application root.
  pub async fn on_notification_click(&self, action: &str) -> Result<()> {
    self.platform.close_notification().await?;

    if action == ACTION_EXPLORE {
      self.platform.open_window("/").await?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStore;
  use crate::http::Method;
  use crate::net::testing::FakeNetwork;
  use crate::platform::testing::{PlatformCall, RecordingPlatform};

  const API_URL: &str = "https://api.alquran.cloud/v1/ayah/random";

  fn config() -> Config {
    serde_yaml::from_str(
      r#"
name: app
version: "2.0.0"
origin: "https://app.example.com"
precache:
  - "/index.html"
api_patterns:
  - "^https://api\\.alquran\\.cloud/v1/ayah/random"
"#,
    )
    .unwrap()
  }

  struct Fixture {
    worker: Worker,
    store: Arc<MemoryStore>,
    network: Arc<FakeNetwork>,
    platform: Arc<RecordingPlatform>,
  }

  fn fixture(network: FakeNetwork) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let network = Arc::new(network);
    let platform = Arc::new(RecordingPlatform::new());
    let worker = Worker::new(
      &config(),
      Arc::clone(&store) as Arc<dyn CachePartitionStore>,
      Arc::clone(&network) as Arc<dyn Network>,
      Arc::clone(&platform) as Arc<dyn Platform>,
    )
    .unwrap();

    Fixture {
      worker,
      store,
      network,
      platform,
    }
  }

  fn ok(body: &str) -> Response {
    Response::new(200, "OK").with_body(body)
  }

  #[tokio::test]
  async fn test_install_then_activate_walks_the_state_machine() {
    let mut fx = fixture(FakeNetwork::new().respond("/index.html", ok("<html>")));

    assert_eq!(fx.worker.state(), WorkerState::Installing);
    assert!(!fx.worker.skip_waiting());

    fx.worker.install().await.unwrap();
    assert_eq!(fx.worker.state(), WorkerState::Installed);
    assert!(fx.worker.skip_waiting());

    fx.worker.activate().await.unwrap();
    assert_eq!(fx.worker.state(), WorkerState::Active);
    assert_eq!(fx.platform.calls(), vec![PlatformCall::ClaimClients]);
  }

  #[tokio::test]
  async fn test_failed_install_stays_in_installing() {
    // nothing scripted: the precache fetch fails
    let mut fx = fixture(FakeNetwork::new());
    assert!(fx.worker.install().await.is_err());
    assert_eq!(fx.worker.state(), WorkerState::Installing);
    assert!(!fx.worker.skip_waiting());
  }

  #[tokio::test]
  async fn test_fetch_dispatches_api_to_swr() {
    let fx = fixture(FakeNetwork::new().respond(API_URL, ok(r#"{"verse":1}"#)));

    let response = fx.worker.handle_fetch(&Request::get(API_URL)).await.unwrap();
    assert_eq!(response.body, br#"{"verse":1}"#);

    // cached in the dynamic partition
    let cached = fx
      .store
      .get("app-dynamic-v2.0.0", &Request::get(API_URL).key())
      .unwrap();
    assert!(cached.is_some());
  }

  #[tokio::test]
  async fn test_fetch_dispatches_get_to_cache_first() {
    let fx = fixture(FakeNetwork::new().respond("/style.css", ok("body {}")));

    fx.worker
      .handle_fetch(&Request::get("/style.css"))
      .await
      .unwrap();

    let cached = fx
      .store
      .get("app-static-v2.0.0", &Request::get("/style.css").key())
      .unwrap();
    assert!(cached.is_some());
  }

  #[tokio::test]
  async fn test_fetch_passes_through_non_get() {
    let fx = fixture(FakeNetwork::new().respond("/submit", ok("accepted")));

    let request = Request::get("/submit").with_method(Method::Post);
    let response = fx.worker.handle_fetch(&request).await.unwrap();
    assert_eq!(response.body, b"accepted");

    // pass-through never touches the cache
    assert!(fx.store.get_any(&request.key()).unwrap().is_none());
    assert_eq!(fx.network.call_count(), 1);
  }

  #[tokio::test]
  async fn test_skip_waiting_message_forces_activation() {
    let mut fx = fixture(FakeNetwork::new().respond("/index.html", ok("<html>")));
    fx.worker.install().await.unwrap();

    let message = serde_json::json!({ "type": "SKIP_WAITING" });
    fx.worker.on_message(&message).await.unwrap();
    assert_eq!(fx.worker.state(), WorkerState::Active);
  }

  #[tokio::test]
  async fn test_unrecognized_messages_are_ignored() {
    let mut fx = fixture(FakeNetwork::new().respond("/index.html", ok("<html>")));
    fx.worker.install().await.unwrap();

    for message in [
      serde_json::json!({ "type": "SOMETHING_ELSE" }),
      serde_json::json!({ "kind": "SKIP_WAITING" }),
      serde_json::json!(null),
    ] {
      fx.worker.on_message(&message).await.unwrap();
      assert_eq!(fx.worker.state(), WorkerState::Installed);
    }
  }

  #[tokio::test]
  async fn test_push_forwards_to_notification_display() {
    let fx = fixture(FakeNetwork::new());

    fx.worker
      .on_push(br#"{"title":"Daily Verse","body":"A new verse is ready"}"#)
      .await
      .unwrap();

    assert_eq!(
      fx.platform.calls(),
      vec![PlatformCall::ShowNotification {
        title: "Daily Verse".to_string(),
        body: "A new verse is ready".to_string(),
      }]
    );
  }

  #[tokio::test]
  async fn test_malformed_push_is_dropped() {
    let fx = fixture(FakeNetwork::new());
    fx.worker.on_push(b"not json").await.unwrap();
    assert!(fx.platform.calls().is_empty());
  }

  #[tokio::test]
  async fn test_notification_click_explore_opens_root() {
    let fx = fixture(FakeNetwork::new());

    fx.worker.on_notification_click("explore").await.unwrap();
    assert_eq!(
      fx.platform.calls(),
      vec![
        PlatformCall::CloseNotification,
        PlatformCall::OpenWindow("/".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn test_notification_click_close_only_dismisses() {
    let fx = fixture(FakeNetwork::new());

    fx.worker.on_notification_click("close").await.unwrap();
    assert_eq!(fx.platform.calls(), vec![PlatformCall::CloseNotification]);
  }

  #[tokio::test]
  async fn test_sync_resolves_immediately() {
    let fx = fixture(FakeNetwork::new());
    fx.worker.on_sync("background-sync").await.unwrap();
    fx.worker.on_sync("other-tag").await.unwrap();
  }
}
