//! Host-side capabilities the worker calls back into.
//!
//! The original design reaches these through ambient globals; here they are
//! an injected trait so hosts (and tests) decide what claiming clients or
//! showing a notification actually means.

use async_trait::async_trait;
use color_eyre::Result;
use tracing::info;

use crate::notify::NotificationOptions;

#[async_trait]
pub trait Platform: Send + Sync {
  /// Take control of all currently open clients so their subsequent requests
  /// are intercepted by this worker version.
  async fn claim_clients(&self) -> Result<()>;

  /// Open the application at the given URL.
  async fn open_window(&self, url: &str) -> Result<()>;

  /// Display a notification.
  async fn show_notification(&self, title: &str, options: &NotificationOptions) -> Result<()>;

  /// Dismiss the currently displayed notification.
  async fn close_notification(&self) -> Result<()>;
}

/// Platform that only logs; used by the CLI host, which has no window or
/// notification surface.
pub struct LoggingPlatform;

#[async_trait]
impl Platform for LoggingPlatform {
  async fn claim_clients(&self) -> Result<()> {
    info!("claiming clients");
    Ok(())
  }

  async fn open_window(&self, url: &str) -> Result<()> {
    info!(%url, "open window requested");
    Ok(())
  }

  async fn show_notification(&self, title: &str, options: &NotificationOptions) -> Result<()> {
    info!(%title, body = %options.body, "notification");
    Ok(())
  }

  async fn close_notification(&self) -> Result<()> {
    Ok(())
  }
}
