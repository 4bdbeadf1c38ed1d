//! Push notification payloads and display options.
//!
//! Pass-through plumbing: payloads are parsed and handed to the platform's
//! notification display with a fixed icon/badge/vibration/action set.

use serde::Deserialize;

/// Background-sync tag the worker recognizes. The sync handler is a stub for
/// future deferred work.
pub const SYNC_TAG: &str = "background-sync";

/// Notification action that opens the application's root view.
pub const ACTION_EXPLORE: &str = "explore";
/// Notification action that just dismisses the notification.
pub const ACTION_CLOSE: &str = "close";

/// Inbound push payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
  pub title: String,
  pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
  pub icon: String,
}

/// Display options forwarded to the platform notification API.
#[derive(Debug, Clone)]
pub struct NotificationOptions {
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub actions: Vec<NotificationAction>,
}

impl NotificationOptions {
  /// Fixed configuration around a push payload's body.
  pub fn for_push(payload: &PushPayload) -> Self {
    Self {
      body: payload.body.clone(),
      icon: "/icon-192.png".to_string(),
      badge: "/icon-96.png".to_string(),
      vibrate: vec![100, 50, 100],
      actions: vec![
        NotificationAction {
          action: ACTION_EXPLORE.to_string(),
          title: "View Verse".to_string(),
          icon: "/icon-96.png".to_string(),
        },
        NotificationAction {
          action: ACTION_CLOSE.to_string(),
          title: "Close".to_string(),
          icon: "/icon-96.png".to_string(),
        },
      ],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_push_payload() {
    let payload: PushPayload =
      serde_json::from_str(r#"{"title":"Daily Verse","body":"A new verse is ready"}"#).unwrap();
    assert_eq!(payload.title, "Daily Verse");
    assert_eq!(payload.body, "A new verse is ready");
  }

  #[test]
  fn test_payload_missing_fields_fails() {
    assert!(serde_json::from_str::<PushPayload>(r#"{"title":"no body"}"#).is_err());
  }

  #[test]
  fn test_options_carry_fixed_configuration() {
    let payload = PushPayload {
      title: "t".to_string(),
      body: "b".to_string(),
    };
    let options = NotificationOptions::for_push(&payload);

    assert_eq!(options.body, "b");
    assert_eq!(options.icon, "/icon-192.png");
    assert_eq!(options.badge, "/icon-96.png");
    assert_eq!(options.vibrate, vec![100, 50, 100]);
    let actions: Vec<&str> = options.actions.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions, vec![ACTION_EXPLORE, ACTION_CLOSE]);
  }
}
