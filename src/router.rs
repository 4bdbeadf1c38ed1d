//! Request classification: which retrieval strategy handles a request.

use color_eyre::{eyre::eyre, Result};
use regex::RegexSet;

use crate::http::{Method, Request};

/// Handling path for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Dynamic/API request: stale-while-revalidate against the dynamic partition.
  Api,
  /// Everything else that is a GET: cache-first against the static partition.
  Static,
  /// Not intercepted; forwarded to the network unmodified.
  PassThrough,
}

pub struct RequestRouter {
  api_patterns: RegexSet,
}

impl RequestRouter {
  pub fn new(patterns: &[String]) -> Result<Self> {
    let api_patterns =
      RegexSet::new(patterns).map_err(|e| eyre!("Invalid API classification pattern: {}", e))?;

    Ok(Self { api_patterns })
  }

  /// Classify a request. Any pattern match wins regardless of order; exactly
  /// one route comes back.
  pub fn route(&self, request: &Request) -> Route {
    if self.api_patterns.is_match(&request.url) {
      Route::Api
    } else if request.method == Method::Get {
      Route::Static
    } else {
      Route::PassThrough
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn router() -> RequestRouter {
    RequestRouter::new(&[
      r"^https://api\.alquran\.cloud/v1/ayah/random".to_string(),
      r"^https://api\.example\.com/v2/".to_string(),
    ])
    .unwrap()
  }

  #[test]
  fn test_api_pattern_match_routes_to_api() {
    let request = Request::get("https://api.alquran.cloud/v1/ayah/random/en.asad");
    assert_eq!(router().route(&request), Route::Api);
  }

  #[test]
  fn test_any_pattern_wins() {
    let request = Request::get("https://api.example.com/v2/verses");
    assert_eq!(router().route(&request), Route::Api);
  }

  #[test]
  fn test_plain_get_routes_to_static() {
    assert_eq!(router().route(&Request::get("/moon.png")), Route::Static);
    assert_eq!(
      router().route(&Request::get("https://cdnjs.cloudflare.com/ajax/libs/font-awesome/all.min.css")),
      Route::Static
    );
  }

  #[test]
  fn test_non_get_non_api_passes_through() {
    let request = Request::get("/submit").with_method(Method::Post);
    assert_eq!(router().route(&request), Route::PassThrough);
  }

  #[test]
  fn test_no_patterns_configured() {
    let router = RequestRouter::new(&[]).unwrap();
    let request = Request::get("https://api.alquran.cloud/v1/ayah/random");
    assert_eq!(router.route(&request), Route::Static);
  }

  #[test]
  fn test_invalid_pattern_is_rejected() {
    assert!(RequestRouter::new(&["(unclosed".to_string()]).is_err());
  }
}
