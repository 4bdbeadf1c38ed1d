//! Request and response types shared by the router, strategies, and cache store.

use sha2::{Digest, Sha256};

/// HTTP method of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
      Method::Options => "OPTIONS",
    }
  }
}

/// Whether a request targets a top-level document or a subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// A full-page navigation; eligible for the cached fallback document.
  Navigate,
  #[default]
  Subresource,
}

/// An intercepted network request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  /// Target URL, relative ("/index.html") or absolute ("https://...").
  pub url: String,
  pub mode: RequestMode,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      url: url.into(),
      mode: RequestMode::default(),
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_mode(mut self, mode: RequestMode) -> Self {
    self.mode = mode;
    self
  }

  /// Cache key for this request.
  pub fn key(&self) -> RequestKey {
    RequestKey::of(self.method, &self.url)
  }
}

/// Cache lookup key: method + URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
  pub fn of(method: Method, url: &str) -> Self {
    Self(format!("{} {}", method.as_str(), url))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Stable hash used as the storage primary key (keys can be arbitrarily long URLs).
  pub fn storage_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.0.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl std::fmt::Display for RequestKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A captured HTTP response: status, headers, and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub reason: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

/// Exact body of the synthesized offline fallback. Wire format contract, do not reformat.
const FALLBACK_BODY: &str =
  r#"{"error":"Network unavailable","message":"Please check your internet connection"}"#;

impl Response {
  pub fn new(status: u16, reason: impl Into<String>) -> Self {
    Self {
      status,
      reason: reason.into(),
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  /// True for 2xx statuses; only these responses are ever cached.
  pub fn ok(&self) -> bool {
    (200..=299).contains(&self.status)
  }

  /// First header with the given name, compared case-insensitively.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Synthesized 503 returned when the network is down and nothing is cached.
  pub fn network_fallback() -> Self {
    Response::new(503, "Service Unavailable")
      .with_header("Content-Type", "application/json")
      .with_body(FALLBACK_BODY)
  }
}
