//! Network access seam.
//!
//! Strategies and the lifecycle manager consume the network through the
//! [`Network`] trait so tests can inject scripted fakes. An `Err` from
//! `fetch` means transport failure (DNS, refused connection, offline); a
//! non-2xx origin response is `Ok` and the caller decides what to do with it.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::http::{Method, Request, Response};

#[async_trait]
pub trait Network: Send + Sync {
  /// Perform the request against the real origin.
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// reqwest-backed network that resolves relative URLs against the app origin.
pub struct HttpNetwork {
  client: reqwest::Client,
  origin: Url,
}

impl HttpNetwork {
  pub fn new(origin: &str) -> Result<Self> {
    let origin = Url::parse(origin).map_err(|e| eyre!("Invalid origin {}: {}", origin, e))?;

    Ok(Self {
      client: reqwest::Client::new(),
      origin,
    })
  }

  fn resolve(&self, url: &str) -> Result<Url> {
    // Url::join handles both absolute URLs and origin-relative paths.
    self
      .origin
      .join(url)
      .map_err(|e| eyre!("Invalid request URL {}: {}", url, e))
  }
}

fn reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Head => reqwest::Method::HEAD,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Delete => reqwest::Method::DELETE,
    Method::Patch => reqwest::Method::PATCH,
    Method::Options => reqwest::Method::OPTIONS,
  }
}

#[async_trait]
impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = self.resolve(&request.url)?;

    let response = self
      .client
      .request(reqwest_method(request.method), url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", url, e))?;

    Ok(Response {
      status: status.as_u16(),
      reason: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body: body.to_vec(),
    })
  }
}
