use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Application name, used as the cache partition prefix (e.g. "quran-widget").
  pub name: String,
  /// Version tag embedded in partition identifiers (e.g. "1.0.0").
  pub version: String,
  /// Base URL that relative request and manifest URLs are resolved against.
  pub origin: String,
  /// Static manifest: URLs precached on install, in order.
  #[serde(default)]
  pub precache: Vec<String>,
  /// Regex patterns classifying requests as dynamic/API (stale-while-revalidate).
  #[serde(default)]
  pub api_patterns: Vec<String>,
  /// Document served when a navigation request fails offline.
  #[serde(default = "default_fallback_document")]
  pub fallback_document: String,
}

fn default_fallback_document() -> String {
  "/index.html".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offcache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/offcache/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("offcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Partition identifier for the current version's static assets.
  pub fn static_partition(&self) -> String {
    format!("{}-static-v{}", self.name, self.version)
  }

  /// Partition identifier for the current version's dynamic API responses.
  pub fn dynamic_partition(&self) -> String {
    format!("{}-dynamic-v{}", self.name, self.version)
  }
}
