use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::params::PaginationConfig;
use crate::query::CacheConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheSettings,
  #[serde(default)]
  pub pagination: PaginationConfig,
  #[serde(default)]
  pub search: SearchSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the REST API, e.g. `https://crm.example.com/api`
  pub base_url: String,
  /// Per-request timeout. Without one, a hung request stays pending.
  pub timeout_secs: Option<u64>,
}

impl ApiConfig {
  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(Duration::from_secs)
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
  pub stale_time_secs: u64,
  pub gc_time_secs: u64,
}

impl Default for CacheSettings {
  fn default() -> Self {
    let defaults = CacheConfig::default();
    Self {
      stale_time_secs: defaults.stale_time.as_secs(),
      gc_time_secs: defaults.gc_time.as_secs(),
    }
  }
}

impl CacheSettings {
  pub fn to_cache_config(self) -> CacheConfig {
    CacheConfig {
      stale_time: Duration::from_secs(self.stale_time_secs),
      gc_time: Duration::from_secs(self.gc_time_secs),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
  pub debounce_ms: u64,
  /// Shorter terms clear the search filter
  pub min_length: usize,
}

impl Default for SearchSettings {
  fn default() -> Self {
    Self {
      debounce_ms: 400,
      min_length: 2,
    }
  }
}

impl SearchSettings {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./bizdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/bizdesk/config.yaml
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
        "No configuration file found. Create one at ~/.config/bizdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("bizdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("bizdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("api.base_url {:?} is not a URL: {}", self.api.base_url, e))?;

    let pagination = &self.pagination;
    if pagination.page_sizes.is_empty() || pagination.page_sizes.contains(&0) {
      return Err(eyre!("pagination.page_sizes must list positive sizes"));
    }
    if !pagination.is_allowed(pagination.default_page_size) {
      return Err(eyre!(
        "pagination.default_page_size {} is not one of {:?}",
        pagination.default_page_size,
        pagination.page_sizes
      ));
    }
    Ok(())
  }

  /// Get the API token from the environment, if one is set.
  ///
  /// Checks BIZDESK_API_TOKEN. The token is never read from the config file.
  pub fn get_api_token() -> Option<String> {
    std::env::var("BIZDESK_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
