use std::env;
use std::str::FromStr;

use crate::import::DEFAULT_MIN_STAGE;

const DEFAULT_DATABASE_URL: &str = "sqlite://workout-log.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8088";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Server configuration, read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
  pub database_url: String,
  pub bind_addr: String,
  pub log_level: String,
  pub min_stage: u32,
  pub default_rest_seconds: u32,
  pub max_upload_bytes: usize,
  /// Lowercase, without the leading dot
  pub allowed_extensions: Vec<String>,
  pub plan_cache_ttl_seconds: u64,
  pub cors_allow_origins: Vec<String>,
  pub history_limit: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {name}: {value}")]
  Invalid { name: String, value: String },
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      database_url: DEFAULT_DATABASE_URL.to_string(),
      bind_addr: DEFAULT_BIND_ADDR.to_string(),
      log_level: "info".to_string(),
      min_stage: DEFAULT_MIN_STAGE,
      default_rest_seconds: 90,
      max_upload_bytes: 10 * 1024 * 1024,
      allowed_extensions: vec!["xlsx".to_string()],
      plan_cache_ttl_seconds: 0,
      cors_allow_origins: split_list(DEFAULT_CORS_ORIGINS),
      history_limit: 30,
    }
  }
}

fn var_or(name: &str, default: &str) -> String {
  env::var(name)
    .ok()
    .filter(|v| !v.trim().is_empty())
    .unwrap_or_else(|| default.to_string())
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
  match env::var(name) {
    Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|_| ConfigError::Invalid {
      name: name.to_string(),
      value,
    }),
    _ => Ok(default),
  }
}

fn split_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let allowed_extensions = split_list(&var_or("ALLOWED_EXTENSIONS", "xlsx"))
      .into_iter()
      .map(|ext| ext.trim_start_matches('.').to_lowercase())
      .collect();

    Ok(Self {
      database_url: var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
      bind_addr: var_or("BIND_ADDR", DEFAULT_BIND_ADDR),
      log_level: var_or("LOG_LEVEL", &defaults.log_level),
      min_stage: parsed_or("MIN_STAGE", defaults.min_stage)?,
      default_rest_seconds: parsed_or("DEFAULT_REST_SECONDS", defaults.default_rest_seconds)?,
      max_upload_bytes: parsed_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
      allowed_extensions,
      plan_cache_ttl_seconds: parsed_or("PLAN_CACHE_TTL_SECONDS", defaults.plan_cache_ttl_seconds)?,
      cors_allow_origins: split_list(&var_or("CORS_ALLOW_ORIGINS", DEFAULT_CORS_ORIGINS)),
      history_limit: parsed_or("HISTORY_LIMIT", defaults.history_limit)?,
    })
  }

  /// Whether `filename` ends in one of the allowed extensions
  pub fn is_allowed_file(&self, filename: &str) -> bool {
    match filename.rsplit_once('.') {
      Some((_, ext)) => self.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)),
      None => false,
    }
  }
}
