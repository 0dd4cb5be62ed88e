//! Configuration management for the client.

use reqwest::Url;
use std::env;
use std::path::PathBuf;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the restaurant/review REST backend
    pub api_base_url: Url,
    /// Origin the static app assets are served from
    pub origin_url: Url,
    /// File holding the local database snapshot
    pub store_path: PathBuf,
    /// Name of the static asset cache
    pub cache_name: String,
    /// Cache proxy listen address
    pub host: String,
    /// Cache proxy listen port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = parse_url(
            "API_BASE_URL",
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:1337".to_string()),
        )?;

        let origin_url = parse_url(
            "ORIGIN_URL",
            env::var("ORIGIN_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
        )?;

        let store_path = env::var("STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tablesync.json"));

        let cache_name = env::var("CACHE_NAME").unwrap_or_else(|_| "mws-stage-3".to_string());
        if cache_name.trim().is_empty() {
            return Err(ConfigError::EmptyCacheName);
        }

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        Ok(Self {
            api_base_url,
            origin_url,
            store_path,
            cache_name,
            host,
            port,
        })
    }
}

fn parse_url(name: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|_| ConfigError::InvalidUrl { name, value })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("CACHE_NAME must not be empty")]
    EmptyCacheName,
}
