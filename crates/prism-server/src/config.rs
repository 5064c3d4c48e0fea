// ABOUTME: Configuration loading and validation for the prism server.
// ABOUTME: Reads PRISM_* environment variables; the CLI exports its flags into them before loading.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PRISM_PACKAGE is not set; name the package to discover agents from")]
    MissingPackage,

    #[error("PRISM_PORT is not a valid port number: {0}")]
    InvalidPort(String),

    #[error("PRISM_WORKERS must be a positive integer: {0}")]
    InvalidWorkers(String),

    #[error("PRISM_RUN_TIMEOUT_SECS must be a positive number of seconds: {0}")]
    InvalidRunTimeout(String),

    #[error("PRISM_DEV_SERVER_URL must be an http(s) URL: {0}")]
    InvalidDevServerUrl(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PrismConfig {
    pub package: String,
    pub host: String,
    pub port: u16,
    /// Path prefix the app is mounted under, normalised to `""` or `/prefix`.
    pub root_path: String,
    pub workers: usize,
    pub dev: bool,
    pub dev_server_url: String,
    pub static_dir: PathBuf,
    /// Raw `PRISM_PATH` list used to resolve the package.
    pub search_path: Option<String>,
    pub run_timeout: Option<Duration>,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1" || v == "yes")
        .unwrap_or(false)
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Normalise a mount prefix: no trailing slash, a leading slash when non-empty.
pub fn normalize_root_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

impl PrismConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - PRISM_PACKAGE: package to discover agents from (required)
    /// - PRISM_HOST: interface to bind (default: 0.0.0.0)
    /// - PRISM_PORT: port to bind (default: 8765)
    /// - PRISM_ROOT_PATH: mount prefix for every route (default: none)
    /// - PRISM_WORKERS: runtime worker threads (default: 1)
    /// - PRISM_DEV: proxy the UI to a dev server instead of serving static files
    /// - PRISM_DEV_SERVER_URL: dev server to proxy to (default: http://localhost:5173)
    /// - PRISM_STATIC_DIR: built UI directory (default: static)
    /// - PRISM_PATH: search path list for package resolution (optional)
    /// - PRISM_RUN_TIMEOUT_SECS: per-run time limit (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let package = env_nonempty("PRISM_PACKAGE").ok_or(ConfigError::MissingPackage)?;

        let host = env_nonempty("PRISM_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match env_nonempty("PRISM_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8765,
        };

        let root_path = normalize_root_path(&std::env::var("PRISM_ROOT_PATH").unwrap_or_default());

        let workers = match env_nonempty("PRISM_WORKERS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidWorkers(raw)),
            },
            None => 1,
        };

        let dev = env_flag("PRISM_DEV");

        let dev_server_url = env_nonempty("PRISM_DEV_SERVER_URL")
            .unwrap_or_else(|| "http://localhost:5173".to_string());
        if !(dev_server_url.starts_with("http://") || dev_server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidDevServerUrl(dev_server_url));
        }
        let dev_server_url = dev_server_url.trim_end_matches('/').to_string();

        let static_dir = env_nonempty("PRISM_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static"));

        let search_path = env_nonempty("PRISM_PATH");

        let run_timeout = match env_nonempty("PRISM_RUN_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigError::InvalidRunTimeout(raw)),
            },
            None => None,
        };

        Ok(Self {
            package,
            host,
            port,
            root_path,
            workers,
            dev,
            dev_server_url,
            static_dir,
            search_path,
            run_timeout,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
