use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:4000";
pub const DEFAULT_STATE_DIR: &str = ".s7-admin";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_REFRESH_FALLBACK_PATH: &str = "/api/auth/refresh";

/// Connection settings for the admin backend
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL that backend-relative paths are joined to
    pub api_url: String,
    /// Directory holding the persisted session (storage file and cookies)
    pub state_dir: PathBuf,
    pub refresh_path: String,
    /// Tried with the same payload when `refresh_path` fails
    pub refresh_fallback_path: String,
    /// No timeout unless configured
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_fallback_path: DEFAULT_REFRESH_FALLBACK_PATH.to_string(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from the process environment
    ///
    /// * `S7_API_URL` - backend base URL
    /// * `S7_STATE_DIR` - session directory
    /// * `S7_REFRESH_PATH` / `S7_REFRESH_FALLBACK_PATH` - token refresh routes
    /// * `S7_API_TIMEOUT_SECS` - optional per-request timeout
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout = match non_empty("S7_API_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .context("S7_API_TIMEOUT_SECS must be a whole number of seconds")?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            api_url: non_empty("S7_API_URL").unwrap_or(defaults.api_url),
            state_dir: non_empty("S7_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            refresh_path: non_empty("S7_REFRESH_PATH").unwrap_or(defaults.refresh_path),
            refresh_fallback_path: non_empty("S7_REFRESH_FALLBACK_PATH")
                .unwrap_or(defaults.refresh_fallback_path),
            request_timeout,
        })
    }

    /// Resolve `path` against the base URL. Absolute `http(s)://` URLs pass through.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}
