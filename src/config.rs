use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_NOTIFICATION_SECS: i64 = crate::notify::DEFAULT_DURATION_SECS;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid gateway URL {value:?}: {reason}")]
    BadUrl { value: String, reason: String },
}

/// Runtime settings. The binary fills this from flags or `RECORDS_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Gateway base, e.g. `http://localhost:8080/api`.
    pub api_url: Url,
    pub page_size: u32,
    pub debounce: Duration,
    pub notification_secs: i64,
}

impl Config {
    /// Settings for `api_url` with every other value at its default.
    pub fn new(api_url: Url) -> Self {
        Config {
            api_url,
            page_size: DEFAULT_PAGE_SIZE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            notification_secs: DEFAULT_NOTIFICATION_SECS,
        }
    }
}

/// Parses a gateway base URL. Only http(s) without query or fragment is
/// accepted, since endpoint paths are appended as segments.
pub fn parse_api_url(value: &str) -> Result<Url, ConfigError> {
    let bad = |reason: String| ConfigError::BadUrl {
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value.trim()).map_err(|e| bad(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(bad(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(bad("query and fragment are not allowed".into()));
    }
    Ok(url)
}
