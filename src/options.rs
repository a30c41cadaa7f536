//! HTTP transport configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::StreamError;

const ENV_BASE_URL: &str = "DASHSTREAM_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "DASHSTREAM_TIMEOUT_SECS";
const ENV_PROXY: &str = "DASHSTREAM_PROXY";

/// Options for the reqwest-backed transport.
///
/// # Example
/// ```rust
/// use dashstream::options::HttpOptions;
/// use std::time::Duration;
///
/// let options = HttpOptions::new("http://localhost:3000")
///     .with_timeout(Duration::from_secs(120))
///     .with_header("X-Dashboard-User", "ops");
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// Backend origin; endpoint paths are appended to it.
    pub base_url: String,

    /// Bound on the whole exchange, body included. `None` means the stream
    /// may run for as long as the server keeps it open.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read options from `DASHSTREAM_BASE_URL`, `DASHSTREAM_TIMEOUT_SECS`
    /// and `DASHSTREAM_PROXY`.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StreamError> {
        let base_url = lookup(ENV_BASE_URL)
            .ok_or_else(|| StreamError::Config(format!("{ENV_BASE_URL} is not set")))?;

        let mut options = Self::new(base_url);

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                StreamError::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))
            })?;
            options = options.with_timeout(Duration::from_secs(secs));
        }

        if let Some(proxy) = lookup(ENV_PROXY).filter(|p| !p.is_empty()) {
            options = options.with_proxy(proxy);
        }

        Ok(options)
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}
