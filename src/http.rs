//! reqwest-backed transport.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Proxy};
use tracing::debug;

use crate::client::{ByteStream, StreamError, Transport};
use crate::options::HttpOptions;

/// POSTs JSON to `base_url + path` and streams the response body.
///
/// Options are validated once, in [`new`](Self::new): a bad proxy URL or
/// header is a configuration error rather than something each request
/// silently drops.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(options: HttpOptions) -> Result<Self, StreamError> {
        let base_url = options.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StreamError::Config("base URL is required".to_string()));
        }

        let mut builder = Client::builder().default_headers(stream_headers(&options)?);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy_url) = &options.proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| StreamError::Config(format!("invalid proxy {proxy_url:?}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Headers sent with every stream request: `Accept` plus the caller's extras.
fn stream_headers(options: &HttpOptions) -> Result<HeaderMap, StreamError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

    for (name, value) in options.extra_headers.iter().flatten() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| StreamError::Config(format!("invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| StreamError::Config(format!("invalid value for header {name:?}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, path: &str, body: &serde_json::Value) -> Result<ByteStream, StreamError> {
        let url = self.url(path);

        debug!(%url, "opening stream");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%url, status = status.as_u16(), "stream request rejected");
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes_stream().map_err(StreamError::from).boxed())
    }
}
