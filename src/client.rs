//! Error type, transport seam and the caller-facing streaming client.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::endpoints::chat::{ChatReducer, ChatReply, ChatRequest, ChatTranscript};
use crate::endpoints::issue::{IssueDraft, IssuePreview, IssuePreviewReducer, IssuePreviewRequest};
use crate::endpoints::pr::{PrDraft, PrPreview, PrPreviewReducer, PrPreviewRequest};
use crate::http::HttpTransport;
use crate::options::HttpOptions;
use crate::reducer::Reducer;
use crate::session::{Callbacks, CancelToken, Outcome, Session};

/// Errors that can settle a streaming session.
///
/// Cancellation is not an error; see [`Outcome::Cancelled`].
#[derive(Error, Debug)]
pub enum StreamError {
    /// The server answered with a non-success status before any frame was read.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server sent an in-band `error` frame.
    #[error("Streaming error: {message}")]
    Streaming { message: String },

    #[error("Request encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// Whether the failure happened at the HTTP level rather than in-band.
    pub fn is_transport(&self) -> bool {
        matches!(self, StreamError::Status { .. } | StreamError::Http(_))
    }

    /// HTTP status carried by a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Status { status, .. } => Some(*status),
            StreamError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Raw response body as it arrives from the transport.
pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Opens one outbound streaming request.
///
/// Implementations must return `StreamError::Status` for a non-success
/// response without handing out its body as a byte stream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, path: &str, body: &serde_json::Value) -> Result<ByteStream, StreamError>;
}

/// A streaming endpoint: where to send the request and how to reduce its frames.
pub trait Endpoint: Reducer {
    /// Path appended to the transport's base URL.
    const PATH: &'static str;

    /// JSON request body.
    type Request: Serialize + Sync;
}

/// Result of one streaming call.
pub type StreamResult<E> =
    Result<Outcome<<E as Reducer>::Output, <E as Reducer>::Accumulator>, StreamError>;

/// Client for the dashboard's streaming endpoints.
///
/// # Example
/// ```no_run
/// use dashstream::{Callbacks, CancelToken, ChatRequest, HttpOptions, Outcome, StreamClient};
///
/// # async fn run() -> Result<(), dashstream::StreamError> {
/// let client = StreamClient::new(HttpOptions::new("http://localhost:3000"))?;
/// let callbacks = Callbacks::new().on_chunk(|delta, _full| print!("{delta}"));
///
/// let outcome = client
///     .chat(&ChatRequest::new("Summarize my open tickets"), callbacks, &CancelToken::new())
///     .await?;
///
/// if let Outcome::Complete(reply) = outcome {
///     println!("\n{}", reply.response);
/// }
/// # Ok(())
/// # }
/// ```
pub struct StreamClient<T = HttpTransport> {
    transport: T,
}

impl StreamClient<HttpTransport> {
    /// Create a client backed by reqwest.
    pub fn new(options: HttpOptions) -> Result<Self, StreamError> {
        Ok(Self::with_transport(HttpTransport::new(options)?))
    }
}

impl<T: Transport> StreamClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one streaming exchange against endpoint `E`.
    ///
    /// Opens exactly one request. A cancel before the response headers
    /// arrive settles as `Outcome::Cancelled` without reading any frames.
    pub async fn stream<E: Endpoint>(
        &self,
        request: &E::Request,
        callbacks: Callbacks<'_, E::Accumulator>,
        cancel: &CancelToken,
    ) -> StreamResult<E> {
        let body = serde_json::to_value(request)?;

        if cancel.is_cancelled() {
            debug!(path = E::PATH, "cancelled before request was sent");
            return Ok(Outcome::Cancelled);
        }

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path = E::PATH, "cancelled while awaiting response");
                return Ok(Outcome::Cancelled);
            }
            opened = self.transport.open(E::PATH, &body) => opened?,
        };

        Session::<E>::new(callbacks).run(bytes, cancel).await
    }

    pub async fn chat(
        &self,
        request: &ChatRequest,
        callbacks: Callbacks<'_, ChatTranscript>,
        cancel: &CancelToken,
    ) -> Result<Outcome<ChatReply, ChatTranscript>, StreamError> {
        self.stream::<ChatReducer>(request, callbacks, cancel).await
    }

    pub async fn issue_preview(
        &self,
        request: &IssuePreviewRequest,
        callbacks: Callbacks<'_, IssueDraft>,
        cancel: &CancelToken,
    ) -> Result<Outcome<IssuePreview, IssueDraft>, StreamError> {
        self.stream::<IssuePreviewReducer>(request, callbacks, cancel).await
    }

    pub async fn pr_preview(
        &self,
        request: &PrPreviewRequest,
        callbacks: Callbacks<'_, PrDraft>,
        cancel: &CancelToken,
    ) -> Result<Outcome<PrPreview, PrDraft>, StreamError> {
        self.stream::<PrPreviewReducer>(request, callbacks, cancel).await
    }
}
