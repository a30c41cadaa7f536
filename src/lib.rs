//! # dashstream - streaming client for the developer dashboard backend
//!
//! The dashboard's AI chat, Jira issue preview and PR description preview
//! endpoints all answer a single JSON POST with a body of `data: {...}`
//! lines. This crate decodes that body into typed frames, folds them into a
//! per-request accumulator, reports progress through caller callbacks and
//! settles every request into exactly one outcome.
//!
//! ## Layers
//!
//! - [`sse`]: bytes to frames, tolerant of split lines and malformed payloads
//! - [`reducer`]: the shared state machine every endpoint maps onto
//! - [`endpoints`]: frame vocabularies, request bodies and reducers
//! - [`session`]: callbacks, cancellation and settlement for one request
//! - [`client`] / [`http`]: the transport seam and its reqwest implementation
//!
//! ## Example
//! ```no_run
//! use dashstream::{Callbacks, CancelToken, HttpOptions, Outcome, PrPreviewRequest, StreamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::new(HttpOptions::from_env()?)?;
//!     let cancel = CancelToken::new();
//!
//!     let callbacks = Callbacks::new()
//!         .on_status(|message, _provider| eprintln!("[{message}]"))
//!         .on_update(|draft: &dashstream::PrDraft| eprintln!("title so far: {}", draft.pr_title));
//!
//!     let request = PrPreviewRequest::new("DASH", "dashboard", "feature/streaming");
//!     match client.pr_preview(&request, callbacks, &cancel).await? {
//!         Outcome::Complete(preview) => println!("{:?}", preview.pr_title()),
//!         Outcome::Partial(draft) => println!("incomplete: {}", draft.pr_title),
//!         Outcome::Cancelled => println!("cancelled"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod http;
pub mod options;
pub mod reducer;
pub mod session;
pub mod sse;

// Re-exports for convenience
pub use client::{Endpoint, StreamClient, StreamError, Transport};
pub use endpoints::{
    ChatReply, ChatRequest, ChatTranscript, IssueDraft, IssuePreview, IssuePreviewRequest, PrDraft,
    PrPreview, PrPreviewRequest,
};
pub use options::HttpOptions;
pub use session::{Callbacks, CancelToken, Outcome, Session};
