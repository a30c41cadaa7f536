//! Streaming endpoints of the dashboard backend.

pub mod chat;
pub mod issue;
pub mod pr;

// Re-export for convenience
pub use chat::{ChatReducer, ChatReply, ChatRequest, ChatTranscript};
pub use issue::{IssueDraft, IssuePreview, IssuePreviewReducer, IssuePreviewRequest};
pub use pr::{PrDraft, PrPreview, PrPreviewReducer, PrPreviewRequest};
