//! Pull request description preview endpoint.
//!
//! Title and description stream independently. A `*_complete` frame replaces
//! whatever its chunks assembled, and the final `complete` frame carries the
//! whole preview including branch metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Endpoint;
use crate::reducer::{append, Accumulator, Field, Reducer, Transition};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrPreviewRequest {
    pub project_key: String,
    pub repo_slug: String,
    pub branch_name: String,
}

impl PrPreviewRequest {
    pub fn new(
        project_key: impl Into<String>,
        repo_slug: impl Into<String>,
        branch_name: impl Into<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repo_slug: repo_slug.into(),
            branch_name: branch_name.into(),
        }
    }
}

/// Final PR preview exactly as the server sent it.
///
/// The payload is kept as raw JSON so an unexpected value type never
/// prevents the session from completing; the accessors read the known keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PrPreview(Value);

impl PrPreview {
    pub fn pr_title(&self) -> Option<&str> {
        self.0.get("prTitle").and_then(Value::as_str)
    }

    pub fn pr_description(&self) -> Option<&str> {
        self.0.get("prDescription").and_then(Value::as_str)
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.0.get("branchName").and_then(Value::as_str)
    }

    /// Accepts a JSON boolean or the strings `"true"` / `"false"`.
    pub fn ai_generated(&self) -> Option<bool> {
        match self.0.get("aiGenerated")? {
            Value::Bool(flag) => Some(*flag),
            Value::String(flag) => flag.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for PrPreview {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrFrame {
    Status {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    TitleChunk {
        data: String,
    },
    TitleComplete {
        data: String,
    },
    DescriptionChunk {
        data: String,
    },
    DescriptionComplete {
        data: String,
    },
    Complete {
        #[serde(default)]
        data: PrPreview,
    },
    Error {
        message: String,
    },
}

/// Partial PR preview, re-emitted to the caller after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrDraft {
    pub pr_title: String,
    pub pr_description: String,
    /// Most recent status message; observability only.
    pub last_status: Option<String>,
}

impl Accumulator for PrDraft {
    fn text(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.pr_title,
            Field::Description => &self.pr_description,
            Field::Content => "",
        }
    }
}

pub struct PrPreviewReducer;

impl Reducer for PrPreviewReducer {
    type Frame = PrFrame;
    type Accumulator = PrDraft;
    type Output = PrPreview;

    fn reduce(acc: &mut PrDraft, frame: PrFrame) -> Transition<PrPreview> {
        match frame {
            PrFrame::Status { message, provider } => {
                acc.last_status = Some(message.clone());
                Transition::Status { message, provider }
            }
            PrFrame::TitleChunk { data } => append(&mut acc.pr_title, Field::Title, data),
            PrFrame::DescriptionChunk { data } => {
                append(&mut acc.pr_description, Field::Description, data)
            }
            PrFrame::TitleComplete { data } => {
                acc.pr_title = data;
                Transition::Replaced { field: Field::Title }
            }
            PrFrame::DescriptionComplete { data } => {
                acc.pr_description = data;
                Transition::Replaced { field: Field::Description }
            }
            PrFrame::Complete { data } => Transition::Complete(data),
            PrFrame::Error { message } => Transition::Failed(message),
        }
    }
}

impl Endpoint for PrPreviewReducer {
    const PATH: &'static str = "/api/pr/preview/stream";
    type Request = PrPreviewRequest;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::decode_frame;
    use serde_json::json;

    fn reduce_all(frames: Vec<PrFrame>) -> (PrDraft, Vec<Transition<PrPreview>>) {
        let mut acc = PrDraft::default();
        let transitions = frames
            .into_iter()
            .map(|frame| PrPreviewReducer::reduce(&mut acc, frame))
            .collect();
        (acc, transitions)
    }

    #[test]
    fn test_fields_stream_independently() {
        let (draft, _) = reduce_all(vec![
            PrFrame::TitleChunk { data: "Fix ".into() },
            PrFrame::DescriptionChunk { data: "Det".into() },
            PrFrame::TitleChunk { data: "bug".into() },
            PrFrame::DescriptionChunk { data: "ail".into() },
        ]);
        assert_eq!(draft.pr_title, "Fix bug");
        assert_eq!(draft.pr_description, "Detail");
    }

    #[test]
    fn test_field_complete_replaces_divergent_chunks() {
        let (draft, transitions) = reduce_all(vec![
            PrFrame::TitleChunk { data: "Fix bgu".into() },
            PrFrame::TitleComplete { data: "Fix bug".into() },
            PrFrame::DescriptionComplete { data: "Detail".into() },
        ]);
        assert_eq!(draft.pr_title, "Fix bug");
        assert_eq!(draft.pr_description, "Detail");
        assert_eq!(transitions[1], Transition::Replaced { field: Field::Title });
    }

    #[test]
    fn test_status_is_tracked_but_not_terminal() {
        let (draft, transitions) = reduce_all(vec![PrFrame::Status {
            message: "Reading commits".into(),
            provider: Some("gemini".into()),
        }]);
        assert_eq!(draft.last_status.as_deref(), Some("Reading commits"));
        assert!(!transitions[0].is_terminal());
    }

    #[test]
    fn test_complete_payload_is_returned_verbatim() {
        let data = json!({
            "prTitle": "Fix bug",
            "prDescription": "Detail",
            "branchName": "b1",
            "aiGenerated": true,
            "reviewers": ["alice"]
        });
        let frame: PrFrame =
            decode_frame(&json!({"type": "complete", "data": data}).to_string()).unwrap();

        let (_, transitions) = reduce_all(vec![frame]);
        let Transition::Complete(preview) = &transitions[0] else {
            panic!("expected completion, got {:?}", transitions[0]);
        };
        assert_eq!(preview.pr_title(), Some("Fix bug"));
        assert_eq!(preview.branch_name(), Some("b1"));
        assert_eq!(preview.ai_generated(), Some(true));
        assert_eq!(preview.as_value(), &data);
    }

    #[test]
    fn test_complete_with_unexpected_types_still_completes() {
        let frame: PrFrame = decode_frame(
            r#"{"type":"complete","data":{"prTitle":"Fix","prDescription":42,"aiGenerated":"true"}}"#,
        )
        .unwrap();

        let (_, transitions) = reduce_all(vec![frame]);
        let Transition::Complete(preview) = &transitions[0] else {
            panic!("expected completion, got {:?}", transitions[0]);
        };
        assert_eq!(preview.pr_title(), Some("Fix"));
        assert_eq!(preview.pr_description(), None);
        assert_eq!(preview.ai_generated(), Some(true));
    }

    #[test]
    fn test_complete_without_data_completes_empty() {
        let frame: PrFrame = decode_frame(r#"{"type":"complete"}"#).unwrap();
        let (_, transitions) = reduce_all(vec![frame]);
        assert_eq!(transitions[0], Transition::Complete(PrPreview::default()));
    }
}
