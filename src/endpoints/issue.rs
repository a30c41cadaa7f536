//! Jira issue preview endpoint.
//!
//! `chunk` frames only drive live-typing feedback. The structured preview
//! comes exclusively from the `complete` frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Endpoint;
use crate::reducer::{append, Accumulator, Field, Reducer, Transition};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuePreviewRequest {
    pub prompt: String,
    /// Attached screenshots, as data URLs or upload references.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
}

impl IssuePreviewRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            issue_type: None,
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self
    }
}

/// Structured preview produced by the server, kept as raw JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct IssuePreview(Value);

impl IssuePreview {
    /// Free-form bug report; its shape depends on the issue template.
    pub fn bug_report(&self) -> Option<&Value> {
        self.0.get("bugReport").filter(|report| !report.is_null())
    }

    pub fn summary(&self) -> Option<&str> {
        self.0.get("summary").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for IssuePreview {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueFrame {
    Status {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    Chunk {
        #[serde(alias = "data")]
        content: String,
    },
    Complete {
        #[serde(default)]
        data: IssuePreview,
    },
    Error {
        message: String,
    },
}

/// Live-typing text; never reassembled into the preview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDraft {
    pub full_content: String,
}

impl Accumulator for IssueDraft {
    fn text(&self, field: Field) -> &str {
        match field {
            Field::Content => &self.full_content,
            Field::Title | Field::Description => "",
        }
    }
}

pub struct IssuePreviewReducer;

impl Reducer for IssuePreviewReducer {
    type Frame = IssueFrame;
    type Accumulator = IssueDraft;
    type Output = IssuePreview;

    fn reduce(acc: &mut IssueDraft, frame: IssueFrame) -> Transition<IssuePreview> {
        match frame {
            IssueFrame::Status { message, provider } => Transition::Status { message, provider },
            IssueFrame::Chunk { content } => append(&mut acc.full_content, Field::Content, content),
            IssueFrame::Complete { data } => Transition::Complete(data),
            IssueFrame::Error { message } => Transition::Failed(message),
        }
    }
}

impl Endpoint for IssuePreviewReducer {
    const PATH: &'static str = "/api/jira/issues/preview/stream";
    type Request = IssuePreviewRequest;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::decode_frame;
    use serde_json::json;

    #[test]
    fn test_complete_is_sole_source_of_preview() {
        let mut acc = IssueDraft::default();
        IssuePreviewReducer::reduce(&mut acc, IssueFrame::Chunk { content: "Steps: ".into() });
        IssuePreviewReducer::reduce(&mut acc, IssueFrame::Chunk { content: "click".into() });

        let frame: IssueFrame = decode_frame(
            r#"{"type":"complete","data":{"summary":"Login fails","description":"500 on submit","bugReport":{"severity":"high"}}}"#,
        )
        .unwrap();
        let transition = IssuePreviewReducer::reduce(&mut acc, frame);

        let Transition::Complete(preview) = &transition else {
            panic!("expected completion, got {transition:?}");
        };
        assert_eq!(preview.summary(), Some("Login fails"));
        assert_eq!(preview.description(), Some("500 on submit"));
        assert_eq!(preview.bug_report(), Some(&json!({"severity": "high"})));
        assert_eq!(acc.full_content, "Steps: click");
    }

    #[test]
    fn test_preview_keeps_unknown_keys() {
        let data = json!({"summary": "s", "labels": ["ui"], "priority": "P2"});
        let preview: IssuePreview = serde_json::from_value(data.clone()).unwrap();
        assert_eq!(preview.bug_report(), None);
        assert_eq!(serde_json::to_value(&preview).unwrap(), data);
    }

    #[test]
    fn test_mistyped_fields_do_not_drop_completion() {
        let frame: IssueFrame = decode_frame(
            r#"{"type":"complete","data":{"summary":["not","text"],"description":"ok"}}"#,
        )
        .unwrap();
        let transition = IssuePreviewReducer::reduce(&mut IssueDraft::default(), frame);

        let Transition::Complete(preview) = &transition else {
            panic!("expected completion, got {transition:?}");
        };
        assert_eq!(preview.summary(), None);
        assert_eq!(preview.description(), Some("ok"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = IssuePreviewRequest::new("crash on save")
            .with_images(vec!["data:image/png;base64,AAAA".into()])
            .with_issue_type("Bug");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "prompt": "crash on save",
                "images": ["data:image/png;base64,AAAA"],
                "issueType": "Bug"
            })
        );
    }
}
