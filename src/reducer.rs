//! Shared shape of the per-endpoint reducers.
//!
//! Every endpoint maps its own closed frame vocabulary onto the same small
//! state machine:
//!
//! ```text
//! INITIAL --status/chunk--> STREAMING --complete--> DONE
//! STREAMING --error--> FAILED
//! STREAMING --stream ends--> DONE (partial)
//! any --cancel--> CANCELLED
//! ```
//!
//! A reducer only folds a frame into its accumulator and reports what
//! happened. Callbacks, settlement and cancellation belong to the
//! [`Session`](crate::session::Session).

use std::fmt::Debug;

use serde::de::DeserializeOwned;

/// Named text fields a frame can stream into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Free text of chat replies and issue previews.
    Content,
    Title,
    Description,
}

/// Per-session record of in-progress field values.
pub trait Accumulator: Default + Debug + Send {
    /// Current text of `field`; empty for fields the endpoint does not stream.
    fn text(&self, field: Field) -> &str;
}

/// What a single frame did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<O> {
    /// Informational, never terminal.
    Status {
        message: String,
        provider: Option<String>,
    },
    /// `delta` was appended to `field`.
    Appended { field: Field, delta: String },
    /// `field` was overwritten with its authoritative final value.
    Replaced { field: Field },
    /// The operation finished with this result.
    Complete(O),
    /// The server reported a failure.
    Failed(String),
}

impl<O> Transition<O> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Complete(_) | Transition::Failed(_))
    }
}

/// Folds one endpoint's frames into its accumulator.
pub trait Reducer {
    type Frame: DeserializeOwned + Debug + Send + 'static;
    type Accumulator: Accumulator;
    type Output: Debug + Send;

    fn reduce(acc: &mut Self::Accumulator, frame: Self::Frame) -> Transition<Self::Output>;
}

/// Append `delta` to `slot` and report it.
pub(crate) fn append<O>(slot: &mut String, field: Field, delta: String) -> Transition<O> {
    slot.push_str(&delta);
    Transition::Appended { field, delta }
}
