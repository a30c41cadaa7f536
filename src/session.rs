//! Stream session controller.
//!
//! A [`Session`] ties one outbound request to exactly one terminal outcome.
//! It owns the accumulator, fires caller callbacks in frame order and
//! ignores everything after it has settled.

use std::fmt;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::client::{ByteStream, StreamError};
use crate::reducer::{Accumulator, Reducer, Transition};
use crate::sse;

/// Terminal result of a session that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<O, A> {
    /// A `complete` frame arrived.
    Complete(O),
    /// The stream ended without a terminal frame; carries what had accumulated.
    Partial(A),
    /// The caller cancelled before the session settled.
    Cancelled,
}

impl<O, A> Outcome<O, A> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The final result, if the server sent one.
    pub fn complete(self) -> Option<O> {
        match self {
            Outcome::Complete(output) => Some(output),
            _ => None,
        }
    }
}

type ChunkFn<'a> = Box<dyn FnMut(&str, &str) + Send + 'a>;
type StatusFn<'a> = Box<dyn FnMut(&str, Option<&str>) + Send + 'a>;
type UpdateFn<'a, A> = Box<dyn FnMut(&A) + Send + 'a>;

/// Caller-supplied progress sinks, invoked synchronously as frames decode.
pub struct Callbacks<'a, A> {
    on_chunk: Option<ChunkFn<'a>>,
    on_status: Option<StatusFn<'a>>,
    on_update: Option<UpdateFn<'a, A>>,
}

impl<A> Default for Callbacks<'_, A> {
    fn default() -> Self {
        Self {
            on_chunk: None,
            on_status: None,
            on_update: None,
        }
    }
}

impl<A> fmt::Debug for Callbacks<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_chunk", &self.on_chunk.is_some())
            .field("on_status", &self.on_status.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

impl<'a, A> Callbacks<'a, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the appended delta and the full text of that field.
    pub fn on_chunk(mut self, f: impl FnMut(&str, &str) + Send + 'a) -> Self {
        self.on_chunk = Some(Box::new(f));
        self
    }

    /// Called with a status message and the provider that sent it.
    pub fn on_status(mut self, f: impl FnMut(&str, Option<&str>) + Send + 'a) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    /// Called with the whole accumulator after every change to it.
    pub fn on_update(mut self, f: impl FnMut(&A) + Send + 'a) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }
}

/// External cancellation signal, cloneable across tasks.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[derive(Debug)]
enum State<O> {
    Pending,
    Completed(O),
    Failed(String),
    Cancelled,
}

/// One streaming exchange, reduced by `R`.
///
/// Never reused: [`finish`](Self::finish) and [`run`](Self::run) consume it.
pub struct Session<'a, R: Reducer> {
    accumulator: R::Accumulator,
    callbacks: Callbacks<'a, R::Accumulator>,
    state: State<R::Output>,
    cancel_token: Option<CancelToken>,
}

impl<'a, R: Reducer> Session<'a, R> {
    pub fn new(callbacks: Callbacks<'a, R::Accumulator>) -> Self {
        Self {
            accumulator: R::Accumulator::default(),
            callbacks,
            state: State::Pending,
            cancel_token: None,
        }
    }

    /// Watch `token` between callbacks of a single frame.
    ///
    /// [`drive`](Self::drive) sets this itself; it is only needed when
    /// frames are fed through [`dispatch`](Self::dispatch) by hand.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn accumulator(&self) -> &R::Accumulator {
        &self.accumulator
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.state, State::Pending)
    }

    /// Fold one frame into the session. No-op once settled.
    pub fn dispatch(&mut self, frame: R::Frame) {
        if self.is_settled() {
            trace!(?frame, "ignoring frame after settlement");
            return;
        }

        match R::reduce(&mut self.accumulator, frame) {
            Transition::Status { message, provider } => {
                if let Some(on_status) = self.callbacks.on_status.as_mut() {
                    on_status(&message, provider.as_deref());
                }
            }
            Transition::Appended { field, delta } => {
                if let Some(on_chunk) = self.callbacks.on_chunk.as_mut() {
                    on_chunk(&delta, self.accumulator.text(field));
                }
                // `on_chunk` may have cancelled; no callback fires after that.
                if self.cancel_requested() {
                    self.cancel();
                    return;
                }
                self.notify_update();
            }
            Transition::Replaced { .. } => self.notify_update(),
            Transition::Complete(output) => {
                debug!("session completed");
                self.state = State::Completed(output);
            }
            Transition::Failed(message) => {
                debug!(%message, "session failed in-band");
                self.state = State::Failed(message);
            }
        }
    }

    /// Settle as cancelled unless already settled.
    pub fn cancel(&mut self) {
        if !self.is_settled() {
            debug!("session cancelled");
            self.state = State::Cancelled;
        }
    }

    /// Produce the single terminal outcome.
    ///
    /// A session still pending here saw no terminal frame and resolves with
    /// its partial accumulator.
    pub fn finish(self) -> Result<Outcome<R::Output, R::Accumulator>, StreamError> {
        match self.state {
            State::Pending => {
                debug!("stream ended without a terminal frame");
                Ok(Outcome::Partial(self.accumulator))
            }
            State::Completed(output) => Ok(Outcome::Complete(output)),
            State::Failed(message) => Err(StreamError::Streaming { message }),
            State::Cancelled => Ok(Outcome::Cancelled),
        }
    }

    /// Decode `bytes` and drive the session to settlement.
    pub async fn run(
        self,
        bytes: ByteStream,
        cancel: &CancelToken,
    ) -> Result<Outcome<R::Output, R::Accumulator>, StreamError> {
        self.drive(sse::frames::<R::Frame, _>(bytes), cancel).await
    }

    /// Drive the session from an already-decoded frame stream.
    ///
    /// Stops reading as soon as the session settles or `cancel` fires; the
    /// frame stream (and the transport behind it) is dropped on return.
    pub async fn drive<S>(
        mut self,
        frames: S,
        cancel: &CancelToken,
    ) -> Result<Outcome<R::Output, R::Accumulator>, StreamError>
    where
        S: Stream<Item = Result<R::Frame, StreamError>> + Send,
    {
        self.cancel_token = Some(cancel.clone());
        let mut frames = Box::pin(frames);

        while !self.is_settled() {
            if cancel.is_cancelled() {
                self.cancel();
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel();
                    break;
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => self.dispatch(frame),
                Some(Err(e)) => {
                    debug!(error = %e, "transport failed mid-stream");
                    return Err(e);
                }
                None => break,
            }
        }

        drop(frames);
        self.finish()
    }

    fn cancel_requested(&self) -> bool {
        self.cancel_token.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn notify_update(&mut self) {
        if let Some(on_update) = self.callbacks.on_update.as_mut() {
            on_update(&self.accumulator);
        }
    }
}
