//! Provider adapter trait and outcome types.
//!
//! Each adapter translates a normalized prompt (+ optional media) into one
//! provider's wire protocol and yields its output as an explicit async
//! sequence. The `local` and `multimodal` modules talk HTTP; the `host`
//! module wraps a model facility injected by the embedding editor.

pub mod host;
pub mod local;
pub mod multimodal;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::catalog::ModelDescriptor;
use crate::media::MediaAttachment;

/// One event in a request's outcome sequence.
///
/// A request yields zero or more `Partial`s followed by exactly one
/// terminal (`Final` or `Failure`). `Partial` carries the *cumulative*
/// text so far, not the delta — the panel re-renders the whole response
/// on every event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// Streamed update: the full text produced so far.
    Partial(String),
    /// Completed response text.
    Final(String),
    /// Human-readable failure message.
    Failure(String),
}

impl ChatOutcome {
    /// Whether this event ends the request's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final(_) | Self::Failure(_))
    }
}

/// Lazy sequence of outcome events produced by an adapter.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = ChatOutcome> + Send>>;

/// Single-event stream carrying one failure, for rejections that happen
/// before any transport work starts.
pub(crate) fn failure_stream(message: String) -> OutcomeStream {
    Box::pin(futures::stream::once(async move {
        ChatOutcome::Failure(message)
    }))
}

/// Trait for provider adapters.
///
/// Implementations must not panic or propagate errors past this boundary:
/// every caught failure becomes a single `Failure` event on the returned
/// stream. No retries, no timeouts beyond what the transport enforces.
/// When `cancel` fires, the stream ends after the event in flight without
/// emitting a terminal.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Issue the provider-specific request.
    ///
    /// # Arguments
    /// * `prompt` - User prompt text
    /// * `media` - Optional attachment, already validated against `descriptor`
    /// * `descriptor` - Resolved model metadata (wire code, capabilities)
    /// * `cancel` - Caller-held cancellation token
    async fn send(
        &self,
        prompt: &str,
        media: Option<&MediaAttachment>,
        descriptor: &ModelDescriptor,
        cancel: CancellationToken,
    ) -> OutcomeStream;
}
