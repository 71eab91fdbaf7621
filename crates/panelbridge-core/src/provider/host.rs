//! Host-model adapter.
//!
//! The embedding editor exposes its own model facility; this adapter
//! resolves a handle through the injected [`HostModelApi`] using a
//! configuration-supplied selector, sends the prompt to the first
//! matching candidate, and folds the streamed fragments into a single
//! final event — the panel contract for this path is one terminal with
//! no partials.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{failure_stream, ChatAdapter, ChatOutcome, OutcomeStream};
use crate::catalog::ModelDescriptor;
use crate::error::BridgeError;
use crate::media::MediaAttachment;

/// Streamed text fragments from a host model request.
pub type TextFragmentStream = Pin<Box<dyn Stream<Item = Result<String, BridgeError>> + Send>>;

/// Handle to one model offered by the editor host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostModelHandle {
    pub id: String,
    pub family: String,
}

/// The editor-provided model selection and request facility.
///
/// Implemented by the embedding host; test doubles stand in elsewhere.
#[async_trait]
pub trait HostModelApi: Send + Sync {
    /// List candidate models matching the selector, in the host's order.
    async fn select_models(&self, selector: &str) -> Result<Vec<HostModelHandle>, BridgeError>;

    /// Send a single user message to a model, receiving text fragments.
    async fn send_request(
        &self,
        handle: &HostModelHandle,
        prompt: &str,
    ) -> Result<TextFragmentStream, BridgeError>;
}

/// Stand-in for processes that run without an editor host attached.
pub struct UnavailableHostApi;

#[async_trait]
impl HostModelApi for UnavailableHostApi {
    async fn select_models(&self, _selector: &str) -> Result<Vec<HostModelHandle>, BridgeError> {
        Err(BridgeError::Transport(
            "no host model API is available in this process".into(),
        ))
    }

    async fn send_request(
        &self,
        _handle: &HostModelHandle,
        _prompt: &str,
    ) -> Result<TextFragmentStream, BridgeError> {
        Err(BridgeError::Transport(
            "no host model API is available in this process".into(),
        ))
    }
}

/// Adapter over the host's model facility.
pub struct HostModelAdapter {
    api: Arc<dyn HostModelApi>,
    selector: Option<String>,
}

impl HostModelAdapter {
    pub fn new(api: Arc<dyn HostModelApi>, selector: Option<String>) -> Self {
        Self {
            api,
            selector: selector.filter(|s| !s.is_empty()),
        }
    }
}

#[async_trait]
impl ChatAdapter for HostModelAdapter {
    async fn send(
        &self,
        prompt: &str,
        _media: Option<&MediaAttachment>,
        _descriptor: &ModelDescriptor,
        cancel: CancellationToken,
    ) -> OutcomeStream {
        let Some(selector) = self.selector.clone() else {
            return failure_stream(
                BridgeError::MissingConfiguration("host model selector is unset".into())
                    .to_string(),
            );
        };

        let api = Arc::clone(&self.api);
        let prompt = prompt.to_string();

        Box::pin(stream! {
            let candidates = match api.select_models(&selector).await {
                Ok(c) => c,
                Err(e) => {
                    yield ChatOutcome::Failure(e.to_string());
                    return;
                }
            };

            // First match wins; candidate order is the host's.
            let Some(handle) = candidates.into_iter().next() else {
                yield ChatOutcome::Failure(BridgeError::NoMatchingModel(selector).to_string());
                return;
            };
            debug!(model = %handle.id, "resolved host model");

            let mut fragments = match api.send_request(&handle, &prompt).await {
                Ok(s) => s,
                Err(e) => {
                    yield ChatOutcome::Failure(e.to_string());
                    return;
                }
            };

            let mut acc = String::new();
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("host model stream cancelled");
                        return;
                    }
                    next = fragments.next() => next,
                };
                match next {
                    Some(Ok(fragment)) => acc.push_str(&fragment),
                    Some(Err(e)) => {
                        yield ChatOutcome::Failure(e.to_string());
                        return;
                    }
                    None => break,
                }
            }

            yield ChatOutcome::Final(acc);
        })
    }
}
