//! Local-model adapter.
//!
//! Streams a chat completion from an Ollama-style local inference server:
//! one POST to `/api/chat` with `stream: true`, answered as NDJSON lines
//! of `{message: {content: <delta>}, done: <bool>}`. Deltas are folded
//! into a running total so every `Partial` carries the cumulative text.
//!
//! Text-only: attachments are ignored by this adapter.

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ChatAdapter, ChatOutcome, OutcomeStream};
use crate::catalog::ModelDescriptor;
use crate::error::BridgeError;
use crate::media::MediaAttachment;

/// Default endpoint of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Adapter for an Ollama-compatible local server.
pub struct OllamaAdapter {
    client: Client,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: [UserMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChunkMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

// ── NDJSON handling ─────────────────────────────────────────────────

/// Pop complete newline-terminated lines off the front of `buf`,
/// leaving any partial trailing line in place.
fn drain_lines(buf: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim().to_string();
        buf.drain(..=pos);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Fold one NDJSON line into the running total and produce the event to
/// emit for it, if any. `done` lines terminate with the cumulative text.
fn fold_line(line: &str, acc: &mut String) -> Option<ChatOutcome> {
    let chunk: ChatChunk = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "skipping unparseable stream line");
            return None;
        }
    };

    let delta = chunk
        .message
        .and_then(|m| m.content)
        .unwrap_or_default();
    let grew = !delta.is_empty();
    acc.push_str(&delta);

    if chunk.done {
        Some(ChatOutcome::Final(acc.clone()))
    } else if grew {
        Some(ChatOutcome::Partial(acc.clone()))
    } else {
        None
    }
}

#[async_trait]
impl ChatAdapter for OllamaAdapter {
    async fn send(
        &self,
        prompt: &str,
        _media: Option<&MediaAttachment>,
        descriptor: &ModelDescriptor,
        cancel: CancellationToken,
    ) -> OutcomeStream {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequestBody {
            model: descriptor.wire_code,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        debug!(model = descriptor.wire_code, url = %url, "sending local chat request");
        let request = self.client.post(&url).json(&body);

        Box::pin(stream! {
            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    yield ChatOutcome::Failure(BridgeError::transport(e).to_string());
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let msg = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error)
                    .unwrap_or(body);
                yield ChatOutcome::Failure(format!("local model error ({status}): {msg}"));
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buf = String::new();
            let mut acc = String::new();

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("local chat stream cancelled");
                        return;
                    }
                    next = bytes.next() => next,
                };
                let Some(next) = next else { break };

                let chunk = match next {
                    Ok(b) => b,
                    Err(e) => {
                        yield ChatOutcome::Failure(BridgeError::transport(e).to_string());
                        return;
                    }
                };

                buf.push_str(&String::from_utf8_lossy(&chunk));
                for line in drain_lines(&mut buf) {
                    if let Some(outcome) = fold_line(&line, &mut acc) {
                        let terminal = outcome.is_terminal();
                        yield outcome;
                        if terminal {
                            return;
                        }
                    }
                }
            }

            // The server may omit the final newline; flush what remains.
            let tail = buf.trim().to_string();
            if !tail.is_empty() {
                if let Some(outcome) = fold_line(&tail, &mut acc) {
                    let terminal = outcome.is_terminal();
                    yield outcome;
                    if terminal {
                        return;
                    }
                }
            }

            // EOF without a done marker is a broken transport, not success.
            yield ChatOutcome::Failure("response stream ended before completion".into());
        })
    }
}
