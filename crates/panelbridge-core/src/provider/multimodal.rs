//! Hosted-multimodal adapter.
//!
//! One non-streaming `generateContent` call against a Gemini-style API.
//! An attachment rides along as an `inlineData` part, with MIME type and
//! base64 payload extracted from the panel's data-URL encoding.
//!
//! Generation parameters are fixed per modality — they are wire contract
//! constants, not user-tunable knobs. The API key is read from
//! configuration or the process environment at call time; its absence
//! surfaces as a transport failure on the request, never at startup.

use async_stream::stream;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{failure_stream, ChatAdapter, ChatOutcome, OutcomeStream};
use crate::catalog::ModelDescriptor;
use crate::error::BridgeError;
use crate::media::{self, MediaAttachment, ParsedMedia};

/// Default endpoint of the hosted generation API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment fallback for the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Generation parameters for requests that carry media.
const MEDIA_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.4,
    top_k: 32,
    top_p: 1.0,
    max_output_tokens: 4096,
};

/// Generation parameters for text-only requests.
const TEXT_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.9,
    top_k: 1,
    top_p: 1.0,
    max_output_tokens: 2048,
};

/// Adapter for a Gemini-compatible hosted multimodal API.
pub struct GeminiAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiAdapter {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Configured key, else the environment, resolved per call.
    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_k: i32,
    top_p: f64,
    max_output_tokens: i32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_parts<'a>(prompt: &'a str, parsed: Option<ParsedMedia>) -> Vec<Part<'a>> {
    let mut parts = vec![Part {
        text: Some(prompt),
        inline_data: None,
    }];
    if let Some(media) = parsed {
        parts.push(Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: media.mime_type,
                data: media.payload,
            }),
        });
    }
    parts
}

/// Concatenated text of the first candidate, `None` when the response
/// carried no candidates at all.
fn extract_text(response: &GenerateResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let parts = candidate.content.as_ref().map(|c| c.parts.as_slice()).unwrap_or(&[]);
    Some(
        parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<String>(),
    )
}

async fn execute(request: reqwest::RequestBuilder) -> ChatOutcome {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => return ChatOutcome::Failure(BridgeError::transport(e).to_string()),
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => return ChatOutcome::Failure(BridgeError::transport(e).to_string()),
    };

    if !status.is_success() {
        let msg = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return ChatOutcome::Failure(format!("generation API error ({status}): {msg}"));
    }

    match serde_json::from_str::<GenerateResponse>(&body) {
        Ok(parsed) => match extract_text(&parsed) {
            Some(text) => ChatOutcome::Final(text),
            None => ChatOutcome::Failure("generation API returned no candidates".into()),
        },
        Err(e) => ChatOutcome::Failure(format!("failed to parse generation response: {e}")),
    }
}

#[async_trait]
impl ChatAdapter for GeminiAdapter {
    async fn send(
        &self,
        prompt: &str,
        media: Option<&MediaAttachment>,
        descriptor: &ModelDescriptor,
        cancel: CancellationToken,
    ) -> OutcomeStream {
        let parsed = match media.map(|m| media::parse_data_url(&m.data_url)).transpose() {
            Ok(p) => p,
            Err(e) => return failure_stream(e.to_string()),
        };

        let Some(api_key) = self.resolve_api_key() else {
            return failure_stream(
                BridgeError::Transport(format!("{API_KEY_ENV} is not configured")).to_string(),
            );
        };

        let generation_config = if parsed.is_some() {
            MEDIA_GENERATION
        } else {
            TEXT_GENERATION
        };
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: build_parts(prompt, parsed),
            }],
            generation_config,
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, descriptor.wire_code
        );
        debug!(model = descriptor.wire_code, multimodal = media.is_some(), "sending generate-content request");
        let request = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .json(&body);

        Box::pin(stream! {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("generate-content request cancelled");
                    return;
                }
                outcome = execute(request) => outcome,
            };
            yield outcome;
        })
    }
}
