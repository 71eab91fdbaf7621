//! Static model catalog.
//!
//! Maps `(provider, model key)` pairs to immutable [`ModelDescriptor`]s.
//! Built once at startup and only read afterwards, so it can be shared
//! across tasks without locking.

use std::fmt;

use crate::error::BridgeError;

/// The three provider backends the dispatcher can route to.
///
/// A closed enum rather than a string tag: adapter selection is an
/// exhaustive `match`, so a new provider cannot be added without the
/// compiler pointing at every dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Ollama-style local inference server, streaming.
    LocalModel,
    /// Gemini-style hosted multimodal API, single-shot.
    HostedMultimodal,
    /// Model facility supplied by the embedding editor host.
    HostModel,
}

impl ProviderKind {
    /// Parse a panel-supplied provider tag. Returns `None` for tags that
    /// match no adapter — callers report those as `UnknownProvider`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag {
            "local" => Some(Self::LocalModel),
            "gemini" => Some(Self::HostedMultimodal),
            "host" => Some(Self::HostModel),
            _ => None,
        }
    }

    /// The canonical wire tag for this provider.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LocalModel => "local",
            Self::HostedMultimodal => "gemini",
            Self::HostModel => "host",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Kinds of media a panel attachment can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Text,
}

impl MediaKind {
    /// Parse a panel-supplied media type tag.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Immutable metadata for a selectable model.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Human-readable name shown by the panel and the CLI.
    pub display_name: &'static str,
    /// Identifier sent on the wire to the provider.
    pub wire_code: &'static str,
    /// Media kinds this model accepts as attachments.
    pub media_kinds: &'static [MediaKind],
    /// Decoded input ceiling in bytes. `None` means the provider default
    /// applies (see `media::DEFAULT_MAX_INPUT_BYTES`).
    pub max_input_bytes: Option<u64>,
}

impl ModelDescriptor {
    pub fn supports(&self, kind: MediaKind) -> bool {
        self.media_kinds.contains(&kind)
    }
}

/// One catalog row: provider, panel-facing key, descriptor.
struct CatalogEntry {
    provider: ProviderKind,
    key: &'static str,
    descriptor: ModelDescriptor,
}

const TEXT_ONLY: &[MediaKind] = &[MediaKind::Text];
const ALL_MEDIA: &[MediaKind] = &[
    MediaKind::Image,
    MediaKind::Video,
    MediaKind::Audio,
    MediaKind::Text,
];

/// 20 MiB, the hosted provider's inline payload ceiling.
const HOSTED_MAX_INPUT_BYTES: u64 = 20 * 1024 * 1024;

/// Read-only registry of selectable models.
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    /// The built-in model table. The first entry for each provider is that
    /// provider's default when the panel omits a model key.
    pub fn builtin() -> Self {
        let entries = vec![
            CatalogEntry {
                provider: ProviderKind::LocalModel,
                key: "llama",
                descriptor: ModelDescriptor {
                    display_name: "Llama 3.1 (local)",
                    wire_code: "llama3.1",
                    media_kinds: TEXT_ONLY,
                    max_input_bytes: None,
                },
            },
            CatalogEntry {
                provider: ProviderKind::LocalModel,
                key: "mistral",
                descriptor: ModelDescriptor {
                    display_name: "Mistral (local)",
                    wire_code: "mistral",
                    media_kinds: TEXT_ONLY,
                    max_input_bytes: None,
                },
            },
            CatalogEntry {
                provider: ProviderKind::HostedMultimodal,
                key: "flash",
                descriptor: ModelDescriptor {
                    display_name: "Gemini 1.5 Flash",
                    wire_code: "gemini-1.5-flash",
                    media_kinds: ALL_MEDIA,
                    max_input_bytes: Some(HOSTED_MAX_INPUT_BYTES),
                },
            },
            CatalogEntry {
                provider: ProviderKind::HostedMultimodal,
                key: "pro",
                descriptor: ModelDescriptor {
                    display_name: "Gemini 1.5 Pro",
                    wire_code: "gemini-1.5-pro",
                    media_kinds: ALL_MEDIA,
                    max_input_bytes: Some(HOSTED_MAX_INPUT_BYTES),
                },
            },
            CatalogEntry {
                provider: ProviderKind::HostModel,
                key: "chat",
                descriptor: ModelDescriptor {
                    display_name: "Editor chat model",
                    wire_code: "gpt-4o",
                    media_kinds: TEXT_ONLY,
                    max_input_bytes: None,
                },
            },
        ];
        Self { entries }
    }

    /// Resolve a descriptor. `model_key: None` falls back to the
    /// provider's default entry.
    pub fn lookup(
        &self,
        provider: ProviderKind,
        model_key: Option<&str>,
    ) -> Result<&ModelDescriptor, BridgeError> {
        let found = match model_key {
            Some(key) => self
                .entries
                .iter()
                .find(|e| e.provider == provider && e.key == key),
            None => self.entries.iter().find(|e| e.provider == provider),
        };

        found.map(|e| &e.descriptor).ok_or_else(|| BridgeError::UnknownModel {
            provider,
            model_key: model_key.unwrap_or("<default>").to_string(),
        })
    }

    /// Iterate all rows, for listings.
    pub fn entries(&self) -> impl Iterator<Item = (ProviderKind, &'static str, &ModelDescriptor)> {
        self.entries.iter().map(|e| (e.provider, e.key, &e.descriptor))
    }
}
