//! Error taxonomy for the bridge.
//!
//! Every variant is recovered at the adapter or dispatcher boundary and
//! converted into a single `Failure` outcome for the panel. None of these
//! propagate as faults past the dispatcher, and none are fatal to the
//! process.

use thiserror::Error;

use crate::catalog::{MediaKind, ProviderKind};

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The (provider, model key) pair is not present in the catalog.
    #[error("unknown model `{model_key}` for provider `{provider}`")]
    UnknownModel {
        provider: ProviderKind,
        model_key: String,
    },

    /// The attachment kind is outside the selected model's supported set.
    #[error("{model} does not accept {kind} attachments")]
    UnsupportedMediaKind { kind: MediaKind, model: String },

    /// The decoded attachment exceeds the model's input ceiling.
    #[error("attachment is {size} bytes, limit for this model is {limit}")]
    OversizedMedia { size: u64, limit: u64 },

    /// The attachment is not a `data:<mime>;base64,<payload>` string.
    #[error("malformed media encoding: {0}")]
    MalformedMediaEncoding(String),

    /// The panel named a provider tag that matches none of the adapters.
    #[error("unknown provider `{0}`")]
    UnknownProvider(String),

    /// A required configuration value is unset.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// The host model selector matched zero candidates.
    #[error("no model matches selector `{0}`")]
    NoMatchingModel(String),

    /// Any underlying network or API error, carried as a readable message.
    #[error("{0}")]
    Transport(String),
}

impl BridgeError {
    /// Wrap a transport-level error with its source message.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}
