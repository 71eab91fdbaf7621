//! Panel message types.
//!
//! The wire contract with the presentation surface: inbound commands are
//! camelCase JSON objects discriminated by `command`, outbound replies are
//! either `chatResponse` (partial and final text) or `error`.

use serde::{Deserialize, Serialize};

/// An inbound message from the panel surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelCommand {
    /// Discriminator; anything other than `"chat"` is ignored.
    pub command: String,
    /// User prompt text.
    #[serde(default)]
    pub text: String,
    /// Provider tag (`local`, `gemini`, `host`).
    pub model: Option<String>,
    /// Model key within the provider's catalog entries.
    pub model_key: Option<String>,
    /// Attachment as a `data:<mime>;base64,<payload>` string.
    pub media_data: Option<String>,
    /// Declared kind of the attachment (`image`, `video`, `audio`, `text`).
    pub media_type: Option<String>,
}

/// An outbound message to the panel surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelReply {
    pub command: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl PanelReply {
    /// Successful (partial or final) response text.
    pub fn chat_response(text: impl Into<String>, media_type: Option<String>) -> Self {
        Self {
            command: "chatResponse",
            text: text.into(),
            media_type,
        }
    }

    /// Error-styled message replacing the response area.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            command: "error",
            text: text.into(),
            media_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_command_deserializes_camel_case() {
        let json = r#"{
            "command": "chat",
            "text": "hello",
            "model": "gemini",
            "modelKey": "flash",
            "mediaData": "data:image/png;base64,AAAA",
            "mediaType": "image"
        }"#;
        let cmd: PanelCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.command, "chat");
        assert_eq!(cmd.model.as_deref(), Some("gemini"));
        assert_eq!(cmd.model_key.as_deref(), Some("flash"));
        assert_eq!(cmd.media_type.as_deref(), Some("image"));
    }

    #[test]
    fn test_minimal_command_fills_defaults() {
        let cmd: PanelCommand = serde_json::from_str(r#"{"command":"chat"}"#).unwrap();
        assert_eq!(cmd.text, "");
        assert!(cmd.model.is_none());
        assert!(cmd.media_data.is_none());
    }

    #[test]
    fn test_reply_serialization() {
        let reply = PanelReply::chat_response("Hello", Some("image".into()));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"command": "chatResponse", "text": "Hello", "mediaType": "image"})
        );

        let err = PanelReply::error("boom");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, serde_json::json!({"command": "error", "text": "boom"}));
    }
}
