//! Attachment parsing and validation.
//!
//! Pure functions, no I/O. The validator runs before any adapter is
//! invoked; the multimodal adapter reuses [`parse_data_url`] to pull the
//! MIME type and payload out of the panel's data-URL encoding.

use base64::Engine;

use crate::catalog::{MediaKind, ModelDescriptor};
use crate::error::BridgeError;

/// Ceiling applied when a descriptor declares no input limit of its own.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 20 * 1024 * 1024;

/// A panel attachment as received on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    /// `data:<mime>;base64,<payload>` string from the panel.
    pub data_url: String,
    /// Kind declared by the panel alongside the payload.
    pub kind: MediaKind,
}

/// A data URL split into its MIME type and base64 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMedia {
    pub mime_type: String,
    /// Payload still base64-encoded, as the hosted API consumes it.
    pub payload: String,
}

/// Split a `data:<mime>;base64,<payload>` string.
///
/// Fails with `MalformedMediaEncoding` when the prefix shape is wrong or
/// the MIME type is empty. Payload bytes are not decoded here.
pub fn parse_data_url(data_url: &str) -> Result<ParsedMedia, BridgeError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| BridgeError::MalformedMediaEncoding("missing `data:` prefix".into()))?;

    let (mime_type, payload) = rest.split_once(";base64,").ok_or_else(|| {
        BridgeError::MalformedMediaEncoding("missing `;base64,` separator".into())
    })?;

    if mime_type.is_empty() {
        return Err(BridgeError::MalformedMediaEncoding(
            "could not extract MIME type".into(),
        ));
    }

    Ok(ParsedMedia {
        mime_type: mime_type.to_string(),
        payload: payload.to_string(),
    })
}

/// Decoded byte length of a parsed payload. Fails with
/// `MalformedMediaEncoding` when the payload is not valid base64.
pub fn decoded_len(media: &ParsedMedia) -> Result<u64, BridgeError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(media.payload.as_bytes())
        .map_err(|e| BridgeError::MalformedMediaEncoding(e.to_string()))?;
    Ok(bytes.len() as u64)
}

/// Check an attachment against the selected model's capabilities.
///
/// Kind first, then size; the size check decodes the payload, so a
/// malformed attachment also fails here rather than inside an adapter.
pub fn validate(media: &MediaAttachment, descriptor: &ModelDescriptor) -> Result<(), BridgeError> {
    if !descriptor.supports(media.kind) {
        return Err(BridgeError::UnsupportedMediaKind {
            kind: media.kind,
            model: descriptor.display_name.to_string(),
        });
    }

    let parsed = parse_data_url(&media.data_url)?;
    let size = decoded_len(&parsed)?;
    let limit = descriptor.max_input_bytes.unwrap_or(DEFAULT_MAX_INPUT_BYTES);
    if size > limit {
        return Err(BridgeError::OversizedMedia { size, limit });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MediaKind, ModelDescriptor};

    fn descriptor(kinds: &'static [MediaKind], max: Option<u64>) -> ModelDescriptor {
        ModelDescriptor {
            display_name: "Test Model",
            wire_code: "test-model",
            media_kinds: kinds,
            max_input_bytes: max,
        }
    }

    #[test]
    fn test_parse_extracts_mime_and_payload() {
        let parsed = parse_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.payload, "AAAA");
    }

    #[test]
    fn test_parse_rejects_missing_prefix() {
        let err = parse_data_url("image/png;base64,AAAA").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedMediaEncoding(_)));
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        let err = parse_data_url("data:image/png,AAAA").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedMediaEncoding(_)));
    }

    #[test]
    fn test_parse_rejects_empty_mime() {
        let err = parse_data_url("data:;base64,AAAA").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedMediaEncoding(_)));
    }

    #[test]
    fn test_decoded_len() {
        let parsed = parse_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(decoded_len(&parsed).unwrap(), 3);
    }

    #[test]
    fn test_decoded_len_rejects_bad_base64() {
        let parsed = parse_data_url("data:image/png;base64,@@not-base64@@").unwrap();
        let err = decoded_len(&parsed).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedMediaEncoding(_)));
    }

    #[test]
    fn test_validate_unsupported_kind() {
        let media = MediaAttachment {
            data_url: "data:image/png;base64,AAAA".into(),
            kind: MediaKind::Image,
        };
        let d = descriptor(&[MediaKind::Text], None);
        let err = validate(&media, &d).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedMediaKind { .. }));
    }

    #[test]
    fn test_validate_oversized() {
        let media = MediaAttachment {
            data_url: "data:image/png;base64,AAAAAAAA".into(),
            kind: MediaKind::Image,
        };
        // 8 base64 chars decode to 6 bytes, over a 4-byte ceiling.
        let d = descriptor(&[MediaKind::Image], Some(4));
        let err = validate(&media, &d).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::OversizedMedia { size: 6, limit: 4 }
        ));
    }

    #[test]
    fn test_validate_ok_under_default_ceiling() {
        let media = MediaAttachment {
            data_url: "data:image/png;base64,AAAA".into(),
            kind: MediaKind::Image,
        };
        let d = descriptor(&[MediaKind::Image], None);
        assert!(validate(&media, &d).is_ok());
    }
}
