//! Opaque media clips (voice notes, video circles).
//!
//! The server never decodes a clip for playback. It only checks that the
//! payload is base64 and that the decoded size stays under the ceiling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};

pub const DEFAULT_MAX_MEDIA_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Voice,
    Video,
}

/// Strip an optional `data:<mime>;base64,` prefix
fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    }
}

/// Validate a clip and return its decoded size in bytes
pub fn validate_clip(payload: &str, max_bytes: usize) -> GameResult<usize> {
    let data = strip_data_url(payload);
    if data.is_empty() {
        return Err(GameError::InvalidMedia("empty payload".to_string()));
    }

    // Reject before decoding when even the lower bound is too large
    let estimate = data.len() / 4 * 3;
    if estimate > max_bytes + 2 {
        return Err(GameError::MediaTooLarge {
            size: estimate,
            max: max_bytes,
        });
    }

    let decoded = STANDARD
        .decode(data)
        .map_err(|e| GameError::InvalidMedia(e.to_string()))?;
    if decoded.len() > max_bytes {
        return Err(GameError::MediaTooLarge {
            size: decoded.len(),
            max: max_bytes,
        });
    }
    Ok(decoded.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_clip() {
        let payload = STANDARD.encode(b"OggS fake voice");
        assert_eq!(validate_clip(&payload, 1024), Ok(15));
    }

    #[test]
    fn test_data_url_prefix_accepted() {
        let payload = format!("data:audio/webm;base64,{}", STANDARD.encode([1u8, 2, 3]));
        assert_eq!(validate_clip(&payload, 1024), Ok(3));
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            validate_clip("not base64 at all!", 1024),
            Err(GameError::InvalidMedia(_))
        ));
        assert!(matches!(validate_clip("", 1024), Err(GameError::InvalidMedia(_))));
    }

    #[test]
    fn test_too_large() {
        let payload = STANDARD.encode(vec![0u8; 2048]);
        assert!(matches!(
            validate_clip(&payload, 1024),
            Err(GameError::MediaTooLarge { max: 1024, .. })
        ));
    }

    #[test]
    fn test_kind_serde() {
        assert_eq!(serde_json::to_string(&MediaKind::Video).unwrap(), "\"video\"");
    }
}
