//! Text-safe encoding for binary blobs carried in sync payloads.
//!
//! The merge transport is JSON-only, so image data and raw book archives are
//! moved as standard base64. Decoding also accepts `data:` URLs, which is how
//! the reader stores inline images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::Result;

/// Encode bytes as standard (padded) base64.
pub fn encode_blob(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 blob or a base64 `data:` URL back into bytes.
pub fn decode_blob(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => trimmed,
    };
    Ok(STANDARD.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_byte_value_survives_round_trip() {
        let bytes: Vec<u8> = (0..=255).cycle().take(4099).collect();
        assert_eq!(decode_blob(&encode_blob(&bytes)).unwrap(), bytes);
        assert_eq!(decode_blob(&encode_blob(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_accepts_data_urls() {
        let encoded = format!("data:image/png;base64,{}", encode_blob(b"\x89PNG"));
        assert_eq!(decode_blob(&encoded).unwrap(), b"\x89PNG".to_vec());
    }

    #[test]
    fn decode_rejects_invalid_text() {
        let error = decode_blob("not base64!").unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::Storage);
    }
}
