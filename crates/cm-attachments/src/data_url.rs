//! `data:` URL encoding of attachment payloads

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::service::{AttachmentError, AttachmentResult};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Encode bytes as `data:<mime>;base64,<payload>`
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    let mime = if mime_type.trim().is_empty() {
        FALLBACK_MIME
    } else {
        mime_type.trim()
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a data URL into its MIME type and decoded bytes
pub fn decode(data_url: &str) -> AttachmentResult<(String, Vec<u8>)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AttachmentError::InvalidPayload("missing data: prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AttachmentError::InvalidPayload("missing payload separator".into()))?;

    let mut parts = header.split(';');
    let mime = match parts.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => FALLBACK_MIME.to_string(),
    };
    let is_base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| AttachmentError::InvalidPayload(e.to_string()))?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((mime, bytes))
}

/// Byte size estimated from the base64 payload length
pub fn approximate_size(data_url: &str) -> Option<u64> {
    let (_, payload) = data_url.split_once(',')?;
    if payload.is_empty() {
        return None;
    }
    Some(((payload.len() as f64) * 3.0 / 4.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let url = encode("application/pdf", b"%PDF-1.4");
        assert!(url.starts_with("data:application/pdf;base64,"));

        let (mime, bytes) = decode(&url).unwrap();
        assert_eq!(mime, "application/pdf");
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_blank_mime_falls_back() {
        let url = encode("", b"x");
        assert!(url.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("https://example.com/a.pdf").is_err());
        assert!(decode("data:image/png;base64").is_err());
        assert!(decode("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_approximate_size() {
        // 8 chars of base64 -> 6 bytes
        assert_eq!(approximate_size("data:image/png;base64,AAAAAAAA"), Some(6));
        assert_eq!(approximate_size("data:image/png;base64,"), None);
        assert_eq!(approximate_size("no-comma"), None);
    }
}
