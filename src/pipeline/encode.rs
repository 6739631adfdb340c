//! Image payload encoding: raw bytes ⇄ base64 data-URIs.
//!
//! The two halves of the system disagree on how an image travels. The vision
//! engine and the rasterisation service speak `data:<mime>;base64,<payload>`
//! strings; the batch OCR service wants binary multipart parts. Pages cut from
//! a PDF arrive as data-URIs, uploaded photos arrive as bytes, and either may
//! be sent to either engine, so both directions live here.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mime_guess::mime::Mime;
use thiserror::Error;
use tracing::debug;

/// Fallback media type when neither the declaration nor the bytes say more.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A data-URI that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataUriError {
    #[error("not a data URI (missing 'data:' prefix)")]
    MissingPrefix,

    #[error("data URI has no ',' separating header and payload")]
    MissingSeparator,

    #[error("data URI is not base64-encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// Wrap raw bytes as a `data:<mime>;base64,...` string.
pub fn encode_data_uri(bytes: &[u8], media_type: &str) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    format!("data:{media_type};base64,{b64}")
}

/// Split a data-URI into its media type and still-encoded base64 payload.
pub fn split_data_uri(uri: &str) -> Result<(&str, &str), DataUriError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUriError::MissingPrefix)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingSeparator)?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::NotBase64)?;
    let media_type = if media_type.is_empty() {
        OCTET_STREAM
    } else {
        media_type
    };
    Ok((media_type, payload))
}

/// Decode a data-URI back to its media type and binary content.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let (media_type, payload) = split_data_uri(uri)?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| DataUriError::InvalidBase64(e.to_string()))?;
    Ok((media_type.to_string(), bytes))
}

/// Resolve the media type of an uploaded image.
///
/// A well-formed `type/subtype` declaration wins. An empty, generic or
/// malformed one (`"jpeg"`) is replaced by the format guessed from the file's
/// magic bytes.
pub fn sniff_media_type(bytes: &[u8], declared: &str) -> String {
    let declared = declared.trim();
    if declared != OCTET_STREAM {
        if let Ok(mime) = declared.parse::<Mime>() {
            return mime.essence_str().to_string();
        }
        if !declared.is_empty() {
            debug!("Ignoring malformed media type {declared:?}");
        }
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => OCTET_STREAM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn encode_then_decode_preserves_bytes_and_type() {
        let uri = encode_data_uri(b"hello", "image/png");
        assert_eq!(uri, "data:image/png;base64,aGVsbG8=");
        let (mime, bytes) = decode_data_uri(&uri).expect("valid data uri");
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decode_rejects_plain_base64() {
        assert_eq!(decode_data_uri("aGVsbG8="), Err(DataUriError::MissingPrefix));
    }

    #[test]
    fn decode_rejects_non_base64_uri() {
        assert_eq!(
            decode_data_uri("data:text/plain,hello"),
            Err(DataUriError::NotBase64)
        );
    }

    #[test]
    fn decode_reports_corrupt_payload() {
        let err = decode_data_uri("data:image/png;base64,@@@").unwrap_err();
        assert!(matches!(err, DataUriError::InvalidBase64(_)));
    }

    #[test]
    fn sniff_keeps_specific_declaration() {
        assert_eq!(sniff_media_type(PNG_MAGIC, "image/jpeg"), "image/jpeg");
    }

    #[test]
    fn sniff_guesses_png_when_declaration_is_generic() {
        assert_eq!(sniff_media_type(PNG_MAGIC, OCTET_STREAM), "image/png");
        assert_eq!(sniff_media_type(PNG_MAGIC, ""), "image/png");
    }

    #[test]
    fn sniff_replaces_malformed_declaration() {
        assert_eq!(sniff_media_type(PNG_MAGIC, "jpeg"), "image/png");
        assert_eq!(sniff_media_type(b"not an image", "jpeg"), OCTET_STREAM);
    }

    #[test]
    fn sniff_drops_declaration_parameters() {
        assert_eq!(
            sniff_media_type(PNG_MAGIC, "image/jpeg; quality=high"),
            "image/jpeg"
        );
    }

    #[test]
    fn sniff_falls_back_to_octet_stream() {
        assert_eq!(sniff_media_type(b"not an image", ""), OCTET_STREAM);
    }
}
