use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Serialize, Serializer};

use crate::error::SchemaError;

/// Uploaded image bytes, encoded as the `data:` URI the remote service expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(String);

impl ImageData {
    /// Sniff the image format from its magic bytes and encode it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let mime = sniff_mime(bytes).ok_or_else(|| SchemaError::InvalidField {
            field: "image",
            reason: "unsupported image format (expected PNG, JPEG, GIF or WEBP)".to_string(),
        })?;
        Ok(Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes))))
    }

    pub fn as_data_uri(&self) -> &str {
        &self.0
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"\xff\xd8\xff")
        || bytes.get(6..10).is_some_and(|tag| tag == b"JFIF" || tag == b"Exif")
    {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        Some("image/webp")
    } else {
        None
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
