use crate::foundation::{Hash32, TssError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn parse_hex_32bytes(value: &str) -> Result<Hash32, TssError> {
    let trimmed = value.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(stripped)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| TssError::EncodingError(format!("expected 32 bytes, got {}", len)))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(value: &str) -> Result<Vec<u8>, TssError> {
    Ok(STANDARD.decode(value.trim())?)
}

/// Serde adapter storing byte blobs as base64 strings.
pub mod serde_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::decode_base64(&value).map_err(serde::de::Error::custom)
    }
}
