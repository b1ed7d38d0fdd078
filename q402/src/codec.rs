//! Base64 envelope encoding for the q402 wire format.
//!
//! Payment proofs travel in HTTP headers, so every wire payload is
//! serialized to JSON and wrapped in standard-alphabet base64. Integers
//! wider than 53 bits serialize as decimal strings inside the JSON (see
//! [`crate::proto`]) so the envelope survives JavaScript peers.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A wrapper for base64-encoded byte data.
///
/// This type holds bytes that represent base64-encoded data and provides
/// methods for encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Errors produced while encoding or decoding a wire envelope.
///
/// Malformed input is always reported through this type; the codec never
/// panics on untrusted data.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The envelope body is not the expected JSON shape.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes a wire value to JSON and wraps it in base64.
///
/// # Errors
///
/// Returns [`EnvelopeError::Json`] if the value cannot be serialized.
pub fn encode_envelope<T: Serialize>(value: &T) -> Result<String, EnvelopeError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::encode(&json).to_string())
}

/// Decodes a base64 envelope back into a wire value.
///
/// # Errors
///
/// Returns [`EnvelopeError`] on malformed base64 or JSON that does not
/// match the expected shape.
pub fn decode_envelope<T: DeserializeOwned>(envelope: &str) -> Result<T, EnvelopeError> {
    let bytes = Base64Bytes::from(envelope.as_bytes()).decode()?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        amount: String,
        nested: Vec<u8>,
    }

    #[test]
    fn envelope_round_trip() {
        let sample = Sample {
            name: "premium-data".into(),
            // 2^63, past f64 precision when treated as a number
            amount: "9223372036854775808".into(),
            nested: vec![0, 127, 255],
        };
        let envelope = encode_envelope(&sample).unwrap();
        let decoded: Sample = decode_envelope(&envelope).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn rejects_malformed_base64() {
        let err = decode_envelope::<Sample>("not!!!base64");
        assert!(matches!(err, Err(EnvelopeError::Base64(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        let envelope = Base64Bytes::encode(b"{\"name\": ").to_string();
        let err = decode_envelope::<Sample>(&envelope);
        assert!(matches!(err, Err(EnvelopeError::Json(_))));
    }
}
