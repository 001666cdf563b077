//! Compressed request body encoding.
//!
//! When enabled, the JSON body is gzip-compressed, base64-encoded and
//! wrapped as `{"encoding":"base64","data":"..."}`.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::error::ProviderError;

/// Envelope carrying an encoded request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedBody {
    pub encoding: &'static str,
    pub data: String,
}

impl EncodedBody {
    /// Encode `body` as gzip + base64.
    pub fn new<T: Serialize>(body: &T) -> Result<Self, ProviderError> {
        Ok(Self {
            encoding: "base64",
            data: encode_request_body(body)?,
        })
    }
}

/// Serialize `body` to JSON, gzip it and return the base64 text.
pub fn encode_request_body<T: Serialize>(body: &T) -> Result<String, ProviderError> {
    let json = serde_json::to_vec(body).map_err(|e| ProviderError::Encode(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| ProviderError::Encode(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ProviderError::Encode(e.to_string()))?;

    Ok(STANDARD.encode(compressed))
}

#[cfg(test)]
pub(crate) fn decode_request_body(data: &str) -> serde_json::Value {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let compressed = STANDARD.decode(data).unwrap();
    let mut json = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut json)
        .unwrap();
    serde_json::from_str(&json).unwrap()
}
