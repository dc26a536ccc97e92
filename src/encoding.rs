//! Encoding Adapter
//!
//! Text is stored as bytes; the host decides how. The storage core only
//! delegates to a [`TextEncoding`] and never inspects the bytes itself.

use crate::error::{Result, StoreError};

/// Converts text to and from bytes for a specific encoding
pub trait TextEncoding: Send + Sync {
    /// Human-readable encoding name (for logs and errors)
    fn name(&self) -> &str;

    fn encode(&self, text: &str) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<String>;
}

/// UTF-8, no BOM
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl TextEncoding for Utf8 {
    fn name(&self) -> &str {
        "utf-8"
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Encoding(format!("invalid utf-8: {}", e)))
    }
}

/// UTF-16 little endian, no BOM
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf16Le;

impl TextEncoding for Utf16Le {
    fn name(&self) -> &str {
        "utf-16le"
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        if bytes.len() % 2 != 0 {
            return Err(StoreError::Encoding(format!(
                "utf-16le payload has odd length {}",
                bytes.len()
            )));
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units)
            .map_err(|e| StoreError::Encoding(format!("invalid utf-16le: {}", e)))
    }
}
