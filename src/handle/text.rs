//! Text framing
//!
//! ```text
//! ┌────────────────┬──────────────────────────┐
//! │ Length (4, LE) │ Encoded text (Length)    │
//! └────────────────┴──────────────────────────┘
//! ```
//! The header keeps the serialized form non-empty even for empty text.

use crate::encoding::TextEncoding;
use crate::error::{Result, StoreError};

pub(crate) const TEXT_HEADER_SIZE: usize = 4;

/// Encode `text` and prepend its byte length
pub(crate) fn frame(text: &str, encoding: &dyn TextEncoding) -> Result<Vec<u8>> {
    let encoded = encoding.encode(text)?;
    let len = u32::try_from(encoded.len()).map_err(|_| {
        StoreError::InvalidArgument(format!(
            "text encodes to {} bytes, more than a single handle can hold",
            encoded.len()
        ))
    })?;

    let mut framed = Vec::with_capacity(TEXT_HEADER_SIZE + encoded.len());
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(&encoded);
    Ok(framed)
}

/// Strip the header and decode
pub(crate) fn unframe(framed: &[u8], encoding: &dyn TextEncoding) -> Result<String> {
    if framed.len() < TEXT_HEADER_SIZE {
        return Err(StoreError::Corrupted(format!(
            "text record of {} bytes is shorter than its header",
            framed.len()
        )));
    }
    let (header, body) = framed.split_at(TEXT_HEADER_SIZE);
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if len != body.len() {
        return Err(StoreError::Corrupted(format!(
            "text header says {} bytes but {} are stored",
            len,
            body.len()
        )));
    }
    encoding.decode(body)
}
