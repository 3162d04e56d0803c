//! Shared padded-plaintext encoding used by both handshake framing (§4.4)
//! and transport framing (§4.2).
//!
//! Both framing layers describe the same structure — `be16(len(body)) ||
//! body || zeros(pad)` — against a floor on the *plaintext* length (not
//! the eventual ciphertext). Resolved as one routine; see DESIGN.md for
//! why the two spec sections' wording doesn't need two implementations.

use crate::error::{NoiseSocketError, Result};

/// Build the padded plaintext for a body, given an optional floor on the
/// total plaintext length (inner 2-byte length included).
///
/// `plaintext_total = max(len(body) + 2, padded_length)`. If
/// `padded_length` is `None` or smaller than `len(body) + 2`, no padding
/// is added beyond the natural minimum.
pub fn pad(body: &[u8], padded_length: Option<u16>) -> Vec<u8> {
    let natural = body.len() + 2;
    let floor = padded_length.map(|p| p as usize).unwrap_or(0);
    let total = natural.max(floor);

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(body);
    out.resize(total, 0);
    out
}

/// Strip the inner 2-byte length prefix and trailing padding back off.
///
/// Fails with [`NoiseSocketError::Malformed`] if the plaintext is shorter
/// than the 2-byte length prefix, or if the encoded body length would
/// reach past the end of the plaintext.
pub fn unpad(plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() < 2 {
        return Err(NoiseSocketError::Malformed(
            "padded plaintext shorter than the 2-byte inner length prefix".into(),
        ));
    }
    let body_len = u16::from_be_bytes([plaintext[0], plaintext[1]]) as usize;
    if body_len > plaintext.len() - 2 {
        return Err(NoiseSocketError::Malformed(format!(
            "inner body length {body_len} exceeds available plaintext ({} bytes)",
            plaintext.len() - 2
        )));
    }
    Ok(plaintext[2..2 + body_len].to_vec())
}
