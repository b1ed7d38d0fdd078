//! Canonical RLP encoding for the delegated-execution authorization tuple.
//!
//! The authorization tuple `[chain_id, address, nonce]` is RLP-encoded and
//! hashed under the EIP-7702 signing domain before it is signed. Both sides
//! of the protocol must produce byte-identical encodings, so this module
//! implements the minimal subset of RLP the tuple needs with fixed-width
//! integer types and explicit big-endian serialization, plus a strict
//! decoder that rejects every non-canonical form to keep signed bytes
//! non-malleable.

use alloy_primitives::Address;

/// Short-form string prefix base (`0x80 + len` for payloads up to 55 bytes).
const STRING_SHORT: u8 = 0x80;
/// Long-form string prefix base (`0xB7 + len(len_bytes)`).
const STRING_LONG: u8 = 0xB7;
/// Short-form list prefix base.
const LIST_SHORT: u8 = 0xC0;
/// Long-form list prefix base.
const LIST_LONG: u8 = 0xF7;

/// Errors produced by the canonical RLP decoder.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RlpError {
    /// Input ended before the announced payload.
    #[error("unexpected end of RLP input")]
    UnexpectedEof,
    /// The encoding is valid RLP but not the canonical form.
    #[error("non-canonical RLP encoding")]
    NonCanonical,
    /// Bytes remained after the outermost item.
    #[error("trailing bytes after RLP item")]
    TrailingBytes,
    /// A decoded field does not have the expected shape.
    #[error("unexpected RLP structure: {0}")]
    UnexpectedStructure(&'static str),
}

/// Encodes an unsigned integer as its shortest big-endian byte string.
///
/// Zero encodes to the empty byte string; no output ever carries a leading
/// zero byte.
#[must_use]
pub fn min_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Encodes a single byte string per the RLP string rules.
#[must_use]
pub fn encode_item(payload: &[u8]) -> Vec<u8> {
    if payload.len() == 1 && payload[0] < STRING_SHORT {
        return payload.to_vec();
    }
    let mut out = length_prefix(payload.len(), STRING_SHORT, STRING_LONG);
    out.extend_from_slice(payload);
    out
}

/// Encodes a list from already-encoded items.
#[must_use]
pub fn encode_list(encoded_items: &[Vec<u8>]) -> Vec<u8> {
    let body_len = encoded_items.iter().map(Vec::len).sum();
    let mut out = length_prefix(body_len, LIST_SHORT, LIST_LONG);
    for item in encoded_items {
        out.extend_from_slice(item);
    }
    out
}

/// Encodes the EIP-7702 authorization tuple `[chain_id, address, nonce]`.
///
/// This is the exact byte sequence that is hashed and signed to authorize
/// delegated execution; integers use minimal big-endian form, so a zero
/// nonce encodes as the RLP empty string (`0x80`).
#[must_use]
pub fn encode_authorization_tuple(chain_id: u64, address: &Address, nonce: u64) -> Vec<u8> {
    let items = [
        encode_item(&min_be_bytes(chain_id)),
        encode_item(address.as_slice()),
        encode_item(&min_be_bytes(nonce)),
    ];
    encode_list(&items)
}

/// Decodes a single canonical RLP string item from the front of `input`.
///
/// Returns the payload and the remaining input.
///
/// # Errors
///
/// Returns [`RlpError`] on truncated input, list prefixes, or any
/// non-canonical encoding (wrapped single bytes below `0x80`, long form
/// used for short payloads, non-minimal length fields).
pub fn decode_item(input: &[u8]) -> Result<(&[u8], &[u8]), RlpError> {
    let (&prefix, rest) = input.split_first().ok_or(RlpError::UnexpectedEof)?;
    match prefix {
        0x00..STRING_SHORT => Ok((&input[..1], rest)),
        STRING_SHORT..STRING_LONG => {
            let len = (prefix - STRING_SHORT) as usize;
            let (payload, rest) = split_payload(rest, len)?;
            if len == 1 && payload[0] < STRING_SHORT {
                // A lone byte below 0x80 must encode as itself.
                return Err(RlpError::NonCanonical);
            }
            Ok((payload, rest))
        }
        STRING_LONG..LIST_SHORT => {
            let len = decode_long_length(prefix - STRING_LONG, rest)?;
            let rest = &rest[(prefix - STRING_LONG) as usize..];
            let (payload, rest) = split_payload(rest, len)?;
            Ok((payload, rest))
        }
        _ => Err(RlpError::UnexpectedStructure("expected string, found list")),
    }
}

/// Decodes a canonical RLP list frame, returning the list body and the
/// remaining input.
///
/// # Errors
///
/// Returns [`RlpError`] on truncated input, string prefixes, or
/// non-canonical length framing.
pub fn decode_list_frame(input: &[u8]) -> Result<(&[u8], &[u8]), RlpError> {
    let (&prefix, rest) = input.split_first().ok_or(RlpError::UnexpectedEof)?;
    match prefix {
        LIST_SHORT..LIST_LONG => {
            let len = (prefix - LIST_SHORT) as usize;
            split_payload(rest, len)
        }
        LIST_LONG..=0xFF => {
            let len = decode_long_length(prefix - LIST_LONG, rest)?;
            let rest = &rest[(prefix - LIST_LONG) as usize..];
            split_payload(rest, len)
        }
        _ => Err(RlpError::UnexpectedStructure("expected list, found string")),
    }
}

/// Decodes an authorization tuple previously produced by
/// [`encode_authorization_tuple`].
///
/// # Errors
///
/// Returns [`RlpError`] for any encoding that is not the canonical tuple
/// form, including integer fields with leading zeros and addresses that are
/// not exactly 20 bytes.
pub fn decode_authorization_tuple(input: &[u8]) -> Result<(u64, Address, u64), RlpError> {
    let (body, rest) = decode_list_frame(input)?;
    if !rest.is_empty() {
        return Err(RlpError::TrailingBytes);
    }
    let (chain_id_bytes, body) = decode_item(body)?;
    let chain_id = decode_uint(chain_id_bytes)?;
    let (address_bytes, body) = decode_item(body)?;
    let address = Address::try_from(address_bytes)
        .map_err(|_| RlpError::UnexpectedStructure("address must be 20 bytes"))?;
    let (nonce_bytes, body) = decode_item(body)?;
    let nonce = decode_uint(nonce_bytes)?;
    if !body.is_empty() {
        return Err(RlpError::TrailingBytes);
    }
    Ok((chain_id, address, nonce))
}

fn split_payload(input: &[u8], len: usize) -> Result<(&[u8], &[u8]), RlpError> {
    if input.len() < len {
        return Err(RlpError::UnexpectedEof);
    }
    Ok(input.split_at(len))
}

/// Decodes a long-form length field, enforcing that it is itself minimal
/// and actually requires long form.
fn decode_long_length(len_of_len: u8, input: &[u8]) -> Result<usize, RlpError> {
    let len_of_len = len_of_len as usize;
    if input.len() < len_of_len {
        return Err(RlpError::UnexpectedEof);
    }
    let len_bytes = &input[..len_of_len];
    if len_bytes.is_empty() || len_bytes[0] == 0 {
        return Err(RlpError::NonCanonical);
    }
    let mut len: usize = 0;
    for &b in len_bytes {
        len = len.checked_mul(256).ok_or(RlpError::NonCanonical)?;
        len += b as usize;
    }
    if len <= 55 {
        return Err(RlpError::NonCanonical);
    }
    Ok(len)
}

/// Interprets a decoded item payload as a minimal big-endian integer.
fn decode_uint(payload: &[u8]) -> Result<u64, RlpError> {
    if payload.len() > 8 {
        return Err(RlpError::UnexpectedStructure("integer wider than 64 bits"));
    }
    if payload.first() == Some(&0) {
        return Err(RlpError::NonCanonical);
    }
    let mut value: u64 = 0;
    for &b in payload {
        value = (value << 8) | u64::from(b);
    }
    Ok(value)
}

fn length_prefix(len: usize, short_base: u8, long_base: u8) -> Vec<u8> {
    if len <= 55 {
        #[allow(clippy::cast_possible_truncation)]
        return vec![short_base + len as u8];
    }
    let len_bytes = min_be_bytes(len as u64);
    #[allow(clippy::cast_possible_truncation)]
    let mut out = vec![long_base + len_bytes.len() as u8];
    out.extend_from_slice(&len_bytes);
    out
}
