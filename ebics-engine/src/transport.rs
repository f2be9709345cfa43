//! Order-data transport: zlib, Base64, segmentation, identifiers

use crate::error::{EbicsError, Result, ReturnCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::Rng;
use std::io::{Read, Write};

/// Segment size in Base64 characters.
pub const SEGMENT_SIZE: usize = 4096;

/// zlib-deflate a byte buffer.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| EbicsError::Internal(format!("deflate: {}", e)))
}

/// zlib-inflate a byte buffer; malformed input is an XML-level error
/// since the payload never reaches the parser.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| EbicsError::protocol(ReturnCode::InvalidXml, format!("inflate: {}", e)))?;
    Ok(out)
}

/// Standard Base64 encode.
pub fn b64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Standard Base64 decode.
pub fn b64_decode(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data.trim())
        .map_err(|e| EbicsError::protocol(ReturnCode::InvalidXml, format!("base64: {}", e)))
}

/// Number of segments a Base64 payload splits into (at least one).
pub fn segment_count(encoded_len: usize) -> usize {
    encoded_len.div_ceil(SEGMENT_SIZE).max(1)
}

/// The 1-indexed `n`th segment of a Base64 payload.
pub fn nth_segment(encoded: &str, n: usize) -> Result<&str> {
    if n == 0 || n > segment_count(encoded.len()) {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidRequest,
            format!("segment {} out of range", n),
        ));
    }
    let start = (n - 1) * SEGMENT_SIZE;
    let end = (start + SEGMENT_SIZE).min(encoded.len());
    Ok(&encoded[start..end])
}

/// Host-generated transaction id: 128 random bits, hex, upper case.
/// Matched case-insensitively everywhere.
pub fn new_transaction_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode_upper(bytes)
}

/// Render a subscriber's order counter as an EBICS order id: one
/// letter `A`–`Z` followed by three base-36 digits.
pub fn order_id_from_counter(counter: u32) -> Result<String> {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const BLOCK: u32 = 36 * 36 * 36;
    let letter_index = counter / BLOCK;
    if letter_index >= 26 {
        return Err(EbicsError::protocol(
            ReturnCode::ProcessingError,
            "order id space exhausted",
        ));
    }
    let mut rest = counter % BLOCK;
    let mut digits = [0u8; 3];
    for slot in digits.iter_mut().rev() {
        *slot = DIGITS[(rest % 36) as usize];
        rest /= 36;
    }
    Ok(format!(
        "{}{}",
        (b'A' + letter_index as u8) as char,
        std::str::from_utf8(&digits).expect("ascii digits")
    ))
}
