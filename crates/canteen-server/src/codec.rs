//! Base64 codec for form fields
//!
//! Decoding is liberal: it accepts both the standard (`+/`) and the url
//! (`-_`) alphabet, `=` or `.` as padding, and missing padding. Encoding
//! produces one alphabet; the url variant pads with `.` so the output is
//! safe inside a query string.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use std::string::FromUtf8Error;

/// Line length of PEM-style output
pub const PEM_LINE_LENGTH: usize = 64;

/// Line length of MIME-style output
pub const MIME_LINE_LENGTH: usize = 76;

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input is not base64
    #[error("input is not valid base64: {0}")]
    Invalid(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8
    #[error("decoded data is not UTF-8: {0}")]
    NotUtf8(#[from] FromUtf8Error),
}

/// Encode `bytes`; `url` selects the url alphabet with `.` padding
pub fn encode(bytes: &[u8], url: bool) -> String {
    if url {
        URL_SAFE.encode(bytes).replace('=', ".")
    } else {
        STANDARD.encode(bytes)
    }
}

/// Standard encoding broken into 64-column lines
pub fn encode_pem(bytes: &[u8]) -> String {
    insert_linebreaks(&encode(bytes, false), PEM_LINE_LENGTH)
}

/// Standard encoding broken into 76-column lines
pub fn encode_mime(bytes: &[u8]) -> String {
    insert_linebreaks(&encode(bytes, false), MIME_LINE_LENGTH)
}

/// Decode either alphabet; with `remove_linebreaks` line breaks are skipped
pub fn decode(input: &str, remove_linebreaks: bool) -> Result<Vec<u8>, CodecError> {
    let normalized: String = input
        .chars()
        .filter(|c| !(remove_linebreaks && (*c == '\n' || *c == '\r')))
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            '.' => '=',
            other => other,
        })
        .collect();
    Ok(LENIENT.decode(normalized)?)
}

/// Decode to a UTF-8 string
pub fn decode_to_string(input: &str, remove_linebreaks: bool) -> Result<String, CodecError> {
    Ok(String::from_utf8(decode(input, remove_linebreaks)?)?)
}

fn insert_linebreaks(encoded: &str, distance: usize) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / distance);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % distance == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out
}
