//! RFC 2047 encoded-word decoding for attachment file names.
//!
//! Providers send names such as `=?GBK?B?xPq6wy54bHM=?=`, sometimes split
//! over several folded lines. Text without an encoded word is returned
//! unchanged.

use std::borrow::Cow;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::Encoding;
use regex::Regex;

static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("encoded-word pattern is valid")
});

/// Why a single encoded word could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown charset '{0}'")]
    UnknownCharset(String),

    #[error("invalid base64 payload")]
    Base64,

    #[error("invalid quoted-printable payload")]
    QuotedPrintable,
}

/// Decode every encoded word in `text`.
///
/// Whitespace between two adjacent encoded words is dropped; other text is
/// kept verbatim. The first word that fails to decode aborts decoding.
pub fn decode_encoded_words(text: &str) -> Result<Cow<'_, str>, DecodeError> {
    if !ENCODED_WORD.is_match(text) {
        return Ok(Cow::Borrowed(text));
    }

    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut prev_was_word = false;

    for caps in ENCODED_WORD.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let between = &text[last_end..whole.start()];
        if !(prev_was_word && between.trim().is_empty()) {
            out.push_str(between);
        }

        let charset = &caps[1];
        let payload = &caps[3];
        let bytes = match &caps[2] {
            "B" | "b" => decode_b(payload)?,
            _ => decode_q(payload)?,
        };
        out.push_str(&decode_charset(charset, &bytes)?);

        last_end = whole.end();
        prev_was_word = true;
    }
    out.push_str(&text[last_end..]);

    Ok(Cow::Owned(out))
}

fn decode_b(payload: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(payload).map_err(|_| DecodeError::Base64)
}

/// "Q" encoding: quoted-printable with `_` standing for a space.
fn decode_q(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = bytes.get(i + 1..i + 3).ok_or(DecodeError::QuotedPrintable)?;
                let hex = std::str::from_utf8(hex).map_err(|_| DecodeError::QuotedPrintable)?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| DecodeError::QuotedPrintable)?;
                out.push(byte);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    Ok(out)
}

fn decode_charset(charset: &str, bytes: &[u8]) -> Result<String, DecodeError> {
    // RFC 2231 allows a language suffix: `utf-8*zh-CN`.
    let label = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| DecodeError::UnknownCharset(charset.to_string()))?;
    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}
