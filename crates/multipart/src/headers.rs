//! Body part header parsing
//!
//! A header block is the bytes between a boundary line and the blank line that starts
//! the part's content. RFC 7578 allows only three header fields in a part:
//!
//! - `Content-Disposition`, carrying the field name and optional filename
//! - `Content-Type`, defaulting to `text/plain`
//! - `Content-Transfer-Encoding`, deprecated, so only `binary` is accepted here
//!
//! Any other field is dropped (RFC 7578, section 4.8).

use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use percent_encoding::percent_decode_str;
use tracing::trace;

use crate::MultipartError;
use crate::charset::{Charset, decode_with};
use crate::utils::ensure;

pub const CONTENT_TRANSFER_ENCODING: HeaderName = HeaderName::from_static("content-transfer-encoding");

/// Parses a header block, given without its terminating blank line.
pub fn parse_part_headers(block: &[u8]) -> Result<HeaderMap, MultipartError> {
    let mut headers = HeaderMap::new();
    if block.is_empty() {
        return Ok(headers);
    }

    let mut raw = Vec::with_capacity(block.len() + 4);
    raw.extend_from_slice(block);
    raw.extend_from_slice(b"\r\n\r\n");

    // one field per line at most, the block size is already bounded
    let lines = block.iter().filter(|&&b| b == b'\n').count() + 1;
    let mut parsed = vec![httparse::EMPTY_HEADER; lines];
    let fields = match httparse::parse_headers(&raw, &mut parsed) {
        Ok(Status::Complete((_, fields))) => fields,
        Ok(Status::Partial) => return Err(MultipartError::malformed("incomplete body part headers")),
        Err(e) => return Err(MultipartError::malformed(format!("invalid body part header: {e}"))),
    };

    for field in fields.iter() {
        let name = if field.name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
            CONTENT_TYPE
        } else if field.name.eq_ignore_ascii_case(CONTENT_DISPOSITION.as_str()) {
            CONTENT_DISPOSITION
        } else if field.name.eq_ignore_ascii_case(CONTENT_TRANSFER_ENCODING.as_str()) {
            let encoding = String::from_utf8_lossy(field.value);
            ensure!(encoding.trim().eq_ignore_ascii_case("binary"), MultipartError::disallowed_encoding(encoding.trim()));
            CONTENT_TRANSFER_ENCODING
        } else {
            trace!(name = field.name, "dropped body part header");
            continue;
        };

        let value = HeaderValue::from_bytes(field.value).map_err(|e| MultipartError::malformed(format!("invalid {name} header: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// The parsed `Content-Disposition` of a body part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    disposition: String,
    params: Vec<(String, String)>,
}

impl ContentDisposition {
    /// Parses a disposition such as `form-data; name="field"; filename="a.txt"`.
    ///
    /// Parameter names are case-insensitive, quoted values are unescaped.
    pub fn parse(value: &str) -> Self {
        let mut segments = split_params(value).into_iter();
        let disposition = segments.next().unwrap_or_default().trim().to_ascii_lowercase();

        let params = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                Some((name.trim().to_ascii_lowercase(), unquote(value.trim())))
            })
            .collect();

        Self { disposition, params }
    }

    /// Parses the `Content-Disposition` of `headers`, an absent header has no parameters.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers.get(CONTENT_DISPOSITION).map(|value| Self::parse(&String::from_utf8_lossy(value.as_bytes()))).unwrap_or_default()
    }

    pub fn disposition(&self) -> &str {
        &self.disposition
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.param("name")
    }

    /// The filename, preferring the RFC 5987 `filename*` form when it is well formed.
    ///
    /// RFC 7578 forbids `filename*`, but it is sent by some clients.
    pub fn filename(&self, allowed: &[Charset]) -> Result<Option<String>, MultipartError> {
        if let Some((charset, encoded)) = self.param("filename*").and_then(split_extended_value) {
            let bytes: Vec<u8> = percent_decode_str(encoded).collect();
            return decode_with(charset, allowed, &bytes).map(Some);
        }
        Ok(self.param("filename").map(str::to_owned))
    }
}

/// Splits on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut quoted = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                        continue;
                    }
                }
                out.push(c);
            }
            out
        }
        None => value.to_owned(),
    }
}

/// Splits `charset'language'value`, the language being optional.
fn split_extended_value(value: &str) -> Option<(&str, &str)> {
    let (charset, rest) = value.split_once('\'')?;
    let (language, encoded) = rest.split_once('\'')?;

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let valid = !charset.is_empty()
        && charset.chars().all(|c| is_word(c) || c == '-')
        && language.chars().all(is_word)
        && !encoded.is_empty();
    valid.then_some((charset, encoded))
}
