//! Character sets that text fields and extended filenames may be decoded from.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::MultipartError;

/// A decodable character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Charset {
    Utf8,
    UsAscii,
    Latin1,
    Utf16Le,
    Utf16Be,
}

impl Charset {
    pub const ALL: [Charset; 5] = [Charset::Utf8, Charset::UsAscii, Charset::Latin1, Charset::Utf16Le, Charset::Utf16Be];

    /// Looks up a charset by one of its labels, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "us-ascii" | "ascii" => Some(Self::UsAscii),
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" | "l1" => Some(Self::Latin1),
            "utf-16le" | "utf-16-le" => Some(Self::Utf16Le),
            "utf-16be" | "utf-16-be" => Some(Self::Utf16Be),
            _ => None,
        }
    }

    /// The canonical label.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::UsAscii => "us-ascii",
            Self::Latin1 => "iso-8859-1",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        }
    }

    /// Decodes `bytes`, failing with [`MultipartError::InvalidText`] on malformed input.
    pub fn decode(self, bytes: &[u8]) -> Result<String, MultipartError> {
        let invalid = || MultipartError::invalid_text(self.name());
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| invalid()),
            Self::UsAscii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| char::from(b)).collect())
                } else {
                    Err(invalid())
                }
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Utf16Le | Self::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units = bytes.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if self == Self::Utf16Le { u16::from_le_bytes(pair) } else { u16::from_be_bytes(pair) }
                });
                char::decode_utf16(units).collect::<Result<String, _>>().map_err(|_| invalid())
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = MultipartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| MultipartError::unsupported_charset(s))
    }
}

impl TryFrom<String> for Charset {
    type Error = MultipartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Decodes `bytes` with the charset labelled `label`, which must be one of `allowed`.
pub(crate) fn decode_with(label: &str, allowed: &[Charset], bytes: &[u8]) -> Result<String, MultipartError> {
    let charset = Charset::from_label(label)
        .filter(|charset| allowed.contains(charset))
        .ok_or_else(|| MultipartError::unsupported_charset(label))?;
    charset.decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Charset::from_label("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_label("Latin-1"), Some(Charset::Latin1));
        assert_eq!(Charset::from_label(" iso-8859-1 "), Some(Charset::Latin1));
        assert_eq!(Charset::from_label("koi8-r"), None);
        assert!(matches!("koi8-r".parse::<Charset>(), Err(MultipartError::UnsupportedCharset { .. })));
    }

    #[test]
    fn test_decode() {
        assert_eq!(Charset::Utf8.decode("€uro".as_bytes()).unwrap(), "€uro");
        assert_eq!(Charset::Latin1.decode(b"caf\xe9").unwrap(), "café");
        assert_eq!(Charset::Utf16Le.decode(b"h\x00i\x00").unwrap(), "hi");
        assert_eq!(Charset::Utf16Be.decode(b"\x00h\x00i").unwrap(), "hi");
    }

    #[test]
    fn test_decode_invalid() {
        assert!(matches!(Charset::Utf8.decode(b"\xff\xfe"), Err(MultipartError::InvalidText { .. })));
        assert!(matches!(Charset::UsAscii.decode(b"caf\xe9"), Err(MultipartError::InvalidText { .. })));
        assert!(matches!(Charset::Utf16Le.decode(b"odd"), Err(MultipartError::InvalidText { .. })));
    }

    #[test]
    fn test_decode_with_allow_list() {
        assert_eq!(decode_with("latin1", &Charset::ALL, b"\xe9").unwrap(), "é");
        assert!(matches!(decode_with("latin1", &[Charset::Utf8], b"\xe9"), Err(MultipartError::UnsupportedCharset { .. })));
        assert!(matches!(decode_with("cp1252", &Charset::ALL, b"x"), Err(MultipartError::UnsupportedCharset { .. })));
    }
}
