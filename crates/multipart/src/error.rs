use std::error::Error as StdError;

use micro_stream::StreamError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("unexpected form structure: {reason}")]
    MalformedStructure { reason: String },

    #[error("body part headers exceed the limit {max_size}")]
    HeaderBlockTooLarge { max_size: usize },

    #[error("maximum number of form body parts exceeded, limit {max_count}")]
    TooManyParts { max_count: usize },

    #[error("the deprecated content-transfer-encoding {encoding:?} is unsupported")]
    DisallowedEncoding { encoding: String },

    #[error("body part is too large, limit {max_size}")]
    PartTooLarge { max_size: usize },

    #[error("unsupported charset: {charset}")]
    UnsupportedCharset { charset: String },

    #[error("invalid text for charset {charset}")]
    InvalidText { charset: String },

    #[error("invalid filename: {reason}")]
    InvalidFilename { reason: String },

    #[error("unsupported media type: {media_type}")]
    UnsupportedMediaType { media_type: String },

    #[error("media error: {source}")]
    Media { source: Box<dyn StdError + Send + Sync> },

    #[error("stream error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },
}

impl MultipartError {
    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn malformed<S: ToString>(str: S) -> Self {
        Self::MalformedStructure { reason: str.to_string() }
    }

    pub fn disallowed_encoding<S: ToString>(str: S) -> Self {
        Self::DisallowedEncoding { encoding: str.to_string() }
    }

    pub fn unsupported_charset<S: ToString>(str: S) -> Self {
        Self::UnsupportedCharset { charset: str.to_string() }
    }

    pub fn invalid_text<S: ToString>(str: S) -> Self {
        Self::InvalidText { charset: str.to_string() }
    }

    pub fn invalid_filename<S: ToString>(str: S) -> Self {
        Self::InvalidFilename { reason: str.to_string() }
    }

    pub fn unsupported_media_type<S: ToString>(str: S) -> Self {
        Self::UnsupportedMediaType { media_type: str.to_string() }
    }

    pub fn media<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Self {
        Self::Media { source: e.into() }
    }

    /// Maps a missing delimiter to [`MultipartError::MalformedStructure`], keeping other
    /// stream errors as they are.
    pub(crate) fn from_stream<S: ToString>(e: StreamError, reason: S) -> Self {
        match e {
            StreamError::DelimiterMissing => Self::malformed(reason),
            e => Self::Stream { source: e },
        }
    }

    /// Returns true for errors caused by how the parser was set up rather than by the
    /// body it was fed.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InvalidBoundary { .. } => true,
            Self::Stream { source } => source.is_config_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        assert!(MultipartError::invalid_boundary("empty").is_config_error());
        assert!(MultipartError::from(StreamError::invalid_delimiter(80, 64)).is_config_error());

        assert!(!MultipartError::malformed("boundary not found").is_config_error());
        assert!(!MultipartError::TooManyParts { max_count: 1 }.is_config_error());
    }

    #[test]
    fn test_from_stream() {
        let e = MultipartError::from_stream(StreamError::DelimiterMissing, "incomplete body part");
        assert!(matches!(e, MultipartError::MalformedStructure { ref reason } if reason == "incomplete body part"));

        let e = MultipartError::from_stream(StreamError::operation_not_allowed("busy"), "unused");
        assert!(matches!(e, MultipartError::Stream { source: StreamError::OperationNotAllowed { .. } }));
    }
}
