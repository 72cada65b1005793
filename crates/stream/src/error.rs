use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("delimiter length must be within [1, {chunk_size}], current: {len}")]
    InvalidDelimiter { len: usize, chunk_size: usize },

    #[error("expected delimiter missing")]
    DelimiterMissing,

    #[error("operation not allowed: {reason}")]
    OperationNotAllowed { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl StreamError {
    pub fn invalid_delimiter(len: usize, chunk_size: usize) -> Self {
        Self::InvalidDelimiter { len, chunk_size }
    }

    pub fn operation_not_allowed<S: ToString>(str: S) -> Self {
        Self::OperationNotAllowed { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true for errors caused by how the reader was driven rather than by
    /// the bytes it was fed.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidDelimiter { .. } | Self::OperationNotAllowed { .. })
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Io { source } => source,
            StreamError::DelimiterMissing => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            e => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}
