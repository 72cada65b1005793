use serde::Deserialize;

use crate::charset::Charset;
use crate::media::MediaHandlers;

/// Multipart form parser options.
///
/// Can be deserialized from configuration, every missing field keeping its default:
///
/// ```
/// use micro_multipart::ParseOptions;
///
/// let options: ParseOptions = serde_json::from_str(r#"{"max_body_part_count": 8}"#).unwrap();
/// assert_eq!(options.max_body_part_count(), 8);
/// assert_eq!(options.max_body_part_headers_size(), 8192);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    default_charset: Charset,
    max_body_part_count: usize,
    max_body_part_buffer_size: usize,
    max_body_part_headers_size: usize,
    supported_charsets: Vec<Charset>,
    chunk_size: Option<usize>,
    #[serde(skip)]
    media_handlers: MediaHandlers,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_charset: Charset::Utf8,
            max_body_part_count: 64,
            max_body_part_buffer_size: 1024 * 1024,
            max_body_part_headers_size: 8192,
            supported_charsets: Charset::ALL.to_vec(),
            chunk_size: None,
            media_handlers: MediaHandlers::default(),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charset of text fields whose content type does not name one.
    pub fn default_charset(&self) -> Charset {
        self.default_charset
    }

    /// Maximum number of parts in a form, `0` for no limit.
    pub fn max_body_part_count(&self) -> usize {
        self.max_body_part_count
    }

    /// Maximum number of bytes [`BodyPart::data`](crate::BodyPart::data) buffers.
    pub fn max_body_part_buffer_size(&self) -> usize {
        self.max_body_part_buffer_size
    }

    pub fn max_body_part_headers_size(&self) -> usize {
        self.max_body_part_headers_size
    }

    pub fn supported_charsets(&self) -> &[Charset] {
        &self.supported_charsets
    }

    /// Chunk size of readers built by the form itself, `None` for the reader's default.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    pub fn media_handlers(&self) -> &MediaHandlers {
        &self.media_handlers
    }

    pub fn media_handlers_mut(&mut self) -> &mut MediaHandlers {
        &mut self.media_handlers
    }

    pub fn with_default_charset(mut self, charset: Charset) -> Self {
        self.default_charset = charset;
        self
    }

    pub fn with_max_body_part_count(mut self, count: usize) -> Self {
        self.max_body_part_count = count;
        self
    }

    pub fn with_max_body_part_buffer_size(mut self, size: usize) -> Self {
        self.max_body_part_buffer_size = size;
        self
    }

    pub fn with_max_body_part_headers_size(mut self, size: usize) -> Self {
        self.max_body_part_headers_size = size;
        self
    }

    pub fn with_supported_charsets(mut self, charsets: impl IntoIterator<Item = Charset>) -> Self {
        self.supported_charsets = charsets.into_iter().collect();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_media_handlers(mut self, handlers: MediaHandlers) -> Self {
        self.media_handlers = handlers;
        self
    }
}
