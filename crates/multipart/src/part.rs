use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use micro_stream::{BufferedReader, Delimited, Pull};
use mime::Mime;
use once_cell::unsync::OnceCell;

use crate::charset::decode_with;
use crate::filename::secure_filename;
use crate::headers::ContentDisposition;
use crate::media::{Media, MediaHandler};
use crate::utils::ensure;
use crate::{MultipartError, ParseOptions};

/// Content type of a part without a `Content-Type` header (RFC 7578, section 4.4).
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Header-derived properties of a body part, shared by the blocking and the
/// cooperative parts.
#[derive(Debug)]
pub(crate) struct PartHeaders<'a> {
    headers: HeaderMap,
    options: &'a ParseOptions,
    disposition: OnceCell<ContentDisposition>,
}

impl<'a> PartHeaders<'a> {
    pub(crate) fn new(headers: HeaderMap, options: &'a ParseOptions) -> Self {
        Self { headers, options, disposition: OnceCell::new() }
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn content_type(&self) -> &str {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    fn disposition(&self) -> &ContentDisposition {
        self.disposition.get_or_init(|| ContentDisposition::from_headers(&self.headers))
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.disposition().name()
    }

    pub(crate) fn filename(&self) -> Result<Option<String>, MultipartError> {
        self.disposition().filename(self.options.supported_charsets())
    }

    pub(crate) fn secure_filename(&self) -> Result<String, MultipartError> {
        match self.filename()? {
            Some(filename) => secure_filename(&filename),
            None => Err(MultipartError::invalid_filename("the part has no filename")),
        }
    }

    pub(crate) fn media_handler(&self) -> Result<&'a dyn MediaHandler, MultipartError> {
        self.options.media_handlers().find_by_media_type(self.content_type(), DEFAULT_CONTENT_TYPE)
    }

    /// Cap applied to [`BodyPart::data`], a read of one byte more reveals an oversized part.
    pub(crate) fn data_limit(&self) -> usize {
        self.options.max_body_part_buffer_size().saturating_add(1)
    }

    pub(crate) fn check_data(&self, data: &Bytes) -> Result<(), MultipartError> {
        ensure!(data.len() <= self.options.max_body_part_buffer_size(), self.too_large());
        Ok(())
    }

    pub(crate) fn too_large(&self) -> MultipartError {
        MultipartError::PartTooLarge { max_size: self.options.max_body_part_buffer_size() }
    }

    /// Whether the part is text, that is `text/plain`.
    pub(crate) fn is_text(&self) -> bool {
        self.content_type().parse::<Mime>().is_ok_and(|mime| mime.essence_str().eq_ignore_ascii_case(DEFAULT_CONTENT_TYPE))
    }

    /// Decodes `data` with the charset of the content type, or the default one.
    pub(crate) fn decode_text(&self, data: &[u8]) -> Result<String, MultipartError> {
        let charset = self
            .content_type()
            .parse::<Mime>()
            .ok()
            .and_then(|mime| mime.get_param(mime::CHARSET).map(|charset| charset.as_str().to_owned()));
        match charset {
            Some(label) => decode_with(&label, self.options.supported_charsets(), data),
            None => self.options.default_charset().decode(data),
        }
    }
}

/// One part of a [`MultipartForm`](crate::MultipartForm).
///
/// The content is read on demand from a sub-reader ending at the next boundary.
#[derive(Debug)]
pub struct BodyPart<'a, S> {
    stream: BufferedReader<Delimited<'a, S>>,
    headers: PartHeaders<'a>,
    data: Option<Bytes>,
    oversized: bool,
    media: Option<Media>,
}

impl<'a, S: Pull> BodyPart<'a, S> {
    pub(crate) fn new(stream: BufferedReader<Delimited<'a, S>>, headers: HeaderMap, options: &'a ParseOptions) -> Self {
        Self { stream, headers: PartHeaders::new(headers, options), data: None, oversized: false, media: None }
    }

    /// The allow-listed headers of the part.
    pub fn headers(&self) -> &HeaderMap {
        self.headers.headers()
    }

    /// The `Content-Type` of the part, `text/plain` if absent.
    pub fn content_type(&self) -> &str {
        self.headers.content_type()
    }

    /// The size of a part is only known once it has been read.
    pub fn content_length(&self) -> Option<u64> {
        None
    }

    /// The form field name.
    pub fn name(&self) -> Option<&str> {
        self.headers.name()
    }

    /// The filename given by the client, if any.
    pub fn filename(&self) -> Result<Option<String>, MultipartError> {
        self.headers.filename()
    }

    /// The filename reduced to characters that are safe on any filesystem.
    ///
    /// # Errors
    ///
    /// [`MultipartError::InvalidFilename`] if the filename is missing or empty.
    pub fn secure_filename(&self) -> Result<String, MultipartError> {
        self.headers.secure_filename()
    }

    /// Direct access to the part content.
    pub fn stream(&mut self) -> &mut BufferedReader<Delimited<'a, S>> {
        &mut self.stream
    }

    /// Reads the whole part content, at most `max_body_part_buffer_size` bytes.
    ///
    /// The content is read once and cached.
    ///
    /// # Errors
    ///
    /// [`MultipartError::PartTooLarge`] if the part is larger than allowed.
    pub fn data(&mut self) -> Result<Bytes, MultipartError> {
        if let Some(data) = &self.data {
            return Ok(data.clone());
        }
        if self.oversized {
            return Err(self.headers.too_large());
        }

        let data = self.stream.read(Some(self.headers.data_limit()))?;
        if let Err(e) = self.headers.check_data(&data) {
            // the content read so far is gone, later reads would return a truncated part
            self.oversized = true;
            return Err(e);
        }
        Ok(self.data.insert(data).clone())
    }

    /// The content decoded as text, `None` unless the part is `text/plain`.
    pub fn text(&mut self) -> Result<Option<String>, MultipartError> {
        if !self.headers.is_text() {
            return Ok(None);
        }
        let data = self.data()?;
        self.headers.decode_text(&data).map(Some)
    }

    /// The content deserialized by the media handler of its content type.
    ///
    /// The part is read to its end unless the handler already does so.
    pub fn media(&mut self) -> Result<&Media, MultipartError> {
        let media = match self.media.take() {
            Some(media) => media,
            None => self.load_media()?,
        };
        Ok(self.media.insert(media))
    }

    fn load_media(&mut self) -> Result<Media, MultipartError> {
        let handler = self.headers.media_handler()?;
        let content_type = self.headers.content_type();

        if let Some(data) = &self.data {
            return handler.deserialize(&mut &data[..], content_type, Some(data.len() as u64));
        }
        if self.oversized {
            return Err(self.headers.too_large());
        }

        let media = handler.deserialize(&mut self.stream, content_type, None)?;
        if !handler.exhaust_stream() {
            self.stream.exhaust()?;
        }
        Ok(media)
    }
}
