//! Blocking `multipart/form-data` parser
//!
//! [`MultipartForm`] walks a body one part at a time:
//!
//! 1. skip the prologue, or whatever the previous part left unread, up to the next boundary
//! 2. a boundary followed by `--` closes the form, one followed by CRLF opens a part
//! 3. read the part header block, bounded by the configured header size
//! 4. hand out a [`BodyPart`] reading up to the next boundary
//!
//! Only the first boundary may appear without a preceding CRLF (RFC 7578, section 4.1),
//! every later one is searched for as `CRLF--boundary`.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use http::HeaderMap;
use micro_stream::{BufferedReader, DEFAULT_CHUNK_SIZE, DelimiterPolicy, Pull, StreamError};
use tracing::{debug, trace, warn};

use crate::boundary::{MAX_BOUNDARY_LEN, parse_boundary};
use crate::headers::parse_part_headers;
use crate::part::BodyPart;
use crate::utils::ensure;
use crate::{MultipartError, ParseOptions};

pub(crate) const CRLF: &[u8] = b"\r\n";
pub(crate) const CRLF_CRLF: &[u8] = b"\r\n\r\n";
pub(crate) const CLOSING: &[u8] = b"--";

/// What follows a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Separator {
    Closing,
    Part,
}

/// Progress through a form, shared by the blocking and the cooperative parsers.
#[derive(Debug)]
pub(crate) struct FormState {
    delimiter: Bytes,
    prologue: bool,
    emitted: usize,
    done: bool,
}

impl FormState {
    pub(crate) fn new(boundary: &[u8], chunk_size: usize) -> Result<Self, MultipartError> {
        ensure!(
            (1..=MAX_BOUNDARY_LEN).contains(&boundary.len()),
            MultipartError::invalid_boundary("the boundary parameter must consist of 1 to 70 characters")
        );

        // the inter-part delimiter is the longest one ever searched for
        let delimiter_len = CRLF.len() + 2 + boundary.len();
        ensure!(delimiter_len <= chunk_size, MultipartError::from(StreamError::invalid_delimiter(delimiter_len, chunk_size)));

        let mut delimiter = BytesMut::with_capacity(delimiter_len);
        delimiter.put_slice(b"--");
        delimiter.put_slice(boundary);
        Ok(Self { delimiter: delimiter.freeze(), prologue: true, emitted: 0, done: false })
    }

    pub(crate) fn delimiter(&self) -> &Bytes {
        &self.delimiter
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn finish(&mut self) {
        self.done = true;
    }

    /// Records that the next boundary was found after `skipped` bytes.
    pub(crate) fn boundary_found(&mut self, skipped: u64) {
        if self.prologue {
            trace!(skipped, "skipped form prologue");

            let mut delimiter = BytesMut::with_capacity(CRLF.len() + self.delimiter.len());
            delimiter.put_slice(CRLF);
            delimiter.put_slice(&self.delimiter);
            self.delimiter = delimiter.freeze();
            self.prologue = false;
        } else if skipped > 0 {
            debug!(skipped, part = self.emitted, "skipped unread body part bytes");
        }
    }

    /// Classifies the (up to) four bytes following a boundary.
    pub(crate) fn separator(peeked: &[u8]) -> Result<Separator, MultipartError> {
        if peeked.starts_with(CLOSING) {
            if &peeked[CLOSING.len()..] != CRLF {
                // some clients end the body right after the closing boundary
                warn!("closing boundary is not followed by CRLF");
            }
            return Ok(Separator::Closing);
        }
        ensure!(peeked.starts_with(CRLF), MultipartError::malformed("unexpected form structure after boundary"));
        Ok(Separator::Part)
    }

    /// Explains a header block that could not be read, given how many bytes are left of it.
    pub(crate) fn header_block_error(held: usize, max_size: usize) -> MultipartError {
        if held > max_size {
            MultipartError::HeaderBlockTooLarge { max_size }
        } else {
            MultipartError::malformed("incomplete body part headers")
        }
    }

    pub(crate) fn count_part(&mut self, max_count: usize) -> Result<(), MultipartError> {
        self.emitted += 1;
        ensure!(max_count == 0 || self.emitted <= max_count, MultipartError::TooManyParts { max_count });
        trace!(part = self.emitted, "emitting body part");
        Ok(())
    }
}

/// Lazily parsed `multipart/form-data` body over a blocking source.
///
/// Parts are handed out in stream order with [`MultipartForm::next_part`]. Each part
/// borrows the form, so at most one part is alive at a time. Bytes a part leaves unread
/// are skipped when the next one is requested.
#[derive(Debug)]
pub struct MultipartForm<S> {
    reader: BufferedReader<S>,
    options: ParseOptions,
    state: FormState,
}

impl<S: Pull> MultipartForm<S> {
    /// Creates a form reading `reader`, the parts being separated by `boundary`.
    ///
    /// # Errors
    ///
    /// - [`MultipartError::InvalidBoundary`] if `boundary` is not 1 to 70 bytes long
    /// - [`MultipartError::Stream`] if the reader's chunk size cannot hold a boundary delimiter
    pub fn new(reader: BufferedReader<S>, boundary: &[u8], options: ParseOptions) -> Result<Self, MultipartError> {
        let state = FormState::new(boundary, reader.chunk_size())?;
        Ok(Self { reader, options, state })
    }

    /// Creates a form reading `reader`, the boundary taken from `content_type`.
    pub fn from_content_type(reader: BufferedReader<S>, content_type: &str, options: ParseOptions) -> Result<Self, MultipartError> {
        let boundary = parse_boundary(content_type)?;
        Self::new(reader, &boundary, options)
    }

    /// Creates a form reading at most `content_length` bytes of `source`.
    pub fn from_source(source: S, content_length: Option<u64>, content_type: &str, options: ParseOptions) -> Result<Self, MultipartError> {
        let chunk_size = options.chunk_size().unwrap_or(DEFAULT_CHUNK_SIZE);
        Self::from_content_type(BufferedReader::with_chunk_size(source, content_length, chunk_size), content_type, options)
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Returns the underlying reader, positioned wherever the form stopped.
    pub fn into_reader(self) -> BufferedReader<S> {
        self.reader
    }

    /// Returns the next part, `None` once the closing boundary was read.
    ///
    /// After an error no more parts are returned.
    pub fn next_part(&mut self) -> Result<Option<BodyPart<'_, S>>, MultipartError> {
        if self.state.is_done() {
            return Ok(None);
        }

        match self.advance() {
            Ok(Some(headers)) => {
                let stream = self.reader.delimit(self.state.delimiter().clone())?;
                Ok(Some(BodyPart::new(stream, headers, &self.options)))
            }
            Ok(None) => {
                self.state.finish();
                Ok(None)
            }
            Err(e) => {
                self.state.finish();
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<HeaderMap>, MultipartError> {
        let skipped = self
            .reader
            .pipe_until(self.state.delimiter(), &mut io::sink(), DelimiterPolicy::Consume)
            .map_err(|e| MultipartError::from_stream(e, "boundary not found"))?;
        self.state.boundary_found(skipped);

        match FormState::separator(self.reader.peek(CLOSING.len() + CRLF.len())?)? {
            Separator::Closing => return Ok(None),
            Separator::Part => self.reader.consume_delimiter(CRLF)?,
        }

        let headers = self.read_headers()?;
        self.state.count_part(self.options.max_body_part_count())?;
        Ok(Some(headers))
    }

    fn read_headers(&mut self) -> Result<HeaderMap, MultipartError> {
        if self.reader.peek(CRLF.len())? == CRLF {
            self.reader.consume_delimiter(CRLF)?;
            return Ok(HeaderMap::new());
        }

        let max_size = self.options.max_body_part_headers_size();
        match self.reader.read_until(CRLF_CRLF, Some(max_size), DelimiterPolicy::Consume) {
            Ok(block) => parse_part_headers(&block),
            Err(StreamError::DelimiterMissing) => {
                let held = self.reader.peek(max_size + CRLF_CRLF.len())?.len();
                Err(FormState::header_block_error(held, max_size))
            }
            Err(e) => Err(e.into()),
        }
    }
}
