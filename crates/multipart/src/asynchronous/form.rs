use bytes::Bytes;
use http::HeaderMap;
use micro_stream::{AsyncBufferedReader, ChunkSource, DEFAULT_ASYNC_CHUNK_SIZE, DelimiterPolicy, StreamError};
use tokio::io;

use crate::asynchronous::AsyncBodyPart;
use crate::boundary::parse_boundary;
use crate::form::{CLOSING, CRLF, CRLF_CRLF, FormState, Separator};
use crate::headers::parse_part_headers;
use crate::{MultipartError, ParseOptions};

/// Lazily parsed `multipart/form-data` body over a cooperative source.
///
/// See [`MultipartForm`](crate::MultipartForm), parts are handed out the same way.
#[derive(Debug)]
pub struct AsyncMultipartForm<S> {
    reader: AsyncBufferedReader<S>,
    options: ParseOptions,
    state: FormState,
}

impl<S: ChunkSource> AsyncMultipartForm<S> {
    pub fn new(reader: AsyncBufferedReader<S>, boundary: &[u8], options: ParseOptions) -> Result<Self, MultipartError> {
        let state = FormState::new(boundary, reader.chunk_size())?;
        Ok(Self { reader, options, state })
    }

    pub fn from_content_type(reader: AsyncBufferedReader<S>, content_type: &str, options: ParseOptions) -> Result<Self, MultipartError> {
        let boundary = parse_boundary(content_type)?;
        Self::new(reader, &boundary, options)
    }

    pub fn from_source(source: S, content_length: Option<u64>, content_type: &str, options: ParseOptions) -> Result<Self, MultipartError> {
        let chunk_size = options.chunk_size().unwrap_or(DEFAULT_ASYNC_CHUNK_SIZE);
        Self::from_content_type(AsyncBufferedReader::with_chunk_size(source, content_length, chunk_size), content_type, options)
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn into_reader(self) -> AsyncBufferedReader<S> {
        self.reader
    }

    /// Returns the next part, `None` once the closing boundary was read.
    ///
    /// After an error no more parts are returned.
    pub async fn next_part(&mut self) -> Result<Option<AsyncBodyPart<'_, S>>, MultipartError> {
        if self.state.is_done() {
            return Ok(None);
        }

        match self.advance().await {
            Ok(Some(headers)) => {
                let delimiter: Bytes = self.state.delimiter().clone();
                let stream = self.reader.delimit(delimiter)?;
                Ok(Some(AsyncBodyPart::new(stream, headers, &self.options)))
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

    async fn advance(&mut self) -> Result<Option<HeaderMap>, MultipartError> {
        let skipped = self
            .reader
            .pipe_until(self.state.delimiter(), &mut io::sink(), DelimiterPolicy::Consume)
            .await
            .map_err(|e| MultipartError::from_stream(e, "boundary not found"))?;
        self.state.boundary_found(skipped);

        match FormState::separator(self.reader.peek(CLOSING.len() + CRLF.len()).await?)? {
            Separator::Closing => return Ok(None),
            Separator::Part => self.reader.consume_delimiter(CRLF).await?,
        }

        let headers = self.read_headers().await?;
        self.state.count_part(self.options.max_body_part_count())?;
        Ok(Some(headers))
    }

    async fn read_headers(&mut self) -> Result<HeaderMap, MultipartError> {
        if self.reader.peek(CRLF.len()).await? == CRLF {
            self.reader.consume_delimiter(CRLF).await?;
            return Ok(HeaderMap::new());
        }

        let max_size = self.options.max_body_part_headers_size();
        match self.reader.read_until(CRLF_CRLF, Some(max_size), DelimiterPolicy::Consume).await {
            Ok(block) => parse_part_headers(&block),
            Err(StreamError::DelimiterMissing) => {
                let held = self.reader.peek(max_size + CRLF_CRLF.len()).await?.len();
                Err(FormState::header_block_error(held, max_size))
            }
            Err(e) => Err(e.into()),
        }
    }
}
