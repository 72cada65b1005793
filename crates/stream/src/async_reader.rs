//! Cooperative buffered reader.
//!
//! [`AsyncBufferedReader`] runs the same [`Window`] steps as the blocking reader, but
//! awaits its [`ChunkSource`] whenever a step asks for more input. That fetch is the only
//! suspension point: buffered data is always scanned without yielding, and a chunk is
//! fed to the window only once it has been received, so dropping an operation midway
//! leaves the reader as if it had never begun waiting.
//!
//! Operations take `&mut self`, hence at most one of them can be in flight per reader.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::Stream;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::delimited::AsyncDelimited;
use crate::source::ChunkSource;
use crate::window::{DelimiterPolicy, Window};
use crate::StreamError;

/// Default chunk size of [`AsyncBufferedReader`] (8 KiB).
pub const DEFAULT_ASYNC_CHUNK_SIZE: usize = 8 * 1024;

/// A forward-only reader over a cooperative [`ChunkSource`].
#[derive(Debug)]
pub struct AsyncBufferedReader<S> {
    source: S,
    window: Window,
    iteration_started: bool,
}

impl<S: ChunkSource> AsyncBufferedReader<S> {
    /// Creates a reader over `source`, `max_len` of `None` reads until the source is drained.
    pub fn new(source: S, max_len: Option<u64>) -> Self {
        Self::with_chunk_size(source, max_len, DEFAULT_ASYNC_CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: S, max_len: Option<u64>, chunk_size: usize) -> Self {
        Self { source, window: Window::new(chunk_size, max_len), iteration_started: false }
    }

    async fn drive<T>(&mut self, mut step: impl FnMut(&mut Window) -> Result<Option<T>, StreamError>) -> Result<T, StreamError> {
        loop {
            if let Some(value) = step(&mut self.window)? {
                return Ok(value);
            }

            let chunk = self.source.next_chunk().await?;
            self.window.feed(chunk.unwrap_or_default());
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.window.chunk_size()
    }

    /// Bytes not yet pulled from the source, `None` if unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.window.remaining()
    }

    /// Number of bytes consumed so far.
    pub fn tell(&self) -> u64 {
        self.window.consumed()
    }

    pub fn is_eof(&self) -> bool {
        self.window.is_eof()
    }

    /// Returns up to `size` bytes without consuming them.
    pub async fn peek(&mut self, size: usize) -> Result<&[u8], StreamError> {
        self.drive(|window| Ok(window.try_peek(size))).await?;
        Ok(self.window.peeked(size))
    }

    /// Reads `size` bytes, or everything left if `size` is `None` or the stream ends first.
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes, StreamError> {
        let size = self.window.normalize(size);
        self.drive(|window| Ok(window.try_read(size))).await
    }

    pub async fn read_all(&mut self) -> Result<Bytes, StreamError> {
        self.read(None).await
    }

    /// Reads up to the next occurrence of `delimiter`, at most `size` bytes.
    ///
    /// See [`BufferedReader::read_until`](crate::BufferedReader::read_until).
    pub async fn read_until(&mut self, delimiter: &[u8], size: Option<usize>, policy: DelimiterPolicy) -> Result<Bytes, StreamError> {
        let mut scan = 0;
        self.drive(|window| window.try_read_until(delimiter, size, policy, &mut scan)).await
    }

    pub async fn consume_delimiter(&mut self, delimiter: &[u8]) -> Result<(), StreamError> {
        self.drive(|window| window.try_consume(delimiter)).await
    }

    /// Copies the rest of the stream into `sink`, one chunk at a time.
    pub async fn pipe<W: AsyncWrite + Unpin + ?Sized>(&mut self, sink: &mut W) -> Result<u64, StreamError> {
        let chunk_size = self.chunk_size();
        let mut size = 0;
        loop {
            let chunk = self.read(Some(chunk_size)).await?;
            if chunk.is_empty() {
                return Ok(size);
            }
            sink.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
    }

    /// Copies the stream into `sink` up to the next occurrence of `delimiter`.
    pub async fn pipe_until<W: AsyncWrite + Unpin + ?Sized>(
        &mut self,
        delimiter: &[u8],
        sink: &mut W,
        policy: DelimiterPolicy,
    ) -> Result<u64, StreamError> {
        self.window.check_delimiter(delimiter)?;

        let chunk_size = self.chunk_size();
        let mut size = 0;
        loop {
            let chunk = self.read_until(delimiter, Some(chunk_size), DelimiterPolicy::Optional).await?;
            if chunk.is_empty() {
                break;
            }
            sink.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }

        match policy {
            DelimiterPolicy::Optional => {}
            DelimiterPolicy::Required => {
                if self.peek(delimiter.len()).await? != delimiter {
                    return Err(StreamError::DelimiterMissing);
                }
            }
            DelimiterPolicy::Consume => self.consume_delimiter(delimiter).await?,
        }
        Ok(size)
    }

    /// Discards the rest of the stream.
    pub async fn exhaust(&mut self) -> Result<u64, StreamError> {
        self.pipe(&mut tokio::io::sink()).await
    }

    /// Returns a reader over this stream up to the next occurrence of `delimiter`.
    pub fn delimit(&mut self, delimiter: impl Into<Bytes>) -> Result<AsyncBufferedReader<AsyncDelimited<'_, S>>, StreamError> {
        let delimiter = delimiter.into();
        self.window.check_delimiter(&delimiter)?;

        let max_len = self.window.available();
        let chunk_size = self.chunk_size();
        Ok(AsyncBufferedReader::with_chunk_size(AsyncDelimited::new(self, delimiter), max_len, chunk_size))
    }

    /// Reads one line including the trailing `\n`, at most `size` bytes.
    pub async fn readline(&mut self, size: Option<usize>) -> Result<Bytes, StreamError> {
        let mut scan = 0;
        self.drive(|window| Ok(window.try_readline(size, &mut scan))).await
    }

    /// Reads lines until the stream ends, or until `hint` bytes were read.
    pub async fn readlines(&mut self, hint: Option<usize>) -> Result<Vec<Bytes>, StreamError> {
        let mut lines = Vec::new();
        let mut size = 0;
        loop {
            let line = self.readline(None).await?;
            if line.is_empty() {
                return Ok(lines);
            }
            size += line.len();
            lines.push(line);

            if hint.is_some_and(|hint| size >= hint) {
                return Ok(lines);
            }
        }
    }

    /// Iterates over the rest of the stream in chunks of at most `chunk_size` bytes.
    ///
    /// A reader can only be iterated over once.
    pub fn chunks(&mut self) -> Result<impl Stream<Item = Result<Bytes, StreamError>> + '_, StreamError> {
        if self.iteration_started {
            return Err(StreamError::operation_not_allowed("this stream is already being iterated over"));
        }
        self.iteration_started = true;

        let chunk_size = self.chunk_size();
        Ok(stream::try_unfold(self, move |reader| async move {
            let chunk = reader.read(Some(chunk_size)).await?;
            Ok::<_, StreamError>((!chunk.is_empty()).then_some((chunk, reader)))
        }))
    }
}

/// Object-safe async view of a reader, handed to media handlers.
#[async_trait(?Send)]
pub trait ByteStream {
    /// Reads `size` bytes, or everything left if `size` is `None`.
    async fn read(&mut self, size: Option<usize>) -> Result<Bytes, StreamError>;

    /// Discards the rest of the stream.
    async fn exhaust(&mut self) -> Result<u64, StreamError>;
}

#[async_trait(?Send)]
impl<S: ChunkSource> ByteStream for AsyncBufferedReader<S> {
    async fn read(&mut self, size: Option<usize>) -> Result<Bytes, StreamError> {
        AsyncBufferedReader::read(self, size).await
    }

    async fn exhaust(&mut self) -> Result<u64, StreamError> {
        AsyncBufferedReader::exhaust(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StreamSource;
    use futures::TryStreamExt;
    use std::io;
    use std::pin::pin;
    use std::task::{Context, Poll};

    const DELIMITER: &[u8] = b"--boundary1234567890--";

    type TestSource = StreamSource<stream::Iter<std::vec::IntoIter<io::Result<Bytes>>>>;

    fn test_data() -> Vec<u8> {
        let mut data = Vec::new();
        for count in [64, 63, 62] {
            data.extend(b"123456789ABCDEF\n".repeat(count * 4));
            data.extend_from_slice(DELIMITER);
        }
        data
    }

    fn source(data: &[u8], fragment: usize) -> TestSource {
        let chunks: Vec<io::Result<Bytes>> = data.chunks(fragment).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
        StreamSource::new(stream::iter(chunks))
    }

    fn reader(data: &[u8], fragment: usize, chunk_size: usize) -> AsyncBufferedReader<TestSource> {
        AsyncBufferedReader::with_chunk_size(source(data, fragment), None, chunk_size)
    }

    /// Yields `Pending` once before every chunk.
    struct Stalling {
        inner: TestSource,
        stalled: bool,
    }

    impl ChunkSource for Stalling {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
            if !self.stalled {
                self.stalled = true;
                futures::future::poll_fn(|cx: &mut Context<'_>| {
                    cx.waker().wake_by_ref();
                    Poll::<()>::Pending
                })
                .await;
            }
            self.stalled = false;
            self.inner.next_chunk().await
        }
    }

    #[tokio::test]
    async fn test_peek() {
        let data = test_data();
        let mut stream = reader(&data, 5, 16);

        assert_eq!(stream.peek(0).await.unwrap(), b"");
        assert_eq!(stream.peek(2).await.unwrap(), b"12");
        assert_eq!(stream.peek(17).await.unwrap(), b"123456789ABCDEF\n1");
        assert_eq!(&stream.read(Some(15)).await.unwrap()[..], b"123456789ABCDEF");
        assert_eq!(stream.peek(2).await.unwrap(), b"\n1");
    }

    #[tokio::test]
    async fn test_read_until() {
        let data = test_data();
        for fragment in [1, 7, 22, 23, 1000] {
            let mut stream = reader(&data, fragment, 64);

            assert_eq!(stream.read_until(DELIMITER, None, DelimiterPolicy::Consume).await.unwrap().len(), 64 * 64);
            assert_eq!(stream.read_until(DELIMITER, None, DelimiterPolicy::Consume).await.unwrap().len(), 63 * 64);
            assert_eq!(stream.read_until(DELIMITER, Some(100), DelimiterPolicy::Optional).await.unwrap().len(), 100);
            stream.pipe_until(DELIMITER, &mut tokio::io::sink(), DelimiterPolicy::Consume).await.unwrap();
            assert!(stream.read_all().await.unwrap().is_empty());
            assert!(stream.is_eof());
        }
    }

    #[tokio::test]
    async fn test_read_until_straddling() {
        let content = b"value\r\n--XYZ--";
        for split in 5..12 {
            let chunks = vec![Ok(Bytes::copy_from_slice(&content[..split])), Ok(Bytes::copy_from_slice(&content[split..]))];
            let mut stream = AsyncBufferedReader::new(StreamSource::new(stream::iter(chunks)), None);

            assert_eq!(&stream.read_until(b"\r\n--XYZ", None, DelimiterPolicy::Required).await.unwrap()[..], b"value");
            assert_eq!(stream.peek(7).await.unwrap(), b"\r\n--XYZ");
        }
    }

    #[tokio::test]
    async fn test_budget() {
        let data = test_data();
        let mut stream = AsyncBufferedReader::with_chunk_size(source(&data, 1000), Some(1500), 64);

        let bytes = stream.read(None).await.unwrap();
        assert_eq!(bytes.len(), 1500);
        assert_eq!(&bytes[..], &data[..1500]);
        assert!(stream.is_eof());
    }

    #[tokio::test]
    async fn test_chunks_only_once() {
        let data = test_data();
        let mut stream = reader(&data, 100, 1024);

        let collected: Vec<Bytes> = stream.chunks().unwrap().try_collect().await.unwrap();
        assert!(collected.iter().all(|chunk| chunk.len() <= 1024));
        assert_eq!(collected.concat(), data);

        assert!(matches!(stream.chunks().err(), Some(StreamError::OperationNotAllowed { .. })));
    }

    #[tokio::test]
    async fn test_pipe() {
        let data = test_data();
        let mut stream = reader(&data, 333, 128);
        let mut sink = Vec::new();
        assert_eq!(stream.pipe(&mut sink).await.unwrap(), data.len() as u64);
        assert_eq!(sink, data);
    }

    #[tokio::test]
    async fn test_readlines() {
        let mut stream = reader(b"a\nbb\nccc", 2, 8);
        let lines = stream.readlines(Some(3)).await.unwrap();
        assert_eq!(lines, vec![Bytes::from_static(b"a\n"), Bytes::from_static(b"bb\n")]);
        assert_eq!(&stream.readline(None).await.unwrap()[..], b"ccc");
    }

    #[test]
    fn test_cancelled_fetch_keeps_state() {
        let data = test_data();
        let mut stream = AsyncBufferedReader::with_chunk_size(Stalling { inner: source(&data, 10), stalled: false }, None, 64);
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        // every read is abandoned at its first suspension, then retried
        let mut read = Vec::new();
        while read.len() < 4096 {
            let mut scan = pin!(stream.read_until(DELIMITER, None, DelimiterPolicy::Optional));
            match scan.as_mut().poll(&mut cx) {
                Poll::Ready(bytes) => {
                    read.extend_from_slice(&bytes.unwrap());
                    break;
                }
                Poll::Pending => {}
            }
        }
        assert_eq!(read.len(), 64 * 64);
        assert_eq!(&read[..], &data[..64 * 64]);
        assert_eq!(stream.tell(), 64 * 64);
    }
}
