//! Where readers get their bytes from.
//!
//! There are two capabilities, matching the two ways a transport can hand out a body:
//!
//! - [`Pull`]: a blocking call returning the next chunk, such as reading a socket or a
//!   blocking request body
//! - [`ChunkSource`]: a cooperative producer that is awaited for each chunk, such as a
//!   receive channel fed by a connection task
//!
//! The readers never look at the shape of the source beyond these traits.

use std::io;
use std::io::Read;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::StreamError;

/// Blocking source of bytes.
pub trait Pull {
    /// Pulls at most `max_size` bytes, blocking until some are available.
    ///
    /// An empty chunk signals the end of the source.
    fn pull(&mut self, max_size: usize) -> Result<Bytes, StreamError>;
}

/// Cooperative source of bytes.
pub trait ChunkSource {
    /// Waits for the next chunk, `Ok(None)` once the source is drained.
    ///
    /// Dropping the returned future before it completes must not lose a chunk that was
    /// not yet handed out.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, StreamError>>;
}

/// [`Pull`] adapter over any [`std::io::Read`].
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Pull for ReadSource<R> {
    fn pull(&mut self, max_size: usize) -> Result<Bytes, StreamError> {
        let mut buf = vec![0; max_size];
        loop {
            match self.inner.read(&mut buf) {
                Ok(size) => {
                    buf.truncate(size);
                    return Ok(Bytes::from(buf));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(StreamError::io(e)),
            }
        }
    }
}

/// [`Pull`] adapter over a closure taking the maximum chunk size.
#[derive(Debug)]
pub struct FnSource<F> {
    f: F,
}

impl<F> FnSource<F>
where
    F: FnMut(usize) -> io::Result<Bytes>,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Pull for FnSource<F>
where
    F: FnMut(usize) -> io::Result<Bytes>,
{
    fn pull(&mut self, max_size: usize) -> Result<Bytes, StreamError> {
        (self.f)(max_size).map_err(StreamError::io)
    }
}

/// [`ChunkSource`] adapter over a [`Stream`] of byte chunks, empty chunks are skipped.
#[derive(Debug)]
pub struct StreamSource<St> {
    stream: St,
}

impl<St> StreamSource<St>
where
    St: Stream<Item = io::Result<Bytes>> + Unpin,
{
    pub fn new(stream: St) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> St {
        self.stream
    }
}

impl<St> ChunkSource for StreamSource<St>
where
    St: Stream<Item = io::Result<Bytes>> + Unpin,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        while let Some(item) = self.stream.next().await {
            let chunk = item?;
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }
}

/// Builds a [`ChunkSource`] reading up to `chunk_size` bytes at a time from `reader`.
pub fn from_async_read<R>(reader: R, chunk_size: usize) -> StreamSource<ReaderStream<R>>
where
    R: AsyncRead + Unpin,
{
    StreamSource::new(ReaderStream::with_capacity(reader, chunk_size))
}
