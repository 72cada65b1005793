//! The scanning window shared by the blocking and the cooperative readers.
//!
//! [`Window`] owns the buffered bytes, the pull budget and the end-of-input state of a
//! reader, but performs no I/O itself. Every reader operation is expressed as a step in
//! the style of [`tokio_util::codec::Decoder::decode`]:
//!
//! - `Ok(Some(value))` when the operation completed
//! - `Ok(None)` when another chunk must be fetched and [`Window::feed`]-ed first
//! - `Err(StreamError)` if the operation cannot complete
//!
//! A step returning `Ok(None)` or `Err(_)` leaves the buffered bytes untouched, so a
//! driver may suspend (or be cancelled) between steps without losing input. The readers
//! differ only in how they obtain the next chunk.

use std::cmp;

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;
use tracing::trace;

use crate::StreamError;

/// What to do when a delimiter never shows up before the source is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelimiterPolicy {
    /// Return everything that is left.
    #[default]
    Optional,
    /// Fail with [`StreamError::DelimiterMissing`].
    Required,
    /// Like `Required`, and the delimiter must directly follow the returned bytes.
    /// The delimiter is consumed as well.
    Consume,
}

#[derive(Debug)]
pub(crate) struct Window {
    buffer: BytesMut,
    chunk_size: usize,
    /// Bytes that may still be pulled from the source, `None` if unbounded
    remaining: Option<u64>,
    exhausted: bool,
    consumed: u64,
}

impl Window {
    pub(crate) fn new(chunk_size: usize, max_len: Option<u64>) -> Self {
        Self {
            buffer: BytesMut::new(),
            chunk_size: cmp::max(chunk_size, 1),
            remaining: max_len,
            exhausted: max_len == Some(0),
            consumed: 0,
        }
    }

    #[inline]
    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes that may still be pulled from the source.
    #[inline]
    pub(crate) fn remaining(&self) -> Option<u64> {
        if self.exhausted { Some(0) } else { self.remaining }
    }

    /// Upper bound of the bytes this window can still hand out.
    pub(crate) fn available(&self) -> Option<u64> {
        self.remaining().map(|remaining| remaining + self.buffer.len() as u64)
    }

    #[inline]
    pub(crate) fn can_fetch(&self) -> bool {
        !self.exhausted
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    #[inline]
    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Size of the next chunk to request from a pull source.
    pub(crate) fn fetch_size(&self) -> usize {
        match self.remaining() {
            Some(remaining) => usize::try_from(remaining).map_or(self.chunk_size, |r| cmp::min(r, self.chunk_size)),
            None => self.chunk_size,
        }
    }

    /// Caps a requested read size at what the window can still hand out.
    pub(crate) fn normalize(&self, size: Option<usize>) -> usize {
        let max = self.available().map_or(usize::MAX, |a| usize::try_from(a).unwrap_or(usize::MAX));
        size.map_or(max, |size| cmp::min(size, max))
    }

    /// Appends a fetched chunk, an empty chunk marks the end of the source.
    pub(crate) fn feed(&mut self, mut chunk: Bytes) {
        if chunk.is_empty() {
            trace!(buffered = self.buffer.len(), "source exhausted");
            self.exhausted = true;
            return;
        }

        if let Some(remaining) = self.remaining.as_mut() {
            if chunk.len() as u64 >= *remaining {
                // the budget is spent, whatever the source sent beyond it is dropped
                let allowed = usize::try_from(*remaining).unwrap_or(chunk.len());
                if allowed < chunk.len() {
                    trace!(dropped = chunk.len() - allowed, "chunk exceeds the stream length");
                }
                chunk.truncate(allowed);
                *remaining = 0;
                self.exhausted = true;
            } else {
                *remaining -= chunk.len() as u64;
            }
        }

        trace!(len = chunk.len(), buffered = self.buffer.len(), "fetched chunk");
        self.buffer.extend_from_slice(&chunk);
    }

    pub(crate) fn advance(&mut self, size: usize) {
        let size = cmp::min(size, self.buffer.len());
        self.buffer.advance(size);
        self.consumed += size as u64;
    }

    fn take(&mut self, size: usize) -> Bytes {
        let size = cmp::min(size, self.buffer.len());
        self.consumed += size as u64;

        // hand out the whole window without copying when it matches the request
        if size == self.buffer.len() {
            self.buffer.split().freeze()
        } else {
            self.buffer.split_to(size).freeze()
        }
    }

    pub(crate) fn check_delimiter(&self, delimiter: &[u8]) -> Result<(), StreamError> {
        if delimiter.is_empty() || delimiter.len() > self.chunk_size {
            return Err(StreamError::invalid_delimiter(delimiter.len(), self.chunk_size));
        }
        Ok(())
    }

    /// Completes once `size` bytes are buffered or the source is drained.
    pub(crate) fn try_peek(&self, size: usize) -> Option<()> {
        (self.buffer.len() >= size || !self.can_fetch()).then_some(())
    }

    pub(crate) fn peeked(&self, size: usize) -> &[u8] {
        &self.buffer[..cmp::min(size, self.buffer.len())]
    }

    /// Consumes `size` bytes, or whatever is left once the source is drained.
    pub(crate) fn try_read(&mut self, size: usize) -> Option<Bytes> {
        if self.buffer.len() < size && self.can_fetch() {
            return None;
        }
        Some(self.take(size))
    }

    /// Consumes the bytes preceding `delimiter`, at most `limit` of them.
    ///
    /// `scan` carries the resume offset between steps of the same operation: no
    /// delimiter starts before it. After a miss it is set to the last
    /// `delimiter.len() - 1` buffered bytes, so the next search begins with the probe
    /// spanning the old tail and the prefix of the next chunk, which is where a
    /// straddling delimiter shows up.
    pub(crate) fn try_read_until(
        &mut self,
        delimiter: &[u8],
        limit: Option<usize>,
        policy: DelimiterPolicy,
        scan: &mut usize,
    ) -> Result<Option<Bytes>, StreamError> {
        self.check_delimiter(delimiter)?;
        let size = limit.unwrap_or(usize::MAX);
        let start = cmp::min(*scan, self.buffer.len());

        if let Some(pos) = memmem::find(&self.buffer[start..], delimiter).map(|pos| pos + start) {
            if pos <= size {
                let bytes = self.take(pos);
                if policy == DelimiterPolicy::Consume {
                    self.advance(delimiter.len());
                }
                return Ok(Some(bytes));
            }

            if policy == DelimiterPolicy::Consume {
                return Err(StreamError::DelimiterMissing);
            }
            return Ok(Some(self.take(size)));
        }

        if !self.can_fetch() {
            return match (policy, limit) {
                (DelimiterPolicy::Consume, _) => Err(StreamError::DelimiterMissing),
                (_, Some(limit)) if self.buffer.len() >= limit => Ok(Some(self.take(limit))),
                (DelimiterPolicy::Required, _) => Err(StreamError::DelimiterMissing),
                (DelimiterPolicy::Optional, _) => Ok(Some(self.take(self.buffer.len()))),
            };
        }

        // no delimiter can start before `clean`
        let clean = self.buffer.len().saturating_sub(delimiter.len() - 1);
        match policy {
            DelimiterPolicy::Consume if clean > size => return Err(StreamError::DelimiterMissing),
            DelimiterPolicy::Consume => {}
            _ if clean >= size => return Ok(Some(self.take(size))),
            _ => {}
        }

        *scan = clean;
        Ok(None)
    }

    /// Consumes `delimiter` if it is next in the stream.
    pub(crate) fn try_consume(&mut self, delimiter: &[u8]) -> Result<Option<()>, StreamError> {
        if self.buffer.len() < delimiter.len() && self.can_fetch() {
            return Ok(None);
        }

        if !self.buffer.starts_with(delimiter) {
            return Err(StreamError::DelimiterMissing);
        }
        self.advance(delimiter.len());
        Ok(Some(()))
    }

    /// Consumes one line including its `\n`, at most `limit` bytes.
    pub(crate) fn try_readline(&mut self, limit: Option<usize>, scan: &mut usize) -> Option<Bytes> {
        let size = limit.unwrap_or(usize::MAX);
        let start = cmp::min(*scan, self.buffer.len());

        match memchr::memchr(b'\n', &self.buffer[start..]).map(|pos| pos + start) {
            Some(pos) => Some(self.take(cmp::min(pos + 1, size))),
            None if self.buffer.len() >= size || !self.can_fetch() => Some(self.take(size)),
            None => {
                *scan = self.buffer.len();
                None
            }
        }
    }
}
