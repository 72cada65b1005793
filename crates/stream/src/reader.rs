//! Blocking buffered reader.
//!
//! [`BufferedReader`] drives the [`Window`] steps with a [`Pull`] source: whenever a
//! step asks for more input, the source is pulled directly, blocking the calling thread.

use std::io;
use std::io::{BufRead, Read, Write};

use bytes::Bytes;

use crate::delimited::Delimited;
use crate::source::Pull;
use crate::window::{DelimiterPolicy, Window};
use crate::StreamError;

/// Default chunk size of [`BufferedReader`] (32 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// A forward-only reader over a bounded [`Pull`] source.
///
/// Never pulls more than `max_len` bytes in total, and never pulls more than
/// `chunk_size` bytes at a time.
#[derive(Debug)]
pub struct BufferedReader<S> {
    source: S,
    window: Window,
}

impl<S: Pull> BufferedReader<S> {
    /// Creates a reader over `source`, `max_len` of `None` reads until the source is drained.
    pub fn new(source: S, max_len: Option<u64>) -> Self {
        Self::with_chunk_size(source, max_len, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: S, max_len: Option<u64>, chunk_size: usize) -> Self {
        Self { source, window: Window::new(chunk_size, max_len) }
    }

    fn drive<T>(&mut self, mut step: impl FnMut(&mut Window) -> Result<Option<T>, StreamError>) -> Result<T, StreamError> {
        loop {
            if let Some(value) = step(&mut self.window)? {
                return Ok(value);
            }

            let chunk = self.source.pull(self.window.fetch_size())?;
            self.window.feed(chunk);
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
    ///
    /// Fewer bytes are returned only if the stream ends first.
    pub fn peek(&mut self, size: usize) -> Result<&[u8], StreamError> {
        self.drive(|window| Ok(window.try_peek(size)))?;
        Ok(self.window.peeked(size))
    }

    /// Reads `size` bytes, or everything left if `size` is `None` or the stream ends first.
    pub fn read(&mut self, size: Option<usize>) -> Result<Bytes, StreamError> {
        let size = self.window.normalize(size);
        self.drive(|window| Ok(window.try_read(size)))
    }

    pub fn read_all(&mut self) -> Result<Bytes, StreamError> {
        self.read(None)
    }

    /// Reads up to the next occurrence of `delimiter`, at most `size` bytes.
    ///
    /// The delimiter itself stays in the stream unless `policy` is
    /// [`DelimiterPolicy::Consume`]. The returned bytes never contain `delimiter`.
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvalidDelimiter`] if `delimiter` is empty or longer than the chunk size
    /// - [`StreamError::DelimiterMissing`] if `policy` requires a delimiter that is not found
    pub fn read_until(&mut self, delimiter: &[u8], size: Option<usize>, policy: DelimiterPolicy) -> Result<Bytes, StreamError> {
        let mut scan = 0;
        self.drive(|window| window.try_read_until(delimiter, size, policy, &mut scan))
    }

    /// Consumes `delimiter`, failing with [`StreamError::DelimiterMissing`] if it is not next.
    pub fn consume_delimiter(&mut self, delimiter: &[u8]) -> Result<(), StreamError> {
        self.drive(|window| window.try_consume(delimiter))
    }

    /// Copies the rest of the stream into `sink`, one chunk at a time.
    pub fn pipe<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64, StreamError> {
        let chunk_size = self.chunk_size();
        let mut size = 0;
        loop {
            let chunk = self.read(Some(chunk_size))?;
            if chunk.is_empty() {
                return Ok(size);
            }
            sink.write_all(&chunk)?;
            size += chunk.len() as u64;
        }
    }

    /// Copies the stream into `sink` up to the next occurrence of `delimiter`.
    pub fn pipe_until<W: Write + ?Sized>(&mut self, delimiter: &[u8], sink: &mut W, policy: DelimiterPolicy) -> Result<u64, StreamError> {
        self.window.check_delimiter(delimiter)?;

        let chunk_size = self.chunk_size();
        let mut size = 0;
        loop {
            let chunk = self.read_until(delimiter, Some(chunk_size), DelimiterPolicy::Optional)?;
            if chunk.is_empty() {
                break;
            }
            sink.write_all(&chunk)?;
            size += chunk.len() as u64;
        }

        match policy {
            DelimiterPolicy::Optional => {}
            DelimiterPolicy::Required => {
                if self.peek(delimiter.len())? != delimiter {
                    return Err(StreamError::DelimiterMissing);
                }
            }
            DelimiterPolicy::Consume => self.consume_delimiter(delimiter)?,
        }
        Ok(size)
    }

    /// Discards the rest of the stream.
    pub fn exhaust(&mut self) -> Result<u64, StreamError> {
        self.pipe(&mut io::sink())
    }

    /// Returns a reader over this stream up to the next occurrence of `delimiter`.
    ///
    /// Draining the returned reader advances this one to the delimiter, which is left
    /// in place.
    pub fn delimit(&mut self, delimiter: impl Into<Bytes>) -> Result<BufferedReader<Delimited<'_, S>>, StreamError> {
        let delimiter = delimiter.into();
        self.window.check_delimiter(&delimiter)?;

        let max_len = self.window.available();
        let chunk_size = self.chunk_size();
        Ok(BufferedReader::with_chunk_size(Delimited::new(self, delimiter), max_len, chunk_size))
    }

    /// Reads one line including the trailing `\n`, at most `size` bytes.
    pub fn readline(&mut self, size: Option<usize>) -> Result<Bytes, StreamError> {
        let mut scan = 0;
        self.drive(|window| Ok(window.try_readline(size, &mut scan)))
    }

    /// Reads lines until the stream ends, or until `hint` bytes were read.
    pub fn readlines(&mut self, hint: Option<usize>) -> Result<Vec<Bytes>, StreamError> {
        let mut lines = Vec::new();
        let mut size = 0;
        loop {
            let line = self.readline(None)?;
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
}

impl<S: Pull> BufRead for BufferedReader<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.drive(|window| Ok(window.try_peek(1)))?;
        Ok(self.window.buffered())
    }

    fn consume(&mut self, amt: usize) {
        self.window.advance(amt);
    }
}

impl<S: Pull> Read for BufferedReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let size = available.len().min(buf.len());
        buf[..size].copy_from_slice(&available[..size]);
        self.window.advance(size);
        Ok(size)
    }
}
