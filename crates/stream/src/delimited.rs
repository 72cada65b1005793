//! Sources scoped to the next occurrence of a delimiter on a parent reader.
//!
//! A delimited source mutably borrows its parent for as long as it lives, so the parent
//! cannot be read from again until the sub-reader built on top of it is dropped.

use bytes::Bytes;

use crate::async_reader::AsyncBufferedReader;
use crate::reader::BufferedReader;
use crate::source::{ChunkSource, Pull};
use crate::window::DelimiterPolicy;
use crate::StreamError;

/// [`Pull`] source reading a [`BufferedReader`] up to `delimiter`.
#[derive(Debug)]
pub struct Delimited<'p, S> {
    parent: &'p mut BufferedReader<S>,
    delimiter: Bytes,
}

impl<'p, S: Pull> Delimited<'p, S> {
    pub(crate) fn new(parent: &'p mut BufferedReader<S>, delimiter: Bytes) -> Self {
        Self { parent, delimiter }
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }
}

impl<S: Pull> Pull for Delimited<'_, S> {
    fn pull(&mut self, max_size: usize) -> Result<Bytes, StreamError> {
        self.parent.read_until(&self.delimiter, Some(max_size), DelimiterPolicy::Optional)
    }
}

/// [`ChunkSource`] reading an [`AsyncBufferedReader`] up to `delimiter`.
#[derive(Debug)]
pub struct AsyncDelimited<'p, S> {
    parent: &'p mut AsyncBufferedReader<S>,
    delimiter: Bytes,
}

impl<'p, S: ChunkSource> AsyncDelimited<'p, S> {
    pub(crate) fn new(parent: &'p mut AsyncBufferedReader<S>, delimiter: Bytes) -> Self {
        Self { parent, delimiter }
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }
}

impl<S: ChunkSource> ChunkSource for AsyncDelimited<'_, S> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        let chunk_size = self.parent.chunk_size();
        let chunk = self.parent.read_until(&self.delimiter, Some(chunk_size), DelimiterPolicy::Optional).await?;
        Ok((!chunk.is_empty()).then_some(chunk))
    }
}
