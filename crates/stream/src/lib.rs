//! Bounded buffered readers with cross-chunk delimiter scanning
//!
//! This crate reads a byte stream that arrives in arbitrarily sized chunks, such as an
//! HTTP request body, while holding no more than a small window of it in memory.
//! It is the foundation of `micro-multipart`.
//!
//! # Features
//!
//! - Byte budget: a reader never pulls more than its configured length from the source
//! - Delimiter scanning that detects delimiters straddling two chunks
//! - Delimited sub-readers, scoped to the next occurrence of a delimiter on their parent
//! - A blocking reader over [`Pull`] sources and a cooperative reader over [`ChunkSource`]s,
//!   both driving the same scanning steps
//!
//! # Example
//!
//! ```
//! use micro_stream::{BufferedReader, DelimiterPolicy, ReadSource};
//!
//! let body = b"first\r\n--sep\r\nsecond";
//! let mut reader = BufferedReader::new(ReadSource::new(&body[..]), Some(body.len() as u64));
//!
//! let first = reader.read_until(b"\r\n--sep", None, DelimiterPolicy::Consume).unwrap();
//! assert_eq!(&first[..], b"first");
//!
//! reader.consume_delimiter(b"\r\n").unwrap();
//! assert_eq!(&reader.read_all().unwrap()[..], b"second");
//! ```
//!
//! # Architecture
//!
//! - [`window`](DelimiterPolicy): the buffered bytes and every scanning step, without I/O
//! - [`BufferedReader`] pulls chunks on demand, blocking the calling thread
//! - [`AsyncBufferedReader`] awaits chunks, suspending only between scanning steps
//! - [`Delimited`] and [`AsyncDelimited`] exclusively borrow their parent reader, so the
//!   parent cannot be driven while a sub-reader is alive

mod async_reader;
mod delimited;
mod error;
mod reader;
mod source;
mod window;

pub use async_reader::{AsyncBufferedReader, ByteStream, DEFAULT_ASYNC_CHUNK_SIZE};
pub use delimited::{AsyncDelimited, Delimited};
pub use error::StreamError;
pub use reader::{BufferedReader, DEFAULT_CHUNK_SIZE};
pub use source::{ChunkSource, FnSource, Pull, ReadSource, StreamSource, from_async_read};
pub use window::DelimiterPolicy;
