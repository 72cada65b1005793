//! A streaming `multipart/form-data` parser
//!
//! This crate parses RFC 7578 form bodies one part at a time, on top of the bounded
//! readers of `micro-stream`. A part is never buffered unless its content is asked for,
//! and then only up to a configured size.
//!
//! # Features
//!
//! - Blocking ([`MultipartForm`]) and cooperative ([`AsyncMultipartForm`]) parsers
//! - Boundaries detected across arbitrarily split chunks
//! - Limits on part count, part header size and buffered part size
//! - `filename*` (RFC 5987) filenames and charset-aware text fields
//! - Pluggable media handlers, JSON and urlencoded forms out of the box
//!
//! # Example
//!
//! ```
//! use micro_multipart::{MultipartForm, ParseOptions};
//! use micro_stream::ReadSource;
//!
//! let body = b"--XYZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--XYZ--\r\n";
//! let mut form = MultipartForm::from_source(
//!     ReadSource::new(&body[..]),
//!     Some(body.len() as u64),
//!     "multipart/form-data; boundary=XYZ",
//!     ParseOptions::default(),
//! )
//! .unwrap();
//!
//! while let Some(mut part) = form.next_part().unwrap() {
//!     assert_eq!(part.name(), Some("a"));
//!     assert_eq!(part.text().unwrap().as_deref(), Some("hello"));
//! }
//! ```

mod asynchronous;
mod boundary;
mod charset;
mod error;
mod filename;
mod form;
mod headers;
mod media;
mod options;
mod part;
mod utils;

pub use asynchronous::{AsyncBodyPart, AsyncMultipartForm};
pub use boundary::{MAX_BOUNDARY_LEN, parse_boundary};
pub use charset::Charset;
pub use error::MultipartError;
pub use filename::secure_filename;
pub use form::MultipartForm;
pub use headers::{CONTENT_TRANSFER_ENCODING, ContentDisposition, parse_part_headers};
pub use media::{JsonHandler, Media, MediaHandler, MediaHandlers, UrlEncodedHandler};
pub use options::ParseOptions;
pub use part::{BodyPart, DEFAULT_CONTENT_TYPE};
