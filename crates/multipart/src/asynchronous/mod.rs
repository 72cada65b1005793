//! Cooperative counterparts of [`MultipartForm`](crate::MultipartForm) and
//! [`BodyPart`](crate::BodyPart), reading from a [`ChunkSource`](micro_stream::ChunkSource).
//!
//! The state machine and header handling are shared with the blocking parser. Chunk
//! fetches are the only points where these types suspend.

mod form;
mod part;

pub use form::AsyncMultipartForm;
pub use part::AsyncBodyPart;
