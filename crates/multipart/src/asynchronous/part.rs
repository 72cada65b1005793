use bytes::Bytes;
use http::HeaderMap;
use micro_stream::{AsyncBufferedReader, AsyncDelimited, ChunkSource};

use crate::media::Media;
use crate::part::PartHeaders;
use crate::{MultipartError, ParseOptions};

/// One part of an [`AsyncMultipartForm`](crate::AsyncMultipartForm).
#[derive(Debug)]
pub struct AsyncBodyPart<'a, S> {
    stream: AsyncBufferedReader<AsyncDelimited<'a, S>>,
    headers: PartHeaders<'a>,
    data: Option<Bytes>,
    oversized: bool,
    media: Option<Media>,
}

impl<'a, S: ChunkSource> AsyncBodyPart<'a, S> {
    pub(crate) fn new(stream: AsyncBufferedReader<AsyncDelimited<'a, S>>, headers: HeaderMap, options: &'a ParseOptions) -> Self {
        Self { stream, headers: PartHeaders::new(headers, options), data: None, oversized: false, media: None }
    }

    pub fn headers(&self) -> &HeaderMap {
        self.headers.headers()
    }

    /// The `Content-Type` of the part, `text/plain` if absent.
    pub fn content_type(&self) -> &str {
        self.headers.content_type()
    }

    pub fn content_length(&self) -> Option<u64> {
        None
    }

    pub fn name(&self) -> Option<&str> {
        self.headers.name()
    }

    pub fn filename(&self) -> Result<Option<String>, MultipartError> {
        self.headers.filename()
    }

    pub fn secure_filename(&self) -> Result<String, MultipartError> {
        self.headers.secure_filename()
    }

    pub fn stream(&mut self) -> &mut AsyncBufferedReader<AsyncDelimited<'a, S>> {
        &mut self.stream
    }

    /// Reads the whole part content, at most `max_body_part_buffer_size` bytes.
    pub async fn data(&mut self) -> Result<Bytes, MultipartError> {
        if let Some(data) = &self.data {
            return Ok(data.clone());
        }
        if self.oversized {
            return Err(self.headers.too_large());
        }

        let data = self.stream.read(Some(self.headers.data_limit())).await?;
        if let Err(e) = self.headers.check_data(&data) {
            // the content read so far is gone, later reads would return a truncated part
            self.oversized = true;
            return Err(e);
        }
        Ok(self.data.insert(data).clone())
    }

    pub async fn text(&mut self) -> Result<Option<String>, MultipartError> {
        if !self.headers.is_text() {
            return Ok(None);
        }
        let data = self.data().await?;
        self.headers.decode_text(&data).map(Some)
    }

    /// The content deserialized by the media handler of its content type.
    pub async fn media(&mut self) -> Result<&Media, MultipartError> {
        let media = match self.media.take() {
            Some(media) => media,
            None => self.load_media().await?,
        };
        Ok(self.media.insert(media))
    }

    async fn load_media(&mut self) -> Result<Media, MultipartError> {
        let handler = self.headers.media_handler()?;
        let content_type = self.headers.content_type();

        if let Some(data) = &self.data {
            return handler.deserialize(&mut &data[..], content_type, Some(data.len() as u64));
        }
        if self.oversized {
            return Err(self.headers.too_large());
        }

        let media = handler.deserialize_async(&mut self.stream, content_type, None).await?;
        if !handler.exhaust_stream() {
            self.stream.exhaust().await?;
        }
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AsyncMultipartForm;
    use crate::media::MediaHandler;
    use async_trait::async_trait;
    use futures::stream;
    use futures::stream::StreamExt;
    use micro_stream::{ByteStream, StreamSource, from_async_read};
    use serde_json::json;
    use std::io::Read;

    fn single_part(headers: &str, content: &[u8]) -> Vec<u8> {
        let mut data = format!("--B\r\n{headers}\r\n\r\n").into_bytes();
        data.extend_from_slice(content);
        data.extend_from_slice(b"\r\n--B--\r\n");
        data
    }

    /// Reads only the first chunk of the part.
    struct Peeking;

    #[async_trait(?Send)]
    impl MediaHandler for Peeking {
        fn deserialize(&self, stream: &mut dyn Read, _: &str, _: Option<u64>) -> Result<Media, MultipartError> {
            let mut byte = [0];
            stream.read_exact(&mut byte).map_err(MultipartError::media)?;
            Ok(Media::from(byte[0]))
        }

        async fn deserialize_async(&self, stream: &mut dyn ByteStream, _: &str, _: Option<u64>) -> Result<Media, MultipartError> {
            let head = stream.read(Some(2)).await?;
            Ok(Media::from(String::from_utf8_lossy(&head).into_owned()))
        }
    }

    #[tokio::test]
    async fn test_async_media_exhausts_stream() {
        let mut options = ParseOptions::default();
        options.media_handlers_mut().insert("application/x-peek", Peeking);

        let data = single_part("Content-Type: application/x-peek", b"abcdef");
        let mut form = AsyncMultipartForm::new(AsyncBufferedReader::new(from_async_read(&data[..], 3), None), b"B", options).unwrap();

        let mut part = form.next_part().await.unwrap().unwrap();
        assert_eq!(part.media().await.unwrap(), &json!("ab"));
        assert!(part.stream().is_eof());
        assert!(form.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_media_from_cached_data() {
        let data = single_part("Content-Type: application/x-www-form-urlencoded", b"k=v&k=w");
        let chunks: Vec<std::io::Result<Bytes>> = vec![Ok(Bytes::from(data))];
        let reader = AsyncBufferedReader::new(StreamSource::new(stream::iter(chunks)), None);
        let mut form = AsyncMultipartForm::new(reader, b"B", ParseOptions::default()).unwrap();

        let mut part = form.next_part().await.unwrap().unwrap();
        assert_eq!(&part.data().await.unwrap()[..], b"k=v&k=w");
        assert_eq!(part.media().await.unwrap(), &json!({"k": ["v", "w"]}));
        assert_eq!(part.text().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_data_stays_rejected() {
        let data = single_part(r#"Content-Disposition: form-data; name="a""#, b"0123456789ABCDEF");
        let reader = AsyncBufferedReader::new(from_async_read(&data[..], 4), None);
        let options = ParseOptions::default().with_max_body_part_buffer_size(9);
        let mut form = AsyncMultipartForm::new(reader, b"B", options).unwrap();

        let mut part = form.next_part().await.unwrap().unwrap();
        assert!(matches!(part.data().await, Err(MultipartError::PartTooLarge { max_size: 9 })));
        assert!(matches!(part.data().await, Err(MultipartError::PartTooLarge { max_size: 9 })));
        assert!(matches!(part.text().await, Err(MultipartError::PartTooLarge { max_size: 9 })));
        assert!(form.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_chunks() {
        let data = single_part(r#"Content-Disposition: form-data; name="up"; filename="a b.bin""#, &[7; 100]);
        let reader = AsyncBufferedReader::with_chunk_size(from_async_read(&data[..], 16), None, 32);
        let mut form = AsyncMultipartForm::new(reader, b"B", ParseOptions::default()).unwrap();

        let mut part = form.next_part().await.unwrap().unwrap();
        assert_eq!(part.secure_filename().unwrap(), "a_b.bin");

        let mut total = 0;
        {
            let mut chunks = std::pin::pin!(part.stream().chunks().unwrap());
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.unwrap();
                assert!(chunk.len() <= 32 && chunk.iter().all(|&b| b == 7));
                total += chunk.len();
            }
        }
        assert_eq!(total, 100);
        assert!(part.stream().chunks().is_err());
    }
}
