//! Media handlers deserializing body part content by media type
//!
//! A [`MediaHandler`] turns the bytes of one body part into a [`Media`] value. Handlers
//! are resolved through a [`MediaHandlers`] registry keyed by the media type essence,
//! such as `application/json`. The default registry handles JSON and urlencoded forms.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use micro_stream::ByteStream;
use mime::Mime;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::MultipartError;

/// A deserialized body part.
pub type Media = Value;

static DEFAULT_HANDLERS: Lazy<MediaHandlers> = Lazy::new(|| {
    let mut handlers = MediaHandlers::empty();
    handlers.insert(mime::APPLICATION_JSON.essence_str(), JsonHandler);
    handlers.insert(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str(), UrlEncodedHandler);
    handlers
});

#[async_trait(?Send)]
pub trait MediaHandler: Send + Sync {
    /// Deserializes the content read from `stream`.
    fn deserialize(&self, stream: &mut dyn Read, content_type: &str, content_length: Option<u64>) -> Result<Media, MultipartError>;

    /// Cooperative variant of [`MediaHandler::deserialize`].
    ///
    /// The default reads the whole stream before delegating to the blocking path.
    async fn deserialize_async(
        &self,
        stream: &mut dyn ByteStream,
        content_type: &str,
        content_length: Option<u64>,
    ) -> Result<Media, MultipartError> {
        let content = stream.read(None).await?;
        self.deserialize(&mut &content[..], content_type, content_length.or(Some(content.len() as u64)))
    }

    /// Whether a successful deserialization always consumes the whole stream.
    fn exhaust_stream(&self) -> bool {
        false
    }
}

/// `application/json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

#[async_trait(?Send)]
impl MediaHandler for JsonHandler {
    fn deserialize(&self, stream: &mut dyn Read, _content_type: &str, _content_length: Option<u64>) -> Result<Media, MultipartError> {
        serde_json::from_reader(stream).map_err(MultipartError::media)
    }

    fn exhaust_stream(&self) -> bool {
        // trailing bytes are rejected, so success means the stream was read to its end
        true
    }
}

/// `application/x-www-form-urlencoded`
///
/// Values are strings, a key repeated in the form maps to an array of its values.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedHandler;

#[async_trait(?Send)]
impl MediaHandler for UrlEncodedHandler {
    fn deserialize(&self, stream: &mut dyn Read, _content_type: &str, content_length: Option<u64>) -> Result<Media, MultipartError> {
        let mut content = Vec::with_capacity(content_length.and_then(|len| usize::try_from(len).ok()).unwrap_or_default());
        stream.read_to_end(&mut content).map_err(MultipartError::media)?;

        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&content).map_err(MultipartError::media)?;

        let mut form = Map::new();
        for (key, value) in pairs {
            match form.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
                None => {
                    form.insert(key, Value::String(value));
                }
            }
        }
        Ok(Value::Object(form))
    }

    fn exhaust_stream(&self) -> bool {
        true
    }
}

/// Media handlers by media type essence.
#[derive(Clone)]
pub struct MediaHandlers {
    handlers: HashMap<String, Arc<dyn MediaHandler>>,
}

impl MediaHandlers {
    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registers `handler` for `media_type`, replacing any previous one.
    pub fn insert<H: MediaHandler + 'static>(&mut self, media_type: &str, handler: H) -> &mut Self {
        self.handlers.insert(essence(media_type), Arc::new(handler));
        self
    }

    pub fn remove(&mut self, media_type: &str) -> bool {
        self.handlers.remove(&essence(media_type)).is_some()
    }

    pub fn get(&self, media_type: &str) -> Option<&dyn MediaHandler> {
        self.handlers.get(&essence(media_type)).map(|handler| &**handler)
    }

    /// Resolves the handler of `media_type`, trying `fallback` if there is none.
    pub fn find_by_media_type(&self, media_type: &str, fallback: &str) -> Result<&dyn MediaHandler, MultipartError> {
        self.get(media_type)
            .or_else(|| self.get(fallback))
            .ok_or_else(|| MultipartError::unsupported_media_type(media_type))
    }
}

impl Default for MediaHandlers {
    fn default() -> Self {
        DEFAULT_HANDLERS.clone()
    }
}

impl fmt::Debug for MediaHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut media_types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        media_types.sort_unstable();
        f.debug_struct("MediaHandlers").field("media_types", &media_types).finish()
    }
}

/// Lowercase `type/subtype`, parameters stripped.
fn essence(media_type: &str) -> String {
    match media_type.parse::<Mime>() {
        Ok(mime) => mime.essence_str().to_ascii_lowercase(),
        Err(_) => media_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json() {
        let media = JsonHandler.deserialize(&mut &br#"{"a": [1, 2]}"#[..], "application/json", None).unwrap();
        assert_eq!(media, json!({"a": [1, 2]}));

        assert!(matches!(JsonHandler.deserialize(&mut &b"{"[..], "application/json", None), Err(MultipartError::Media { .. })));
    }

    #[test]
    fn test_urlencoded() {
        let media = UrlEncodedHandler.deserialize(&mut &b"a=1&b=x+y&a=2&a=3"[..], "application/x-www-form-urlencoded", None).unwrap();
        assert_eq!(media, json!({"a": ["1", "2", "3"], "b": "x y"}));
    }

    #[test]
    fn test_find_by_media_type() {
        let handlers = MediaHandlers::default();
        assert!(handlers.find_by_media_type("Application/JSON; charset=utf-8", "text/plain").is_ok());
        assert!(handlers.find_by_media_type("text/plain", "application/json").is_ok());

        let e = handlers.find_by_media_type("text/plain", "text/plain").err();
        assert!(matches!(e, Some(MultipartError::UnsupportedMediaType { ref media_type }) if media_type == "text/plain"));
    }

    #[test]
    fn test_register_handler() {
        struct Raw;

        #[async_trait(?Send)]
        impl MediaHandler for Raw {
            fn deserialize(&self, stream: &mut dyn Read, _: &str, _: Option<u64>) -> Result<Media, MultipartError> {
                let mut content = String::new();
                stream.read_to_string(&mut content).map_err(MultipartError::media)?;
                Ok(Value::String(content))
            }
        }

        let mut handlers = MediaHandlers::default();
        handlers.insert("text/plain", Raw);
        let handler = handlers.find_by_media_type("text/plain; charset=utf-8", "text/plain").unwrap();
        assert_eq!(handler.deserialize(&mut &b"raw"[..], "text/plain", None).unwrap(), json!("raw"));
        assert!(!handler.exhaust_stream());

        assert!(handlers.remove("TEXT/PLAIN"));
        assert!(handlers.get("text/plain").is_none());
        assert!(MediaHandlers::empty().get("application/json").is_none());
    }
}
