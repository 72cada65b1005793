//! Boundary extraction from the enclosing `Content-Type` header.

use bytes::Bytes;
use mime::Mime;

use crate::MultipartError;
use crate::utils::ensure;

/// RFC 2046, section 5.1: a boundary parameter consists of 1 to 70 characters.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Extracts the `boundary` parameter of a `multipart/*` content type.
///
/// Trailing whitespace is presumed to have been added by a gateway and is removed.
///
/// # Errors
///
/// [`MultipartError::InvalidBoundary`] if the content type cannot be parsed, is not a
/// multipart type, carries no boundary, or the boundary is not 1 to 70 characters long.
pub fn parse_boundary(content_type: &str) -> Result<Bytes, MultipartError> {
    let mime: Mime = content_type.parse().map_err(|e| MultipartError::invalid_boundary(format!("invalid content type: {e}")))?;
    ensure!(mime.type_() == mime::MULTIPART, MultipartError::invalid_boundary(format!("{} is not a multipart type", mime.essence_str())));

    let boundary = mime
        .get_param(mime::BOUNDARY)
        .ok_or_else(|| MultipartError::invalid_boundary(format!("no boundary specifier found in {content_type:?}")))?;

    let boundary = boundary.as_str().trim_end();
    ensure!(
        (1..=MAX_BOUNDARY_LEN).contains(&boundary.len()),
        MultipartError::invalid_boundary("the boundary parameter must consist of 1 to 70 characters")
    );

    Ok(Bytes::copy_from_slice(boundary.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let boundary = parse_boundary("multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW").unwrap();
        assert_eq!(&boundary[..], b"----WebKitFormBoundary7MA4YWxkTrZu0gW");

        let boundary = parse_boundary("multipart/form-data; charset=utf-8; boundary=\"a b:c\"").unwrap();
        assert_eq!(&boundary[..], b"a b:c");
    }

    #[test]
    fn test_trailing_whitespace_stripped() {
        let boundary = parse_boundary("multipart/form-data; boundary=\"BOUNDARY  \"").unwrap();
        assert_eq!(&boundary[..], b"BOUNDARY");
    }

    #[test]
    fn test_boundary_length() {
        let longest = "B".repeat(70);
        assert_eq!(parse_boundary(&format!("multipart/form-data; boundary={longest}")).unwrap().len(), 70);

        let too_long = "B".repeat(71);
        let e = parse_boundary(&format!("multipart/form-data; boundary={too_long}")).unwrap_err();
        assert!(matches!(e, MultipartError::InvalidBoundary { .. }));
        assert!(e.is_config_error());

        assert!(parse_boundary("multipart/form-data; boundary=\"   \"").is_err());
    }

    #[test]
    fn test_missing_boundary() {
        assert!(matches!(parse_boundary("multipart/form-data"), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(parse_boundary("application/json; boundary=x"), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(parse_boundary("not a content type"), Err(MultipartError::InvalidBoundary { .. })));
    }
}
