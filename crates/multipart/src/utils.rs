//! Helper macros used across the parser.

/// Returns early with `$error` unless `$predicate` holds.
///
/// # Example
///
/// ```ignore
/// ensure!(boundary.len() <= 70, MultipartError::invalid_boundary("too long"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
