use unicode_normalization::UnicodeNormalization;

use crate::MultipartError;
use crate::utils::ensure;

/// Sanitizes `filename` to contain only ASCII alphanumerals, `.`, `-` and `_`.
///
/// Every other character is replaced with `_`, and so is a leading `.` so the result is
/// never a hidden file. The name is NFKD-normalized first, so characters with a
/// compatibility decomposition keep their ASCII base:
///
/// ```
/// use micro_multipart::secure_filename;
///
/// assert_eq!(secure_filename("Bold Digit \u{1d7cf}").unwrap(), "Bold_Digit_1");
/// assert_eq!(secure_filename("Ångström unit physics.pdf").unwrap(), "A_ngstro_m_unit_physics.pdf");
/// ```
///
/// # Errors
///
/// [`MultipartError::InvalidFilename`] if `filename` is empty.
pub fn secure_filename(filename: &str) -> Result<String, MultipartError> {
    ensure!(!filename.is_empty(), MultipartError::invalid_filename("filename may not be an empty string"));

    let secured = filename
        .nfkd()
        .enumerate()
        .map(|(i, c)| match c {
            '.' if i == 0 => '_',
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    Ok(secured)
}
