//! Document validation seam for the upload path.
//!
//! Binary extraction (PDF/DOCX parsing) is performed by an upstream
//! ingestion collaborator; this module validates what arrives at the HTTP
//! surface: declared type, size cap, UTF-8 decoding for plain text, and a
//! non-empty extraction result.

use thiserror::Error;

/// Maximum accepted payload size.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Extensions the service accepts.
const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// User-facing errors raised while validating an uploaded document.
///
/// These abort the upload immediately with a specific message; they are
/// never retried.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Declared type or filename extension is not supported.
    #[error("Invalid file type. Only PDF, DOCX, and TXT files are allowed.")]
    UnsupportedType,
    /// Payload exceeds the upload size cap.
    #[error("File too large. Maximum size is 10MB.")]
    TooLarge,
    /// Plain-text payload was not valid UTF-8.
    #[error("Document is not valid UTF-8 text")]
    InvalidEncoding,
    /// No text could be extracted from the document.
    #[error("No text could be extracted from the document")]
    Empty,
}

/// Check whether the filename carries an allowed extension.
pub fn allowed_file(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Validate an uploaded document whose text was extracted upstream.
///
/// Returns the trimmed text and the file extension used for reporting.
pub fn process_document(filename: &str, content: &str) -> Result<(String, String), ExtractionError> {
    let extension = file_extension(filename)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or(ExtractionError::UnsupportedType)?;

    if content.len() > MAX_UPLOAD_BYTES {
        return Err(ExtractionError::TooLarge);
    }

    let text = content.trim();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }

    Ok((text.to_string(), extension))
}

/// Decode raw plain-text bytes, enforcing the size cap and UTF-8 encoding.
pub fn extract_text_from_txt(bytes: &[u8]) -> Result<String, ExtractionError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ExtractionError::TooLarge);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ExtractionError::InvalidEncoding)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        assert!(allowed_file("report.pdf"));
        assert!(allowed_file("notes.TXT"));
        assert!(allowed_file("thesis.docx"));
        assert!(!allowed_file("image.png"));
        assert!(!allowed_file("no-extension"));
    }

    #[test]
    fn process_document_returns_text_and_extension() {
        let (text, extension) = process_document("notes.txt", "  Hello world.  ").expect("valid");
        assert_eq!(text, "Hello world.");
        assert_eq!(extension, "txt");
    }

    #[test]
    fn process_document_rejects_unsupported_type() {
        let error = process_document("image.png", "data").unwrap_err();
        assert!(matches!(error, ExtractionError::UnsupportedType));
    }

    #[test]
    fn process_document_rejects_empty_text() {
        let error = process_document("notes.txt", "   ").unwrap_err();
        assert!(matches!(error, ExtractionError::Empty));
    }

    #[test]
    fn txt_decoding_rejects_invalid_utf8() {
        let error = extract_text_from_txt(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(error, ExtractionError::InvalidEncoding));
    }

    #[test]
    fn size_cap_is_enforced() {
        let oversized = "a".repeat(MAX_UPLOAD_BYTES + 1);
        let error = process_document("big.txt", &oversized).unwrap_err();
        assert!(matches!(error, ExtractionError::TooLarge));
    }
}
