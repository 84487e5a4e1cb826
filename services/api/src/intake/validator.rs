//! services/api/src/intake/validator.rs
//!
//! Upload validation: size ceiling, declared MIME type, and binary
//! magic-number signature. The MIME type is client-supplied and
//! untrustworthy; the signature check over the first 12 bytes is the
//! actual trust boundary.

/// Hard ceiling on an original upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Declared MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// A single image unit the user submitted, before compression.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Why an upload was rejected. Recovered locally: the user is prompted to
/// retry and no request is ever sent for a rejected file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported file type: {content_type}")]
    UnsupportedType { content_type: String },

    #[error("Not a genuine image (binary signature check failed)")]
    NotAGenuineImage,
}

/// The signature family detected in the first bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSignature {
    Jpeg,
    Png,
    Webp,
}

/// Inspects only the first 12 bytes: JPEG `FF D8 FF`, PNG `89 50 4E 47`,
/// WEBP `52 49 46 46` with `57 45 42 50` at offset 8.
pub fn detect_signature(data: &[u8]) -> Option<ImageSignature> {
    if data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
        return Some(ImageSignature::Jpeg);
    }
    if data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
    {
        return Some(ImageSignature::Png);
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some(ImageSignature::Webp);
    }
    None
}

/// Runs the checks in order, short-circuiting on the first failure.
/// Read-only: the candidate is never modified.
pub fn validate(candidate: &UploadCandidate) -> Result<(), UploadRejection> {
    if candidate.data.len() > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge {
            size: candidate.data.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }

    if !ALLOWED_MIME_TYPES.contains(&candidate.content_type.as_str()) {
        return Err(UploadRejection::UnsupportedType {
            content_type: candidate.content_type.clone(),
        });
    }

    if detect_signature(&candidate.data).is_none() {
        return Err(UploadRejection::NotAGenuineImage);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(content_type: &str, data: Vec<u8>) -> UploadCandidate {
        UploadCandidate {
            file_name: "package.jpg".to_string(),
            content_type: content_type.to_string(),
            data,
        }
    }

    fn jpeg_header() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0u8; 32]);
        data
    }

    #[test]
    fn accepts_genuine_jpeg() {
        assert!(validate(&candidate("image/jpeg", jpeg_header())).is_ok());
    }

    #[test]
    fn accepts_genuine_png() {
        let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0u8; 16]);
        assert!(validate(&candidate("image/png", data)).is_ok());
    }

    #[test]
    fn accepts_genuine_webp() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&[0x10, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"WEBP");
        data.extend_from_slice(&[0u8; 16]);
        assert!(validate(&candidate("image/webp", data)).is_ok());
    }

    #[test]
    fn rejects_unknown_signature_regardless_of_declared_type() {
        let data = vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B];
        assert_eq!(
            validate(&candidate("image/jpeg", data)),
            Err(UploadRejection::NotAGenuineImage)
        );
    }

    #[test]
    fn rejects_oversized_file_even_with_correct_signature() {
        let mut data = jpeg_header();
        data.resize(MAX_UPLOAD_BYTES + 1, 0);
        assert!(matches!(
            validate(&candidate("image/jpeg", data)),
            Err(UploadRejection::TooLarge { .. })
        ));
    }

    #[test]
    fn size_check_runs_before_type_check() {
        let mut data = vec![0u8; MAX_UPLOAD_BYTES + 1];
        data[0] = 0x00;
        assert!(matches!(
            validate(&candidate("application/pdf", data)),
            Err(UploadRejection::TooLarge { .. })
        ));
    }

    #[test]
    fn rejects_disallowed_declared_type() {
        assert!(matches!(
            validate(&candidate("image/gif", jpeg_header())),
            Err(UploadRejection::UnsupportedType { .. })
        ));
    }

    #[test]
    fn webp_requires_riff_and_webp_markers() {
        // WEBP fourcc without the RIFF container is not a real file.
        let mut data = vec![0u8; 8];
        data.extend_from_slice(b"WEBP");
        assert_eq!(detect_signature(&data), None);
    }

    #[test]
    fn truncated_header_is_not_an_image() {
        assert_eq!(detect_signature(&[0xFF, 0xD8]), None);
    }
}
