//! Upload Intake
//!
//! Everything that must pass before a submission reaches the providers:
//! - per-client rate limiting ([`rate_limit::SlidingWindowLimiter`])
//! - size ceiling and empty-file check
//! - filename sanitisation (path traversal, control characters, extension allow-list)
//! - content type sniffed from magic bytes; the client's declared type is ignored
//! - SHA-256 content hash ([`content_hash`])
//!
//! Failures here are the only errors that escape a submission.

pub mod rate_limit;

pub use rate_limit::SlidingWindowLimiter;

use mg_common::config::LimitsConfig;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Rejected submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("File is empty")]
    Empty,

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File extension not allowed: {0}")]
    DisallowedExtension(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("Rate limit exceeded: {limit} submissions per {window}")]
    RateLimited { window: &'static str, limit: usize },
}

/// Submission that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub filename: String,
    pub content_type: String,
}

/// Lower-case hex SHA-256 of `content`
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Security checks applied to every upload
#[derive(Debug, Clone)]
pub struct IntakeValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl IntakeValidator {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_file_size: limits.max_file_size,
            allowed_extensions: limits
                .allowed_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            allowed_content_types: limits
                .allowed_content_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Run every check
    pub fn validate(&self, filename: &str, content: &[u8]) -> Result<ValidatedUpload, IntakeError> {
        self.check_size(content.len())?;
        let filename = self.check_filename(filename)?;
        let content_type = self.sniff_content_type(content)?;

        Ok(ValidatedUpload {
            filename,
            content_type,
        })
    }

    pub fn check_size(&self, size: usize) -> Result<(), IntakeError> {
        if size == 0 {
            return Err(IntakeError::Empty);
        }
        if size > self.max_file_size {
            return Err(IntakeError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate a client-supplied filename, returning it trimmed
    pub fn check_filename(&self, filename: &str) -> Result<String, IntakeError> {
        let name = filename.trim();

        if name.is_empty() {
            return Err(IntakeError::InvalidFilename("filename is empty".to_string()));
        }
        if name.contains("..") {
            return Err(IntakeError::InvalidFilename(
                "path traversal sequence".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(IntakeError::InvalidFilename(
                "path separators are not allowed".to_string(),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(IntakeError::InvalidFilename(
                "control characters are not allowed".to_string(),
            ));
        }

        let extension = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => normalize_extension(ext),
            _ => return Err(IntakeError::DisallowedExtension("(none)".to_string())),
        };

        if !self.allowed_extensions.contains(&extension) {
            return Err(IntakeError::DisallowedExtension(extension));
        }

        Ok(name.to_string())
    }

    /// Determine the content type from magic bytes
    pub fn sniff_content_type(&self, content: &[u8]) -> Result<String, IntakeError> {
        let kind = infer::get(content)
            .ok_or_else(|| IntakeError::UnsupportedType("unrecognised file content".to_string()))?;
        let mime = kind.mime_type().to_string();

        if self.allowed_content_types.contains(&mime) {
            Ok(mime)
        } else {
            Err(IntakeError::UnsupportedType(mime))
        }
    }
}

/// `"JPG"`, `".jpg"` and `" .Jpg "` all become `".jpg"`
fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim().trim_start_matches('.').to_ascii_lowercase())
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest byte prefixes `infer` recognises
    pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
    pub const PDF: &[u8] = b"%PDF-1.7\n%....";
}
