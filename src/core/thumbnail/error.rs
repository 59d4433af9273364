//! Grounded on `commands/thumbnails/error.rs`'s `ThumbnailErrorCode`/`ThumbnailError`.

use crate::errors::domain::{classify_io_hint_from_message, classify_message_by_patterns, DomainError, ErrorCode, IoErrorHint};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailErrorCode {
    NotFound,
    AccessDenied,
    UnsupportedFormat,
    CorruptedData,
    DecodeTimeout,
    SourceTooLarge,
    Cancelled,
    IoError,
    InternalError,
}

impl ErrorCode for ThumbnailErrorCode {
    fn as_code_str(self) -> &'static str {
        match self {
            ThumbnailErrorCode::NotFound => "thumbnail/not-found",
            ThumbnailErrorCode::AccessDenied => "thumbnail/access-denied",
            ThumbnailErrorCode::UnsupportedFormat => "thumbnail/unsupported-format",
            ThumbnailErrorCode::CorruptedData => "thumbnail/corrupted-data",
            ThumbnailErrorCode::DecodeTimeout => "thumbnail/decode-timeout",
            ThumbnailErrorCode::SourceTooLarge => "thumbnail/source-too-large",
            ThumbnailErrorCode::Cancelled => "thumbnail/cancelled",
            ThumbnailErrorCode::IoError => "thumbnail/io-error",
            ThumbnailErrorCode::InternalError => "thumbnail/internal-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailError {
    pub code: ThumbnailErrorCode,
    pub message: String,
}

impl ThumbnailError {
    pub fn new(code: ThumbnailErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn from_external_message(raw: impl Into<String>) -> Self {
        let message = raw.into();
        if let Some(hint) = classify_io_hint_from_message(&message) {
            if let Some(code) = code_from_io_hint(hint) {
                return Self::new(code, message);
            }
        }
        let code = classify_message_by_patterns(&message, THUMBNAIL_CLASSIFICATION_RULES, ThumbnailErrorCode::InternalError);
        Self::new(code, message)
    }
}

fn code_from_io_hint(hint: IoErrorHint) -> Option<ThumbnailErrorCode> {
    match hint {
        IoErrorHint::NotFound => Some(ThumbnailErrorCode::NotFound),
        IoErrorHint::PermissionDenied => Some(ThumbnailErrorCode::AccessDenied),
        _ => None,
    }
}

const THUMBNAIL_CLASSIFICATION_RULES: &[(ThumbnailErrorCode, &[&str])] = &[
    (ThumbnailErrorCode::DecodeTimeout, &["timed out", "timeout"]),
    (ThumbnailErrorCode::Cancelled, &["cancelled", "canceled"]),
    (ThumbnailErrorCode::SourceTooLarge, &["too large", "dimensions exceed", "allocation"]),
    (ThumbnailErrorCode::CorruptedData, &["corrupt", "invalid data", "malformed", "decode error"]),
    (ThumbnailErrorCode::UnsupportedFormat, &["unsupported", "unknown format", "unrecognized"]),
    (ThumbnailErrorCode::NotFound, &["no such file", "not found"]),
    (ThumbnailErrorCode::AccessDenied, &["permission denied"]),
];

impl fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ThumbnailError {}

impl DomainError for ThumbnailError {
    fn code_str(&self) -> &'static str {
        self.code.as_code_str()
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ThumbnailError {
    fn from(err: std::io::Error) -> Self {
        Self::from_external_message(err.to_string())
    }
}

impl From<image::ImageError> for ThumbnailError {
    fn from(err: image::ImageError) -> Self {
        Self::from_external_message(err.to_string())
    }
}

impl From<crate::core::archive::ArchiveError> for ThumbnailError {
    fn from(err: crate::core::archive::ArchiveError) -> Self {
        Self::from_external_message(err.message)
    }
}
