use crate::errors::domain::{classify_io_hint_from_message, classify_message_by_patterns, DomainError, ErrorCode, IoErrorHint};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorCode {
    NotFound,
    AccessDenied,
    UnsupportedFormat,
    CorruptedArchive,
    PasswordRequired,
    WrongPassword,
    ExtractionFailed,
    IoError,
    OutOfMemory,
    Cancelled,
    InternalError,
}

impl ErrorCode for ArchiveErrorCode {
    fn as_code_str(self) -> &'static str {
        match self {
            ArchiveErrorCode::NotFound => "archive/not-found",
            ArchiveErrorCode::AccessDenied => "archive/access-denied",
            ArchiveErrorCode::UnsupportedFormat => "archive/unsupported-format",
            ArchiveErrorCode::CorruptedArchive => "archive/corrupted-archive",
            ArchiveErrorCode::PasswordRequired => "archive/password-required",
            ArchiveErrorCode::WrongPassword => "archive/wrong-password",
            ArchiveErrorCode::ExtractionFailed => "archive/extraction-failed",
            ArchiveErrorCode::IoError => "archive/io-error",
            ArchiveErrorCode::OutOfMemory => "archive/out-of-memory",
            ArchiveErrorCode::Cancelled => "archive/cancelled",
            ArchiveErrorCode::InternalError => "archive/internal-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveError {
    pub code: ArchiveErrorCode,
    pub message: String,
}

impl ArchiveError {
    pub fn new(code: ArchiveErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorCode::NotFound, message)
    }

    pub fn password_required(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorCode::PasswordRequired, message)
    }

    /// Classify a raw error message from an underlying archive library (zip,
    /// sevenz-rust2, rar) into a typed ArchiveError by pattern matching, the
    /// way `ThumbnailError::from_external_message` classifies decode errors.
    pub fn from_external_message(raw: impl Into<String>) -> Self {
        let message = raw.into();
        if let Some(hint) = classify_io_hint_from_message(&message) {
            if let Some(code) = code_from_io_hint(hint) {
                return Self::new(code, message);
            }
        }
        let code = classify_message_by_patterns(&message, ARCHIVE_CLASSIFICATION_RULES, ArchiveErrorCode::InternalError);
        Self::new(code, message)
    }
}

fn code_from_io_hint(hint: IoErrorHint) -> Option<ArchiveErrorCode> {
    match hint {
        IoErrorHint::NotFound => Some(ArchiveErrorCode::NotFound),
        IoErrorHint::PermissionDenied => Some(ArchiveErrorCode::AccessDenied),
        IoErrorHint::ReadOnlyFilesystem => Some(ArchiveErrorCode::AccessDenied),
        _ => None,
    }
}

const ARCHIVE_CLASSIFICATION_RULES: &[(ArchiveErrorCode, &[&str])] = &[
    (ArchiveErrorCode::WrongPassword, &["wrong password", "invalid password", "bad password"]),
    (ArchiveErrorCode::PasswordRequired, &["password", "encrypted"]),
    (ArchiveErrorCode::NotFound, &["no such file", "not found", "does not exist"]),
    (ArchiveErrorCode::AccessDenied, &["permission denied", "access is denied"]),
    (ArchiveErrorCode::UnsupportedFormat, &["unsupported", "unknown format", "not a valid"]),
    (ArchiveErrorCode::CorruptedArchive, &["corrupt", "invalid", "bad crc", "checksum"]),
    (ArchiveErrorCode::Cancelled, &["cancelled", "canceled"]),
    (ArchiveErrorCode::OutOfMemory, &["out of memory", "allocation failed"]),
];

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ArchiveError {}

impl DomainError for ArchiveError {
    fn code_str(&self) -> &'static str {
        self.code.as_code_str()
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::from_external_message(err.to_string())
    }
}
