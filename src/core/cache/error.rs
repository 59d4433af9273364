use crate::errors::domain::{classify_io_hint_from_message, classify_message_by_patterns, DomainError, ErrorCode, IoErrorHint};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheErrorCode {
    NotFound,
    StorageError,
    CorruptedEntry,
    IoError,
    SerializationError,
    InternalError,
}

impl ErrorCode for CacheErrorCode {
    fn as_code_str(self) -> &'static str {
        match self {
            CacheErrorCode::NotFound => "cache/not-found",
            CacheErrorCode::StorageError => "cache/storage-error",
            CacheErrorCode::CorruptedEntry => "cache/corrupted-entry",
            CacheErrorCode::IoError => "cache/io-error",
            CacheErrorCode::SerializationError => "cache/serialization-error",
            CacheErrorCode::InternalError => "cache/internal-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheError {
    pub code: CacheErrorCode,
    pub message: String,
}

impl CacheError {
    pub fn new(code: CacheErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn from_external_message(raw: impl Into<String>) -> Self {
        let message = raw.into();
        if let Some(hint) = classify_io_hint_from_message(&message) {
            if let Some(code) = code_from_io_hint(hint) {
                return Self::new(code, message);
            }
        }
        let code = classify_message_by_patterns(&message, CACHE_CLASSIFICATION_RULES, CacheErrorCode::StorageError);
        Self::new(code, message)
    }
}

fn code_from_io_hint(hint: IoErrorHint) -> Option<CacheErrorCode> {
    match hint {
        IoErrorHint::NotFound => Some(CacheErrorCode::NotFound),
        IoErrorHint::Other => None,
        _ => Some(CacheErrorCode::IoError),
    }
}

const CACHE_CLASSIFICATION_RULES: &[(CacheErrorCode, &[&str])] = &[
    (CacheErrorCode::CorruptedEntry, &["malformed", "corrupt", "checksum", "bad blob"]),
    (CacheErrorCode::SerializationError, &["serialize", "deserialize", "json", "decode error"]),
    (CacheErrorCode::NotFound, &["no such", "not found"]),
    (CacheErrorCode::IoError, &["io error", "disk", "filesystem"]),
];

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CacheError {}

impl DomainError for CacheError {
    fn code_str(&self) -> &'static str {
        self.code.as_code_str()
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::from_external_message(err.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        Self::from_external_message(err.to_string())
    }
}
