//! Request/result/value types shared by the queue (C4) and generator (C5).

use crate::core::virtual_path::VirtualPath;
use serde::{Deserialize, Serialize};

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelFormat {
    Bgra32,
    Rgba32,
    Bgr24,
    Rgb24,
    Gray8,
    Gray16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Bgra32 | PixelFormat::Rgba32 => 4,
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
            PixelFormat::Gray16 => 2,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded/downsampled pixel data. Invariant: `pixel_bytes.len() == stride * height`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub stride: u32,
    pub pixel_bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn stride_matches_invariant(&self) -> bool {
        self.pixel_bytes.len() as u64 == self.stride as u64 * self.height as u64
    }
}

/// Where the source bytes for a thumbnail request come from.
#[derive(Debug, Clone)]
pub enum ThumbnailSource {
    /// A plain filesystem path.
    File(String),
    /// Bytes already resident in memory (e.g. an archive entry already
    /// extracted by the caller); `VirtualPath` serves only as an identifier.
    Memory(VirtualPath, std::sync::Arc<[u8]>),
}

impl ThumbnailSource {
    /// Stable identifier used for cache-key derivation and `cancel_by_path`
    /// matching: the filesystem path for `File`, the VirtualPath's wire form
    /// for `Memory`.
    pub fn identifier(&self) -> String {
        match self {
            ThumbnailSource::File(path) => path.clone(),
            ThumbnailSource::Memory(vpath, _) => vpath.to_string_form(),
        }
    }
}

pub type ResultCallback = std::sync::Arc<dyn Fn(ThumbnailResult) + Send + Sync>;

#[derive(Clone)]
pub struct ThumbnailRequest {
    pub id: RequestId,
    pub source: ThumbnailSource,
    pub target_size: u32,
    pub priority: Priority,
    /// Invoked on the worker thread once the request reaches a terminal
    /// state; see the generator's delivery contract for when it fires.
    pub callback: ResultCallback,
    /// Monotonic sequence number used to break priority ties (earlier wins).
    pub created_at: u64,
}

impl std::fmt::Debug for ThumbnailRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailRequest")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target_size", &self.target_size)
            .field("priority", &self.priority)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailErrorInfo {
    pub code: &'static str,
    pub message: String,
}

/// Exactly one of `thumbnail` or `error` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResult {
    pub id: RequestId,
    pub path: String,
    pub thumbnail: Option<DecodedImage>,
    pub error: Option<ThumbnailErrorInfo>,
    pub original_width: u32,
    pub original_height: u32,
}

impl ThumbnailResult {
    pub fn success(id: RequestId, path: String, thumbnail: DecodedImage, original_width: u32, original_height: u32) -> Self {
        Self { id, path, thumbnail: Some(thumbnail), error: None, original_width, original_height }
    }

    pub fn failure(id: RequestId, path: String, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            path,
            thumbnail: None,
            error: Some(ThumbnailErrorInfo { code, message: message.into() }),
            original_width: 0,
            original_height: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.thumbnail.is_some()
    }
}

/// A set of requests that share a single completion callback, invoked once
/// every ID in the batch has reached a terminal state (delivered or
/// cancelled). Supplemented from `thumbnail_request.hpp`'s `ThumbnailBatch`.
pub struct ThumbnailBatch<F>
where
    F: FnMut() + Send + 'static,
{
    pub requests: Vec<ThumbnailRequest>,
    pub batch_callback: F,
}
