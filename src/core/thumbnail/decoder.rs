//! Decode pipeline: a pluggable `ImageDecoder` trait plus the built-in
//! `image`-crate decoder with a scaled-JPEG fast path, grounded on the
//! teacher's `decode_with_timeout`/`CancelableReader`/`MAX_SOURCE_DIM` in
//! `commands/thumbnails.rs`.

use super::error::{ThumbnailError, ThumbnailErrorCode};
use super::request::{DecodedImage, PixelFormat};
use image::{DynamicImage, ImageReader};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on decoded source dimensions, rejecting a crafted file before
/// it can request an unbounded pixel-buffer allocation.
pub const MAX_SOURCE_DIM: u32 = 20_000;

/// Worst-case wall time budget for a single decode before it's abandoned.
pub const DECODE_TIMEOUT: Duration = Duration::from_millis(750);

/// Wraps a `Read`/`Seek` source and checks a shared cancel flag before every
/// I/O call, letting a watchdog thread abort a stuck decode cooperatively.
pub struct CancelableReader<R> {
    inner: R,
    cancelled: Arc<AtomicBool>,
}

impl<R> CancelableReader<R> {
    pub fn new(inner: R, cancelled: Arc<AtomicBool>) -> Self {
        Self { inner, cancelled }
    }

    fn check(&self) -> io::Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(io::Error::new(io::ErrorKind::Interrupted, "decode cancelled"))
        } else {
            Ok(())
        }
    }
}

impl<R: Read> Read for CancelableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for CancelableReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check()?;
        self.inner.seek(pos)
    }
}

impl<R: io::BufRead> io::BufRead for CancelableReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.check()?;
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Runs `decode` on a worker thread and waits up to `DECODE_TIMEOUT`,
/// setting `cancelled` so an in-progress `CancelableReader` read aborts
/// promptly if the deadline passes. Mirrors the teacher's
/// `decode_with_timeout`.
pub fn decode_with_timeout<F>(cancelled: Arc<AtomicBool>, decode: F) -> Result<DynamicImage, ThumbnailError>
where
    F: FnOnce() -> Result<DynamicImage, ThumbnailError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = decode();
        let _ = tx.send(result);
    });
    match rx.recv_timeout(DECODE_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancelled.store(true, Ordering::Relaxed);
            Err(ThumbnailError::new(ThumbnailErrorCode::DecodeTimeout, "decode timed out"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ThumbnailError::new(
            ThumbnailErrorCode::InternalError,
            "decode worker thread disappeared without a result",
        )),
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ThumbnailError> {
    if width > MAX_SOURCE_DIM || height > MAX_SOURCE_DIM {
        return Err(ThumbnailError::new(
            ThumbnailErrorCode::SourceTooLarge,
            format!("source dimensions {width}x{height} exceed the {MAX_SOURCE_DIM} limit"),
        ));
    }
    Ok(())
}

/// A source of encoded bytes: either a file path or an in-memory buffer.
pub enum EncodedSource {
    File(std::path::PathBuf),
    Memory(Arc<[u8]>),
}

/// Tries to claim and decode a request; decoders are consulted in
/// registration order and the first claimant handles it.
pub trait ImageDecoder: Send + Sync {
    /// Whether this decoder claims responsibility for `extension` (lowercase,
    /// no leading dot) or the sniffed magic bytes.
    fn supports(&self, extension: &str, magic: &[u8]) -> bool;

    /// Decode (and, where supported, pre-scale towards `target_size`) the
    /// source into a `DynamicImage`.
    fn decode(&self, source: &EncodedSource, target_size: u32) -> Result<DynamicImage, ThumbnailError>;
}

/// Built-in decoder: `jpeg-decoder`'s DCT-scaled fast path for JPEG sources,
/// falling back to the full `image`-crate decode+resize for everything else.
pub struct DefaultImageDecoder;

impl DefaultImageDecoder {
    fn decode_jpeg_scaled(bytes: &[u8], target_size: u32) -> Result<DynamicImage, ThumbnailError> {
        let mut decoder = jpeg_decoder::Decoder::new(bytes);
        decoder.scale(target_size as u16, target_size as u16).map_err(|e| {
            ThumbnailError::from_external_message(format!("jpeg scale request rejected: {e}"))
        })?;
        let pixels = decoder
            .decode()
            .map_err(|e| ThumbnailError::from_external_message(e.to_string()))?;
        let info = decoder
            .info()
            .ok_or_else(|| ThumbnailError::new(ThumbnailErrorCode::CorruptedData, "jpeg decoder produced no info"))?;
        check_dimensions(info.width as u32, info.height as u32)?;
        use jpeg_decoder::PixelFormat as JpegPixelFormat;
        let image = match info.pixel_format {
            JpegPixelFormat::L8 => {
                image::GrayImage::from_raw(info.width as u32, info.height as u32, pixels)
                    .map(DynamicImage::ImageLuma8)
            }
            JpegPixelFormat::RGB24 => {
                image::RgbImage::from_raw(info.width as u32, info.height as u32, pixels)
                    .map(DynamicImage::ImageRgb8)
            }
            _ => None,
        };
        image.ok_or_else(|| ThumbnailError::new(ThumbnailErrorCode::CorruptedData, "jpeg pixel buffer size mismatch"))
    }

    fn decode_full(bytes: &[u8]) -> Result<DynamicImage, ThumbnailError> {
        if bytes.is_empty() {
            return Err(ThumbnailError::new(ThumbnailErrorCode::CorruptedData, "source is empty (0 bytes)"));
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        let reader = CancelableReader::new(BufReader::new(io::Cursor::new(bytes.to_vec())), cancelled.clone());
        let reader = ImageReader::new(reader)
            .with_guessed_format()
            .map_err(ThumbnailError::from)?;
        let (width, height) = reader.into_dimensions().map_err(|e| ThumbnailError::from_external_message(e.to_string()))?;
        check_dimensions(width, height)?;

        let bytes = bytes.to_vec();
        decode_with_timeout(cancelled.clone(), move || {
            let reader = CancelableReader::new(BufReader::new(io::Cursor::new(bytes)), cancelled);
            let reader = ImageReader::new(reader)
                .with_guessed_format()
                .map_err(ThumbnailError::from)?;
            reader.decode().map_err(ThumbnailError::from)
        })
    }
}

impl ImageDecoder for DefaultImageDecoder {
    fn supports(&self, _extension: &str, _magic: &[u8]) -> bool {
        true // the registry falls back to this decoder unconditionally
    }

    fn decode(&self, source: &EncodedSource, target_size: u32) -> Result<DynamicImage, ThumbnailError> {
        let bytes: std::borrow::Cow<'_, [u8]> = match source {
            EncodedSource::File(path) => std::fs::read(path).map_err(ThumbnailError::from)?.into(),
            EncodedSource::Memory(bytes) => bytes.as_ref().into(),
        };

        let is_jpeg = bytes.len() >= 3 && &bytes[0..2] == b"\xFF\xD8";
        if is_jpeg {
            if let Ok(image) = Self::decode_jpeg_scaled(&bytes, target_size) {
                return Ok(image);
            }
        }
        Self::decode_full(&bytes)
    }
}

/// Ordered chain of decoders, first claimant wins; falls back to
/// `DefaultImageDecoder` if nothing else claims the source.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn ImageDecoder>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self { decoders: vec![Box::new(DefaultImageDecoder)] }
    }
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self { decoders: Vec::new() }
    }

    pub fn register(&mut self, decoder: Box<dyn ImageDecoder>) {
        self.decoders.push(decoder);
    }

    pub fn decode(&self, source: &EncodedSource, extension: &str, magic: &[u8], target_size: u32) -> Result<DynamicImage, ThumbnailError> {
        for decoder in &self.decoders {
            if decoder.supports(extension, magic) {
                return decoder.decode(source, target_size);
            }
        }
        DefaultImageDecoder.decode(source, target_size)
    }
}

/// Converts a decoded `DynamicImage` into the crate's `DecodedImage` value,
/// always normalizing to 8-bit RGBA so cache blobs have one stable layout.
pub fn to_decoded_image(image: &DynamicImage) -> DecodedImage {
    let rgba = image.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    let stride = (width * 4 + 3) & !3;
    let mut pixel_bytes = vec![0u8; stride as usize * height as usize];
    for y in 0..height {
        let row_start = (y * stride) as usize;
        let src_start = (y * width * 4) as usize;
        pixel_bytes[row_start..row_start + (width * 4) as usize]
            .copy_from_slice(&rgba.as_raw()[src_start..src_start + (width * 4) as usize]);
    }
    DecodedImage { width, height, pixel_format: PixelFormat::Rgba32, stride, pixel_bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_memory_source_is_corrupted_data_not_unsupported_format() {
        let source = EncodedSource::Memory(Arc::from(Vec::<u8>::new().into_boxed_slice()));
        let err = DefaultImageDecoder.decode(&source, 64).unwrap_err();
        assert_eq!(err.code, ThumbnailErrorCode::CorruptedData);
    }
}
