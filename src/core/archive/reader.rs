//! Per-format archive readers behind a common `ArchiveReader` trait.
//!
//! Grounded on `commands/decompress/zip_format.rs` (entry iteration, safe path
//! handling) and `reynalivan-EMMM2`'s `services/mods/archive/extract.rs`
//! (password-aware zip/7z/rar extraction).

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::entry::{ArchiveEntry, ArchiveFormat, ArchiveInfo};
use super::error::{ArchiveError, ArchiveErrorCode};

/// Returns `true` to continue, `false` to abort the operation with `Cancelled`.
pub type ProgressCallback<'a> = dyn FnMut(u64, u64) -> bool + 'a;

/// `Closed → Open[(has_password)] → Closed`. Operations on a closed reader
/// fail with `InternalError`.
pub trait ArchiveReader: Send {
    fn open(&mut self, path: &Path, password: Option<&str>) -> Result<(), ArchiveError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn info(&mut self) -> Result<ArchiveInfo, ArchiveError>;
    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError>;
    fn extract_to_memory(&mut self, entry_path: &str) -> Result<Vec<u8>, ArchiveError>;
    fn extract_to_file(
        &mut self,
        entry_path: &str,
        dest: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), ArchiveError>;
    fn extract_all(
        &mut self,
        dest_dir: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<usize, ArchiveError>;
    /// Verify every entry's integrity (CRC) without writing extracted bytes
    /// anywhere. Supplemented from `IArchiveReader::test()`.
    fn test(&mut self) -> Result<(), ArchiveError>;
}

fn require_open(open: bool) -> Result<(), ArchiveError> {
    if open {
        Ok(())
    } else {
        Err(ArchiveError::new(ArchiveErrorCode::InternalError, "reader is not open"))
    }
}

fn normalize_entry_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Construct a reader for the detected format of `path`. `path` is sniffed via
/// magic bytes first, falling back to the extension.
pub fn reader_for_path(path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
    let format = detect_format(path)?;
    reader_for_format(format)
}

pub fn detect_format(path: &Path) -> Result<ArchiveFormat, ArchiveError> {
    let mut header = [0u8; 512];
    let n = File::open(path)
        .and_then(|mut f| f.read(&mut header))
        .map_err(ArchiveError::from)?;
    if let Some(format) = ArchiveFormat::detect_from_magic(&header[..n]) {
        return Ok(format);
    }
    let by_ext = ArchiveFormat::detect_from_extension(path);
    if by_ext.is_supported_archive() {
        Ok(by_ext)
    } else {
        Err(ArchiveError::new(
            ArchiveErrorCode::UnsupportedFormat,
            format!("unrecognized archive format: {}", path.display()),
        ))
    }
}

pub fn reader_for_format(format: ArchiveFormat) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
    match format {
        ArchiveFormat::Zip => Ok(Box::new(ZipReader::default())),
        ArchiveFormat::SevenZip => Ok(Box::new(SevenZipReader::default())),
        ArchiveFormat::Rar => Ok(Box::new(RarReader::default())),
        ArchiveFormat::Tar
        | ArchiveFormat::TarGz
        | ArchiveFormat::TarBz2
        | ArchiveFormat::TarXz
        | ArchiveFormat::TarZst => Ok(Box::new(TarReader::new(format))),
        ArchiveFormat::Gzip | ArchiveFormat::Bzip2 | ArchiveFormat::Xz | ArchiveFormat::Zstd => {
            Ok(Box::new(SingleStreamReader::new(format)))
        }
        ArchiveFormat::Unknown => Err(ArchiveError::new(
            ArchiveErrorCode::UnsupportedFormat,
            "unsupported archive format",
        )),
    }
}

// ---------------------------------------------------------------- Zip -----

#[derive(Default)]
pub struct ZipReader {
    path: Option<PathBuf>,
    password: Option<String>,
    archive: Option<zip::ZipArchive<File>>,
}

impl ZipReader {
    fn entry_bytes(&mut self, index: usize) -> Result<(String, bool, Vec<u8>), ArchiveError> {
        let archive = self.archive.as_mut().expect("checked by require_open");
        let mut file = match &self.password {
            Some(pw) => archive
                .by_index_decrypt(index, pw.as_bytes())
                .map_err(|e| ArchiveError::from_external_message(e.to_string()))?,
            None => archive
                .by_index(index)
                .map_err(|e| ArchiveError::from_external_message(e.to_string()))?,
        };
        let name = normalize_entry_path(file.name());
        let is_dir = file.is_dir();
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf).map_err(ArchiveError::from)?;
        Ok((name, is_dir, buf))
    }
}

impl ArchiveReader for ZipReader {
    fn open(&mut self, path: &Path, password: Option<&str>) -> Result<(), ArchiveError> {
        let mut archive = zip::ZipArchive::new(File::open(path).map_err(ArchiveError::from)?)
            .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;

        // Probe the first entry with the candidate password (if any) so a
        // wrong or missing password surfaces here rather than on first use.
        if archive.len() > 0 {
            let probe_pw = password.unwrap_or("");
            if let Err(e) = archive.by_index_decrypt(0, probe_pw.as_bytes()) {
                let err = ArchiveError::from_external_message(e.to_string());
                return Err(if password.is_none() && err.code == ArchiveErrorCode::PasswordRequired {
                    err
                } else if password.is_some() {
                    ArchiveError::new(ArchiveErrorCode::WrongPassword, err.message)
                } else {
                    err
                });
            }
        }

        self.archive = Some(archive);
        self.path = Some(path.to_path_buf());
        self.password = password.map(|s| s.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.archive = None;
        self.path = None;
        self.password = None;
    }

    fn is_open(&self) -> bool {
        self.archive.is_some()
    }

    fn info(&mut self) -> Result<ArchiveInfo, ArchiveError> {
        require_open(self.is_open())?;
        let entries = self.list_entries()?;
        let mut total_compressed = 0u64;
        let mut total_uncompressed = 0u64;
        let mut file_count = 0usize;
        let mut directory_count = 0usize;
        let mut is_encrypted = false;
        for e in &entries {
            total_compressed += e.compressed_size;
            total_uncompressed += e.uncompressed_size;
            if e.is_directory {
                directory_count += 1;
            } else {
                file_count += 1;
            }
            is_encrypted |= e.is_encrypted;
        }
        Ok(ArchiveInfo {
            path: self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            format: ArchiveFormat::Zip,
            is_encrypted,
            is_solid: false,
            is_multi_volume: false,
            total_compressed_size: total_compressed,
            total_uncompressed_size: total_uncompressed,
            file_count,
            directory_count,
            entries,
        })
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        require_open(self.is_open())?;
        let archive = self.archive.as_mut().unwrap();
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;
            let path = normalize_entry_path(file.name());
            let name = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(&path).to_string();
            entries.push(ArchiveEntry {
                is_directory: file.is_dir(),
                is_encrypted: file.encrypted(),
                compressed_size: file.compressed_size(),
                uncompressed_size: file.size(),
                modified_time: None,
                crc32: Some(file.crc32()),
                attributes: file.unix_mode().unwrap_or(0),
                name,
                path,
            });
        }
        Ok(entries)
    }

    fn extract_to_memory(&mut self, entry_path: &str) -> Result<Vec<u8>, ArchiveError> {
        require_open(self.is_open())?;
        let target = normalize_entry_path(entry_path);
        let index = self.find_index(&target)?;
        let (_, is_dir, bytes) = self.entry_bytes(index)?;
        if is_dir {
            return Err(ArchiveError::new(ArchiveErrorCode::NotFound, "entry is a directory"));
        }
        Ok(bytes)
    }

    fn extract_to_file(
        &mut self,
        entry_path: &str,
        dest: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), ArchiveError> {
        let bytes = self.extract_to_memory(entry_path)?;
        if let Some(cb) = progress {
            if !cb(bytes.len() as u64, bytes.len() as u64) {
                return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
            }
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::from)?;
        }
        let mut f = File::create(dest).map_err(ArchiveError::from)?;
        f.write_all(&bytes).map_err(ArchiveError::from)?;
        Ok(())
    }

    fn extract_all(
        &mut self,
        dest_dir: &Path,
        mut progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<usize, ArchiveError> {
        require_open(self.is_open())?;
        let entries = self.list_entries()?;
        let total: u64 = entries.iter().map(|e| e.uncompressed_size).sum();
        let mut done = 0u64;
        let mut count = 0usize;
        for i in 0..entries.len() {
            let (name, is_dir, bytes) = self.entry_bytes(i)?;
            let dest_path = dest_dir.join(&name);
            if is_dir {
                std::fs::create_dir_all(&dest_path).map_err(ArchiveError::from)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent).map_err(ArchiveError::from)?;
            }
            std::fs::write(&dest_path, &bytes).map_err(ArchiveError::from)?;
            done += bytes.len() as u64;
            count += 1;
            if let Some(cb) = progress.as_deref_mut() {
                if !cb(done, total) {
                    return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
                }
            }
        }
        Ok(count)
    }

    fn test(&mut self) -> Result<(), ArchiveError> {
        require_open(self.is_open())?;
        let count = self.archive.as_ref().unwrap().len();
        for i in 0..count {
            self.entry_bytes(i)?;
        }
        Ok(())
    }
}

impl ZipReader {
    fn find_index(&mut self, target: &str) -> Result<usize, ArchiveError> {
        let archive = self.archive.as_mut().unwrap();
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;
            if normalize_entry_path(file.name()) == target {
                return Ok(i);
            }
        }
        Err(ArchiveError::not_found(format!("entry not found: {target}")))
    }
}

// ------------------------------------------------------------- 7-Zip -----

#[derive(Default)]
pub struct SevenZipReader {
    path: Option<PathBuf>,
    password: Option<String>,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveReader for SevenZipReader {
    fn open(&mut self, path: &Path, password: Option<&str>) -> Result<(), ArchiveError> {
        // Mirrors `single_root_in_7z`'s use of `sevenz_rust2::Archive::open`
        // for header/listing access; the 7z header itself is not encrypted
        // even when entry content is, so listing never needs a password.
        let archive = sevenz_rust2::Archive::open(path)
            .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;

        self.entries = archive
            .files
            .iter()
            .filter(|f| !f.is_anti_item)
            .map(|f| ArchiveEntry {
                path: normalize_entry_path(&f.name),
                name: f
                    .name
                    .rsplit(['/', '\\'])
                    .find(|s| !s.is_empty())
                    .unwrap_or(&f.name)
                    .to_string(),
                is_directory: f.is_directory,
                is_encrypted: false,
                compressed_size: 0,
                uncompressed_size: f.size,
                modified_time: None,
                crc32: if f.crc > 0 { Some(f.crc) } else { None },
                attributes: 0,
            })
            .collect();
        self.path = Some(path.to_path_buf());
        self.password = password.map(|s| s.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.path = None;
        self.password = None;
        self.entries.clear();
    }

    fn is_open(&self) -> bool {
        self.path.is_some()
    }

    fn info(&mut self) -> Result<ArchiveInfo, ArchiveError> {
        require_open(self.is_open())?;
        let file_count = self.entries.iter().filter(|e| !e.is_directory).count();
        let directory_count = self.entries.len() - file_count;
        Ok(ArchiveInfo {
            path: self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            format: ArchiveFormat::SevenZip,
            is_encrypted: self.password.is_some(),
            is_solid: true,
            is_multi_volume: false,
            total_compressed_size: 0,
            total_uncompressed_size: self.entries.iter().map(|e| e.uncompressed_size).sum(),
            file_count,
            directory_count,
            entries: self.entries.clone(),
        })
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        require_open(self.is_open())?;
        Ok(self.entries.clone())
    }

    fn extract_to_memory(&mut self, entry_path: &str) -> Result<Vec<u8>, ArchiveError> {
        require_open(self.is_open())?;
        let path = self.path.clone().unwrap();
        let target = normalize_entry_path(entry_path);

        if self.password.is_some() {
            // decompress_file_with_extract_fn has no password variant in this
            // crate; fall back to a full password-aware extraction into a
            // scratch directory and read the single file back out.
            let scratch = std::env::temp_dir().join(format!("nive_7z_scratch_{}", crate::core::archive::temp_suffix()));
            self.extract_all(&scratch, None)?;
            let bytes = std::fs::read(scratch.join(&target)).map_err(ArchiveError::from)?;
            let _ = std::fs::remove_dir_all(&scratch);
            return Ok(bytes);
        }

        let mut out = Vec::new();
        let mut found = false;
        let scratch_dir = std::env::temp_dir();
        sevenz_rust2::decompress_file_with_extract_fn(&path, &scratch_dir, |entry, reader, _dest_path| {
            if normalize_entry_path(&entry.name) == target {
                found = true;
                std::io::copy(reader, &mut out).map(|_| true)
            } else {
                Ok(true)
            }
        })
        .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;
        if !found {
            return Err(ArchiveError::not_found(format!("entry not found: {target}")));
        }
        Ok(out)
    }

    fn extract_to_file(
        &mut self,
        entry_path: &str,
        dest: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), ArchiveError> {
        let bytes = self.extract_to_memory(entry_path)?;
        if let Some(cb) = progress {
            if !cb(bytes.len() as u64, bytes.len() as u64) {
                return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
            }
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::from)?;
        }
        std::fs::write(dest, bytes).map_err(ArchiveError::from)?;
        Ok(())
    }

    fn extract_all(
        &mut self,
        dest_dir: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<usize, ArchiveError> {
        require_open(self.is_open())?;
        let path = self.path.clone().unwrap();
        match self.password.clone() {
            Some(pw) => sevenz_rust2::decompress_file_with_password(&path, dest_dir, pw.into()),
            None => sevenz_rust2::decompress_file(&path, dest_dir),
        }
        .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;
        let count = self.entries.iter().filter(|e| !e.is_directory).count();
        if let Some(cb) = progress {
            cb(count as u64, count as u64);
        }
        Ok(count)
    }

    fn test(&mut self) -> Result<(), ArchiveError> {
        require_open(self.is_open())?;
        for entry in self.entries.clone() {
            if !entry.is_directory {
                self.extract_to_memory(&entry.path)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------- Rar -----

#[derive(Default)]
/// rar-stream's archive listing and entry reads are async; every call here
/// bridges through a current-thread tokio runtime the same way
/// `commands/decompress/rar_format.rs` bridges through `tauri::async_runtime`,
/// since `ArchiveReader` is otherwise synchronous and the core must not pull
/// in tauri itself. Password-protected volumes aren't supported by
/// rar-stream, matching the teacher: only store-mode (uncompressed) entries
/// can be read back.
fn rar_block_on<F: std::future::Future>(fut: F) -> F::Output {
    static RUNTIME: once_cell::sync::Lazy<tokio::runtime::Runtime> = once_cell::sync::Lazy::new(|| {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build rar-stream bridge runtime")
    });
    RUNTIME.block_on(fut)
}

#[derive(Default)]
pub struct RarReader {
    path: Option<PathBuf>,
    password: Option<String>,
    entries: Vec<ArchiveEntry>,
    inner: Vec<rar_stream::InnerFile>,
}

impl RarReader {
    fn parse(path: &Path) -> Result<Vec<rar_stream::InnerFile>, ArchiveError> {
        let path_str = path.to_str().ok_or_else(|| {
            ArchiveError::new(ArchiveErrorCode::InternalError, "rar path contains invalid UTF-8")
        })?;
        let media = std::sync::Arc::new(
            rar_stream::LocalFileMedia::new(path_str)
                .map_err(|e| ArchiveError::from_external_message(e.to_string()))?,
        );
        let package = rar_stream::RarFilesPackage::new(vec![media]);
        rar_block_on(async move {
            package.parse(rar_stream::ParseOptions::default()).await
        })
        .map_err(|e| ArchiveError::from_external_message(e.to_string()))
    }

    fn find_index(&self, entry_path: &str) -> Result<usize, ArchiveError> {
        let target = normalize_entry_path(entry_path);
        self.inner
            .iter()
            .position(|e| normalize_entry_path(&e.name.replace('\\', "/")) == target)
            .ok_or_else(|| ArchiveError::new(ArchiveErrorCode::NotFound, entry_path.to_string()))
    }
}

impl ArchiveReader for RarReader {
    fn open(&mut self, path: &Path, password: Option<&str>) -> Result<(), ArchiveError> {
        let parsed = Self::parse(path)?;
        self.entries = parsed
            .iter()
            .map(|f| {
                let normalized = f.name.replace('\\', "/");
                let is_dir = normalized.ends_with('/');
                ArchiveEntry {
                    path: normalize_entry_path(&normalized),
                    name: normalized.rsplit('/').find(|s| !s.is_empty()).unwrap_or(&normalized).to_string(),
                    is_directory: is_dir,
                    is_encrypted: false,
                    compressed_size: 0,
                    uncompressed_size: f.length,
                    modified_time: None,
                    crc32: None,
                    attributes: 0,
                }
            })
            .collect();
        self.inner = parsed;
        self.path = Some(path.to_path_buf());
        self.password = password.map(|s| s.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.path = None;
        self.password = None;
        self.entries.clear();
        self.inner.clear();
    }

    fn is_open(&self) -> bool {
        self.path.is_some()
    }

    fn info(&mut self) -> Result<ArchiveInfo, ArchiveError> {
        require_open(self.is_open())?;
        Ok(ArchiveInfo {
            path: self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            format: ArchiveFormat::Rar,
            is_encrypted: self.password.is_some(),
            is_solid: false,
            is_multi_volume: false,
            total_compressed_size: 0,
            total_uncompressed_size: self.entries.iter().map(|e| e.uncompressed_size).sum(),
            file_count: self.entries.iter().filter(|e| !e.is_directory).count(),
            directory_count: self.entries.iter().filter(|e| e.is_directory).count(),
            entries: self.entries.clone(),
        })
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        require_open(self.is_open())?;
        Ok(self.entries.clone())
    }

    fn extract_to_memory(&mut self, entry_path: &str) -> Result<Vec<u8>, ArchiveError> {
        require_open(self.is_open())?;
        let idx = self.find_index(entry_path)?;
        let entry = &self.inner[idx];
        if entry.is_compressed() {
            return Err(ArchiveError::new(
                ArchiveErrorCode::UnsupportedFormat,
                format!("rar entry uses unsupported compression: {}", entry.name),
            ));
        }
        let bytes = rar_block_on(
            entry.read_range(rar_stream::ReadInterval { start: 0, end: entry.length.saturating_sub(1) }),
        )
        .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;
        Ok(bytes)
    }

    fn extract_to_file(
        &mut self,
        entry_path: &str,
        dest: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), ArchiveError> {
        require_open(self.is_open())?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::from)?;
        }
        let bytes = self.extract_to_memory(entry_path)?;
        std::fs::write(dest, &bytes).map_err(ArchiveError::from)?;
        if let Some(cb) = progress {
            cb(bytes.len() as u64, bytes.len() as u64);
        }
        Ok(())
    }

    fn extract_all(
        &mut self,
        dest_dir: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<usize, ArchiveError> {
        require_open(self.is_open())?;
        std::fs::create_dir_all(dest_dir).map_err(ArchiveError::from)?;
        let entries = self.entries.clone();
        let mut count = 0usize;
        let total = entries.iter().filter(|e| !e.is_directory).count() as u64;
        for entry in &entries {
            if entry.is_directory {
                std::fs::create_dir_all(dest_dir.join(&entry.path)).map_err(ArchiveError::from)?;
                continue;
            }
            let dest = dest_dir.join(&entry.path);
            self.extract_to_file(&entry.path, &dest, None)?;
            count += 1;
            if let Some(cb) = progress.as_deref_mut() {
                if !cb(count as u64, total) {
                    return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
                }
            }
        }
        Ok(count)
    }

    fn test(&mut self) -> Result<(), ArchiveError> {
        require_open(self.is_open())?;
        for entry in &self.inner {
            if entry.is_compressed() || entry.length == 0 {
                continue;
            }
            rar_block_on(entry.read_range(rar_stream::ReadInterval { start: 0, end: 0 }))
                .map_err(|e| ArchiveError::from_external_message(e.to_string()))?;
        }
        Ok(())
    }
}

// -------------------------------------------------------- Tar family -----

pub struct TarReader {
    format: ArchiveFormat,
    path: Option<PathBuf>,
    entries: Vec<ArchiveEntry>,
}

impl TarReader {
    pub fn new(format: ArchiveFormat) -> Self {
        Self {
            format,
            path: None,
            entries: Vec::new(),
        }
    }

    fn open_decoder(&self) -> Result<Box<dyn Read>, ArchiveError> {
        let path = self.path.as_ref().unwrap();
        let file = File::open(path).map_err(ArchiveError::from)?;
        let reader: Box<dyn Read> = match self.format {
            ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(file)),
            ArchiveFormat::TarBz2 => Box::new(bzip2::read::BzDecoder::new(file)),
            ArchiveFormat::TarXz => Box::new(xz2::read::XzDecoder::new(file)),
            ArchiveFormat::TarZst => Box::new(
                zstd::stream::Decoder::new(file).map_err(ArchiveError::from)?,
            ),
            _ => Box::new(file),
        };
        Ok(reader)
    }
}

impl ArchiveReader for TarReader {
    fn open(&mut self, path: &Path, _password: Option<&str>) -> Result<(), ArchiveError> {
        self.path = Some(path.to_path_buf());
        let reader = self.open_decoder()?;
        let mut archive = tar::Archive::new(reader);
        let mut entries = Vec::new();
        for entry in archive.entries().map_err(ArchiveError::from)? {
            let entry = entry.map_err(ArchiveError::from)?;
            let header = entry.header();
            let path = entry.path().map_err(ArchiveError::from)?.to_string_lossy().into_owned();
            let is_dir = header.entry_type().is_dir();
            entries.push(ArchiveEntry {
                name: path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(&path).to_string(),
                path: normalize_entry_path(&path),
                is_directory: is_dir,
                is_encrypted: false,
                compressed_size: 0,
                uncompressed_size: header.size().unwrap_or(0),
                modified_time: header.mtime().ok(),
                crc32: None,
                attributes: header.mode().unwrap_or(0),
            });
        }
        self.entries = entries;
        Ok(())
    }

    fn close(&mut self) {
        self.path = None;
        self.entries.clear();
    }

    fn is_open(&self) -> bool {
        self.path.is_some()
    }

    fn info(&mut self) -> Result<ArchiveInfo, ArchiveError> {
        require_open(self.is_open())?;
        Ok(ArchiveInfo {
            path: self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            format: self.format,
            is_encrypted: false,
            is_solid: !matches!(self.format, ArchiveFormat::Tar),
            is_multi_volume: false,
            total_compressed_size: 0,
            total_uncompressed_size: self.entries.iter().map(|e| e.uncompressed_size).sum(),
            file_count: self.entries.iter().filter(|e| !e.is_directory).count(),
            directory_count: self.entries.iter().filter(|e| e.is_directory).count(),
            entries: self.entries.clone(),
        })
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        require_open(self.is_open())?;
        Ok(self.entries.clone())
    }

    fn extract_to_memory(&mut self, entry_path: &str) -> Result<Vec<u8>, ArchiveError> {
        require_open(self.is_open())?;
        let target = normalize_entry_path(entry_path);
        let reader = self.open_decoder()?;
        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries().map_err(ArchiveError::from)? {
            let mut entry = entry.map_err(ArchiveError::from)?;
            let path = normalize_entry_path(&entry.path().map_err(ArchiveError::from)?.to_string_lossy());
            if path == target {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).map_err(ArchiveError::from)?;
                return Ok(buf);
            }
        }
        Err(ArchiveError::not_found(format!("entry not found: {target}")))
    }

    fn extract_to_file(
        &mut self,
        entry_path: &str,
        dest: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), ArchiveError> {
        let bytes = self.extract_to_memory(entry_path)?;
        if let Some(cb) = progress {
            if !cb(bytes.len() as u64, bytes.len() as u64) {
                return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
            }
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::from)?;
        }
        std::fs::write(dest, bytes).map_err(ArchiveError::from)?;
        Ok(())
    }

    fn extract_all(
        &mut self,
        dest_dir: &Path,
        mut progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<usize, ArchiveError> {
        require_open(self.is_open())?;
        let reader = self.open_decoder()?;
        let mut archive = tar::Archive::new(reader);
        let total: u64 = self.entries.iter().map(|e| e.uncompressed_size).sum();
        let mut done = 0u64;
        let mut count = 0usize;
        for entry in archive.entries().map_err(ArchiveError::from)? {
            let mut entry = entry.map_err(ArchiveError::from)?;
            let size = entry.header().size().unwrap_or(0);
            entry.unpack_in(dest_dir).map_err(ArchiveError::from)?;
            done += size;
            if !entry.header().entry_type().is_dir() {
                count += 1;
            }
            if let Some(cb) = progress.as_deref_mut() {
                if !cb(done, total) {
                    return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
                }
            }
        }
        Ok(count)
    }

    fn test(&mut self) -> Result<(), ArchiveError> {
        require_open(self.is_open())?;
        let reader = self.open_decoder()?;
        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries().map_err(ArchiveError::from)? {
            let mut entry = entry.map_err(ArchiveError::from)?;
            std::io::copy(&mut entry, &mut std::io::sink()).map_err(ArchiveError::from)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------- Single-stream -----

/// Bare gzip/bzip2/xz/zstd: treated as a single-entry archive whose one entry
/// is named after the archive's stem.
pub struct SingleStreamReader {
    format: ArchiveFormat,
    path: Option<PathBuf>,
}

impl SingleStreamReader {
    pub fn new(format: ArchiveFormat) -> Self {
        Self { format, path: None }
    }

    fn entry_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string())
    }

    fn decode_all(&self) -> Result<Vec<u8>, ArchiveError> {
        let path = self.path.as_ref().unwrap();
        let file = File::open(path).map_err(ArchiveError::from)?;
        let mut reader: Box<dyn Read> = match self.format {
            ArchiveFormat::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
            ArchiveFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
            ArchiveFormat::Xz => Box::new(xz2::read::XzDecoder::new(file)),
            ArchiveFormat::Zstd => Box::new(
                zstd::stream::Decoder::new(file).map_err(ArchiveError::from)?,
            ),
            _ => unreachable!("SingleStreamReader constructed with a non-single-stream format"),
        };
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(ArchiveError::from)?;
        Ok(buf)
    }
}

impl ArchiveReader for SingleStreamReader {
    fn open(&mut self, path: &Path, _password: Option<&str>) -> Result<(), ArchiveError> {
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        self.path = None;
    }

    fn is_open(&self) -> bool {
        self.path.is_some()
    }

    fn info(&mut self) -> Result<ArchiveInfo, ArchiveError> {
        require_open(self.is_open())?;
        let entries = self.list_entries()?;
        Ok(ArchiveInfo {
            path: self.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            format: self.format,
            is_encrypted: false,
            is_solid: true,
            is_multi_volume: false,
            total_compressed_size: 0,
            total_uncompressed_size: entries.iter().map(|e| e.uncompressed_size).sum(),
            file_count: entries.len(),
            directory_count: 0,
            entries,
        })
    }

    fn list_entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        require_open(self.is_open())?;
        let bytes = self.decode_all()?;
        Ok(vec![ArchiveEntry {
            path: self.entry_name(),
            name: self.entry_name(),
            is_directory: false,
            is_encrypted: false,
            compressed_size: 0,
            uncompressed_size: bytes.len() as u64,
            modified_time: None,
            crc32: None,
            attributes: 0,
        }])
    }

    fn extract_to_memory(&mut self, _entry_path: &str) -> Result<Vec<u8>, ArchiveError> {
        require_open(self.is_open())?;
        self.decode_all()
    }

    fn extract_to_file(
        &mut self,
        entry_path: &str,
        dest: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), ArchiveError> {
        let bytes = self.extract_to_memory(entry_path)?;
        if let Some(cb) = progress {
            if !cb(bytes.len() as u64, bytes.len() as u64) {
                return Err(ArchiveError::new(ArchiveErrorCode::Cancelled, "extraction cancelled"));
            }
        }
        std::fs::write(dest, bytes).map_err(ArchiveError::from)?;
        Ok(())
    }

    fn extract_all(
        &mut self,
        dest_dir: &Path,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<usize, ArchiveError> {
        std::fs::create_dir_all(dest_dir).map_err(ArchiveError::from)?;
        let dest = dest_dir.join(self.entry_name());
        self.extract_to_file(&self.entry_name(), &dest, progress)?;
        Ok(1)
    }

    fn test(&mut self) -> Result<(), ArchiveError> {
        require_open(self.is_open())?;
        self.decode_all().map(|_| ())
    }
}
