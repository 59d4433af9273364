//! Archive entry/info data model, supplemented from the legacy `ArchiveEntry`
//! and `ArchiveInfo` shapes (archive_entry.hpp) plus format detection.

use std::path::Path;

use serde::Serialize;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "tga", "tiff", "tif", "webp", "hdr", "dds", "pnm",
    "avif",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveFormat {
    Unknown,
    Zip,
    SevenZip,
    Rar,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    TarZst,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl ArchiveFormat {
    /// Magic-byte detection, tried before the extension fallback.
    pub fn detect_from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            return Some(ArchiveFormat::Zip);
        }
        if bytes.starts_with(b"7z\xBC\xAF\x27\x1C") {
            return Some(ArchiveFormat::SevenZip);
        }
        if bytes.starts_with(b"Rar!\x1A\x07") {
            return Some(ArchiveFormat::Rar);
        }
        if bytes.starts_with(&[0x1F, 0x8B]) {
            return Some(ArchiveFormat::Gzip);
        }
        if bytes.starts_with(b"BZh") {
            return Some(ArchiveFormat::Bzip2);
        }
        if bytes.starts_with(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]) {
            return Some(ArchiveFormat::Xz);
        }
        if bytes.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            return Some(ArchiveFormat::Zstd);
        }
        if bytes.len() >= 262 && &bytes[257..262] == b"ustar" {
            return Some(ArchiveFormat::Tar);
        }
        None
    }

    pub fn detect_from_extension(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveFormat::TarGz
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            ArchiveFormat::TarBz2
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            ArchiveFormat::TarXz
        } else if name.ends_with(".tar.zst") {
            ArchiveFormat::TarZst
        } else if name.ends_with(".tar") {
            ArchiveFormat::Tar
        } else {
            match path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase().as_str() {
                "zip" | "cbz" => ArchiveFormat::Zip,
                "7z" => ArchiveFormat::SevenZip,
                "rar" | "cbr" => ArchiveFormat::Rar,
                "gz" => ArchiveFormat::Gzip,
                "bz2" => ArchiveFormat::Bzip2,
                "xz" => ArchiveFormat::Xz,
                "zst" | "zstd" => ArchiveFormat::Zstd,
                _ => ArchiveFormat::Unknown,
            }
        }
    }

    pub fn is_supported_archive(self) -> bool {
        self != ArchiveFormat::Unknown
    }

    /// True for formats that hold a single compressed stream rather than a
    /// directory of named entries (plain gzip/bzip2/xz/zstd).
    pub fn is_single_stream(self) -> bool {
        matches!(
            self,
            ArchiveFormat::Gzip | ArchiveFormat::Bzip2 | ArchiveFormat::Xz | ArchiveFormat::Zstd
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub is_encrypted: bool,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub modified_time: Option<u64>,
    pub crc32: Option<u32>,
    pub attributes: u32,
}

impl ArchiveEntry {
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rfind('/').map(|pos| &self.path[..pos])
    }

    pub fn extension(&self) -> &str {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 => &self.name[pos + 1..],
            _ => "",
        }
    }

    pub fn is_image(&self) -> bool {
        let ext = self.extension().to_ascii_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    }

    /// Fraction of space saved by compression, not the fraction retained.
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_size == 0 {
            return 0.0;
        }
        1.0 - (self.compressed_size as f64 / self.uncompressed_size as f64)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveInfo {
    pub path: String,
    pub format: ArchiveFormat,
    pub is_encrypted: bool,
    pub is_solid: bool,
    pub is_multi_volume: bool,
    pub total_compressed_size: u64,
    pub total_uncompressed_size: u64,
    pub file_count: usize,
    pub directory_count: usize,
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveInfo {
    pub fn total_entries(&self) -> usize {
        self.entries.len()
    }

    /// Fraction of space saved by compression, not the fraction retained.
    pub fn compression_ratio(&self) -> f64 {
        if self.total_uncompressed_size == 0 {
            return 0.0;
        }
        1.0 - (self.total_compressed_size as f64 / self.total_uncompressed_size as f64)
    }

    pub fn find_entry(&self, path: &str) -> Option<&ArchiveEntry> {
        let normalized = path.replace('\\', "/");
        self.entries.iter().find(|e| e.path == normalized)
    }

    pub fn entries_in_directory<'a>(&'a self, dir: &str) -> Vec<&'a ArchiveEntry> {
        let dir = dir.trim_end_matches('/');
        self.entries
            .iter()
            .filter(|e| e.parent_path().unwrap_or("") == dir)
            .collect()
    }

    pub fn image_entries(&self) -> Vec<&ArchiveEntry> {
        self.entries.iter().filter(|e| !e.is_directory && e.is_image()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_zip_magic() {
        let bytes = b"PK\x03\x04rest of file";
        assert_eq!(ArchiveFormat::detect_from_magic(bytes), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detects_extension_for_tar_family() {
        assert_eq!(
            ArchiveFormat::detect_from_extension(Path::new("a.tar.gz")),
            ArchiveFormat::TarGz
        );
        assert_eq!(
            ArchiveFormat::detect_from_extension(Path::new("a.tgz")),
            ArchiveFormat::TarGz
        );
        assert_eq!(
            ArchiveFormat::detect_from_extension(Path::new("a.cbz")),
            ArchiveFormat::Zip
        );
    }

    #[test]
    fn archive_info_invariant_file_plus_dir_equals_entries() {
        let info = ArchiveInfo {
            path: "a.zip".into(),
            format: ArchiveFormat::Zip,
            is_encrypted: false,
            is_solid: false,
            is_multi_volume: false,
            total_compressed_size: 10,
            total_uncompressed_size: 20,
            file_count: 1,
            directory_count: 1,
            entries: vec![
                ArchiveEntry {
                    path: "a".into(),
                    name: "a".into(),
                    is_directory: true,
                    is_encrypted: false,
                    compressed_size: 0,
                    uncompressed_size: 0,
                    modified_time: None,
                    crc32: None,
                    attributes: 0,
                },
                ArchiveEntry {
                    path: "a/pic.png".into(),
                    name: "pic.png".into(),
                    is_directory: false,
                    is_encrypted: false,
                    compressed_size: 10,
                    uncompressed_size: 20,
                    modified_time: None,
                    crc32: Some(1),
                    attributes: 0,
                },
            ],
        };
        assert_eq!(info.file_count + info.directory_count, info.total_entries());
        assert_eq!(info.image_entries().len(), 1);
        assert_eq!(info.find_entry("a/pic.png").unwrap().name, "pic.png");
        assert_eq!(info.entries_in_directory("a").len(), 1);
    }
}
