//! Plain-struct configuration, loaded from and persisted to a JSON file on
//! disk, in the style of the teacher's `db.rs` settings persistence.

use crate::core::archive::ArchiveManagerConfig;
use crate::core::cache::CacheConfig;
use crate::core::thumbnail::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serializable mirror of `CacheConfig`; `ArchiveManagerConfig`'s password
/// callback is inherently non-serializable and is configured in code instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub database_path: PathBuf,
    pub memory_cache_size: usize,
    pub max_entries: u64,
    pub max_size_bytes: u64,
    pub compression_level: i32,
    pub retention_enabled: bool,
    pub retention_days: u32,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(c: &CacheConfig) -> Self {
        Self {
            database_path: c.database_path.clone(),
            memory_cache_size: c.memory_cache_size,
            max_entries: c.max_entries,
            max_size_bytes: c.max_size_bytes,
            compression_level: c.compression_level,
            retention_enabled: c.retention_enabled,
            retention_days: c.retention_days,
        }
    }
}

impl From<CacheSettings> for CacheConfig {
    fn from(s: CacheSettings) -> Self {
        Self {
            database_path: s.database_path,
            memory_cache_size: s.memory_cache_size,
            max_entries: s.max_entries,
            max_size_bytes: s.max_size_bytes,
            compression_level: s.compression_level,
            retention_enabled: s.retention_enabled,
            retention_days: s.retention_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub worker_count: usize,
    pub default_thumbnail_size: u32,
    pub max_queue_size: Option<usize>,
}

impl From<&GeneratorConfig> for GeneratorSettings {
    fn from(c: &GeneratorConfig) -> Self {
        Self {
            worker_count: c.worker_count,
            default_thumbnail_size: c.default_thumbnail_size,
            max_queue_size: c.max_queue_size,
        }
    }
}

impl From<GeneratorSettings> for GeneratorConfig {
    fn from(s: GeneratorSettings) -> Self {
        Self {
            worker_count: s.worker_count,
            default_thumbnail_size: s.default_thumbnail_size,
            max_queue_size: s.max_queue_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    pub max_cached_archives: usize,
    pub temp_dir: PathBuf,
}

impl From<&ArchiveManagerConfig> for ArchiveSettings {
    fn from(c: &ArchiveManagerConfig) -> Self {
        Self { max_cached_archives: c.max_cached_archives, temp_dir: c.temp_dir.clone() }
    }
}

impl From<ArchiveSettings> for ArchiveManagerConfig {
    fn from(s: ArchiveSettings) -> Self {
        Self {
            max_cached_archives: s.max_cached_archives,
            temp_dir: s.temp_dir,
            ..ArchiveManagerConfig::default()
        }
    }
}

/// Top-level settings document persisted as JSON. The archive pool's
/// password callback is not part of this struct; the embedding application
/// supplies it in code after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub cache: CacheSettings,
    pub generator: GeneratorSettings,
    pub archive: ArchiveSettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::from(&CacheConfig::default()),
            generator: GeneratorSettings::from(&GeneratorConfig::default()),
            archive: ArchiveSettings::from(&ArchiveManagerConfig::default()),
        }
    }
}

impl CoreConfig {
    pub fn load_from(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, bytes)
    }

    /// Loads `path` if present, otherwise returns defaults (never errors on
    /// a missing config file, mirroring the teacher's settings fallbacks).
    pub fn load_or_default(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_default()
    }

    pub fn default_config_path() -> PathBuf {
        dirs_next::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("nive")
            .join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = CoreConfig::default();
        let path = std::env::temp_dir().join(format!(
            "nive-config-test-{}.json",
            crate::core::archive::temp_suffix()
        ));
        config.save_to(&path).unwrap();
        let loaded = CoreConfig::load_from(&path).unwrap();
        assert_eq!(loaded.cache.max_entries, config.cache.max_entries);
        assert_eq!(loaded.generator.worker_count, config.generator.worker_count);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_or_default_survives_missing_file() {
        let missing = Path::new("/nonexistent/nive-config-missing.json");
        let config = CoreConfig::load_or_default(missing);
        assert_eq!(config.cache.compression_level, CacheConfig::default().compression_level);
    }
}
