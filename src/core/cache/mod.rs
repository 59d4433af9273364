//! Two-tier thumbnail cache: an in-memory LRU in front of a `rusqlite`-backed
//! compressed blob store, mirroring the teacher's `db.rs` single-connection
//! schema-migration style and `commands/thumbnails.rs`'s hot/cold split.

pub mod error;
pub mod fingerprint;

pub use error::{CacheError, CacheErrorCode};
pub use fingerprint::{fingerprint, SourceStat};

use crate::core::thumbnail::request::{DecodedImage, PixelFormat};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub database_path: PathBuf,
    pub memory_cache_size: usize,
    pub max_entries: u64,
    pub max_size_bytes: u64,
    pub compression_level: i32,
    pub retention_enabled: bool,
    pub retention_days: u32,
}

impl CacheConfig {
    pub fn with_database_path(database_path: PathBuf) -> Self {
        Self {
            database_path,
            ..Self::default_values()
        }
    }

    fn default_values() -> Self {
        Self {
            database_path: default_database_path(),
            memory_cache_size: 256,
            max_entries: 20_000,
            max_size_bytes: 500 * 1024 * 1024,
            compression_level: 6,
            retention_enabled: false,
            retention_days: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::default_values()
    }
}

fn default_database_path() -> PathBuf {
    dirs_next::cache_dir()
        .or_else(dirs_next::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("nive")
        .join("thumbnail-cache.sqlite3")
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub tier1_entries: usize,
    pub tier2_entries: u64,
    pub total_size_bytes: u64,
}

struct Tier1Entry {
    image: DecodedImage,
    original_width: u32,
    original_height: u32,
}

struct Tier1 {
    map: HashMap<String, Tier1Entry>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Tier1 {
    fn new(capacity: usize) -> Self {
        Self { map: HashMap::new(), order: VecDeque::new(), capacity }
    }

    fn get(&mut self, key: &str) -> Option<(DecodedImage, u32, u32)> {
        if let Some(entry) = self.map.get(key) {
            let value = (entry.image.clone(), entry.original_width, entry.original_height);
            self.touch(key);
            Some(value)
        } else {
            None
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    fn put(&mut self, key: String, image: DecodedImage, original_width: u32, original_height: u32) {
        self.map.insert(key.clone(), Tier1Entry { image, original_width, original_height });
        self.touch(&key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.map.remove(key);
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

/// `CacheStore` guards both tiers behind a single mutex: `rusqlite`'s
/// `Connection` is not `Sync`, so it rides along with the tier-1 state rather
/// than being pooled, matching the teacher's single-connection `db.rs`.
pub struct CacheStore {
    config: CacheConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    tier1: Tier1,
    conn: Connection,
}

impl CacheStore {
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&config.database_path)?;
        ensure_schema(&conn)?;
        let tier1 = Tier1::new(config.memory_cache_size);
        Ok(Self { config, inner: Mutex::new(Inner { tier1, conn }) })
    }

    pub fn get_thumbnail(
        &self,
        identifier: &str,
        stat: SourceStat,
        target_size: u32,
    ) -> Result<Option<(DecodedImage, u32, u32)>, CacheError> {
        let mut inner = self.inner.lock().unwrap();

        // Tier-1 is keyed by (identifier, stat, target_size) rather than the
        // full fingerprint, since the fingerprint also folds in the stored
        // thumbnail size, which isn't known until tier-2 is consulted.
        let lookup_key = tier1_lookup_key(identifier, stat, target_size);
        if let Some(hit) = inner.tier1.get(&lookup_key) {
            return Ok(Some(hit));
        }

        // Only a row whose longest side fits within target_size can satisfy
        // the request without violating the caller's size bound; among those,
        // prefer the largest (best quality), then the most recently used.
        let row: Option<(String, u32, u32, u32, u32, u32, Vec<u8>)> = inner
            .conn
            .query_row(
                "SELECT key, width, height, pixel_format, original_width, original_height, blob \
                 FROM cache_entries WHERE identifier = ?1 AND mtime_secs = ?2 AND mtime_nanos = ?3 AND source_size = ?4 \
                 AND MAX(width, height) <= ?5 \
                 ORDER BY MAX(width, height) DESC, last_access DESC LIMIT 1",
                params![identifier, stat.mtime_secs, stat.mtime_nanos, stat.size as i64, target_size],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((key, width, height, pixel_format_raw, original_width, original_height, blob)) = row else {
            return Ok(None);
        };

        let pixel_bytes = if self.config.compression_level > 0 {
            zstd::stream::decode_all(blob.as_slice())
                .map_err(|e| CacheError::from_external_message(format!("zstd decode failed: {e}")))?
        } else {
            blob
        };
        let pixel_format = pixel_format_from_code(pixel_format_raw)?;
        let stride = stride_for(width, pixel_format);
        let image = DecodedImage { width, height, pixel_format, stride, pixel_bytes };

        inner
            .conn
            .execute(
                "UPDATE cache_entries SET last_access = ?1 WHERE key = ?2",
                params![now_unix(), key],
            )
            .ok();

        inner.tier1.put(lookup_key, image.clone(), original_width, original_height);
        Ok(Some((image, original_width, original_height)))
    }

    pub fn put_thumbnail(
        &self,
        identifier: &str,
        stat: SourceStat,
        target_size: u32,
        thumbnail: &DecodedImage,
        original_width: u32,
        original_height: u32,
    ) -> Result<(), CacheError> {
        let key = fingerprint(identifier, thumbnail.pixel_bytes.len() as u32, stat);
        let blob = if self.config.compression_level > 0 {
            zstd::stream::encode_all(thumbnail.pixel_bytes.as_slice(), self.config.compression_level)
                .map_err(|e| CacheError::from_external_message(format!("zstd encode failed: {e}")))?
        } else {
            thumbnail.pixel_bytes.clone()
        };

        let mut inner = self.inner.lock().unwrap();
        let tx = inner.conn.transaction()?;
        tx.execute(
            "INSERT INTO cache_entries \
             (key, identifier, mtime_secs, mtime_nanos, source_size, width, height, pixel_format, \
              original_width, original_height, blob_size, blob, last_access) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT(key) DO UPDATE SET last_access = excluded.last_access",
            params![
                key,
                identifier,
                stat.mtime_secs,
                stat.mtime_nanos,
                stat.size as i64,
                thumbnail.width,
                thumbnail.height,
                pixel_format_code(thumbnail.pixel_format),
                original_width,
                original_height,
                blob.len() as i64,
                blob,
                now_unix(),
            ],
        )?;
        tx.commit()?;

        inner.tier1.put(
            tier1_lookup_key(identifier, stat, target_size),
            thumbnail.clone(),
            original_width,
            original_height,
        );
        drop(inner);
        self.evict_if_over_budget()?;
        Ok(())
    }

    fn evict_if_over_budget(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let (count, total_size): (u64, i64) = inner.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(blob_size), 0) FROM cache_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            if count <= self.config.max_entries && (total_size as u64) <= self.config.max_size_bytes {
                break;
            }
            let victim: Option<String> = inner
                .conn
                .query_row(
                    "SELECT key FROM cache_entries ORDER BY last_access ASC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(victim) = victim else { break };
            inner.conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![victim])?;
            inner.tier1.remove(&victim);
            debug!(key = %victim, "evicted cache entry over budget");
        }
        Ok(())
    }

    /// Remove entries whose `last_access` predates `retention_days` ago. The
    /// cutoff is captured once up front so entries touched mid-sweep by a
    /// concurrent `get_thumbnail`/`put_thumbnail` are retained unconditionally.
    pub fn run_retention_sweep(&self) -> Result<u64, CacheError> {
        if !self.config.retention_enabled {
            return Ok(0);
        }
        let cutoff = now_unix() - (self.config.retention_days as i64) * 86_400;
        let mut inner = self.inner.lock().unwrap();
        let removed = inner
            .conn
            .execute("DELETE FROM cache_entries WHERE last_access < ?1", params![cutoff])?;
        if removed > 0 {
            inner.tier1.clear();
            warn!(removed, "retention sweep removed stale cache entries");
        }
        Ok(removed as u64)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().unwrap();
        inner.conn.execute("DELETE FROM cache_entries", [])?;
        inner.tier1.clear();
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let inner = self.inner.lock().unwrap();
        let (count, total): (u64, i64) = inner.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(blob_size), 0) FROM cache_entries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CacheStats {
            tier1_entries: inner.tier1.map.len(),
            tier2_entries: count,
            total_size_bytes: total as u64,
        })
    }

    pub fn vacuum(&self) -> Result<(), CacheError> {
        let inner = self.inner.lock().unwrap();
        inner.conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

fn ensure_schema(conn: &Connection) -> Result<(), CacheError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            identifier TEXT NOT NULL,
            mtime_secs INTEGER NOT NULL,
            mtime_nanos INTEGER NOT NULL,
            source_size INTEGER NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            pixel_format INTEGER NOT NULL,
            original_width INTEGER NOT NULL,
            original_height INTEGER NOT NULL,
            blob_size INTEGER NOT NULL,
            blob BLOB NOT NULL,
            last_access INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cache_entries_identifier ON cache_entries(identifier);
        CREATE INDEX IF NOT EXISTS idx_cache_entries_last_access ON cache_entries(last_access);",
    )?;
    Ok(())
}

/// Tier-1 is keyed on the inputs known before the fingerprint's stored-size
/// component is resolved via a tier-2 lookup: identifier + source stat +
/// the requested target size (distinct target sizes never share an entry).
fn tier1_lookup_key(identifier: &str, stat: SourceStat, target_size: u32) -> String {
    format!("{identifier}|{}|{}|{}|{target_size}", stat.mtime_secs, stat.mtime_nanos, stat.size)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn pixel_format_code(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Bgra32 => 0,
        PixelFormat::Rgba32 => 1,
        PixelFormat::Bgr24 => 2,
        PixelFormat::Rgb24 => 3,
        PixelFormat::Gray8 => 4,
        PixelFormat::Gray16 => 5,
    }
}

fn pixel_format_from_code(code: u32) -> Result<PixelFormat, CacheError> {
    Ok(match code {
        0 => PixelFormat::Bgra32,
        1 => PixelFormat::Rgba32,
        2 => PixelFormat::Bgr24,
        3 => PixelFormat::Rgb24,
        4 => PixelFormat::Gray8,
        5 => PixelFormat::Gray16,
        other => {
            return Err(CacheError::new(
                CacheErrorCode::CorruptedEntry,
                format!("unknown pixel format code {other}"),
            ))
        }
    })
}

fn stride_for(width: u32, format: PixelFormat) -> u32 {
    let bpp = match format {
        PixelFormat::Bgra32 | PixelFormat::Rgba32 => 4,
        PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
        PixelFormat::Gray16 => 2,
        PixelFormat::Gray8 => 1,
    };
    let raw = width * bpp;
    (raw + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            database_path: std::env::temp_dir().join(format!(
                "nive-cache-test-{}.sqlite3",
                crate::core::archive::temp_suffix()
            )),
            memory_cache_size: 2,
            max_entries: 2,
            max_size_bytes: 1_000_000,
            compression_level: 3,
            retention_enabled: false,
            retention_days: 30,
        }
    }

    fn sample_image() -> DecodedImage {
        DecodedImage {
            width: 4,
            height: 4,
            pixel_format: PixelFormat::Rgba32,
            stride: 16,
            pixel_bytes: vec![1u8; 16 * 4],
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = CacheStore::open(test_config()).unwrap();
        let stat = SourceStat { mtime_secs: 1, mtime_nanos: 0, size: 10 };
        let image = sample_image();
        store.put_thumbnail("id-a", stat, 4, &image, 100, 100).unwrap();
        let (got, ow, oh) = store.get_thumbnail("id-a", stat, 4).unwrap().unwrap();
        assert_eq!(got.pixel_bytes, image.pixel_bytes);
        assert_eq!((ow, oh), (100, 100));
        let _ = std::fs::remove_file(&store.config.database_path);
    }

    #[test]
    fn eviction_enforces_max_entries() {
        let store = CacheStore::open(test_config()).unwrap();
        for i in 0..5u8 {
            let stat = SourceStat { mtime_secs: i as i64, mtime_nanos: 0, size: 10 };
            store.put_thumbnail(&format!("id-{i}"), stat, 4, &sample_image(), 10, 10).unwrap();
        }
        let stats = store.stats().unwrap();
        assert!(stats.tier2_entries <= 2);
        let _ = std::fs::remove_file(&store.config.database_path);
    }

    #[test]
    fn distinct_target_sizes_never_cross_contaminate() {
        let store = CacheStore::open(test_config()).unwrap();
        let stat = SourceStat { mtime_secs: 1, mtime_nanos: 0, size: 10 };

        let small = DecodedImage {
            width: 4,
            height: 4,
            pixel_format: PixelFormat::Rgba32,
            stride: 16,
            pixel_bytes: vec![1u8; 16 * 4],
        };
        let large = DecodedImage {
            width: 16,
            height: 16,
            pixel_format: PixelFormat::Rgba32,
            stride: 64,
            pixel_bytes: vec![2u8; 64 * 16],
        };

        store.put_thumbnail("id-a", stat, 4, &small, 100, 100).unwrap();
        store.put_thumbnail("id-a", stat, 16, &large, 100, 100).unwrap();

        let (got_small, ..) = store.get_thumbnail("id-a", stat, 4).unwrap().unwrap();
        assert_eq!(got_small.width, 4);
        assert_eq!(got_small.pixel_bytes, small.pixel_bytes);

        let (got_large, ..) = store.get_thumbnail("id-a", stat, 16).unwrap().unwrap();
        assert_eq!(got_large.width, 16);
        assert_eq!(got_large.pixel_bytes, large.pixel_bytes);

        let _ = std::fs::remove_file(&store.config.database_path);
    }
}
