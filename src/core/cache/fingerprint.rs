//! Cache key derivation, mirroring `commands/thumbnails.rs`'s `cache_key()`
//! blake3 hashing but widened to cover the fields §4.2 requires.

/// Filesystem facts about the source that back the freshness check. For
/// archive entries this is the *archive's* stat, not the entry's, per the
/// distilled spec's explicit resolution (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStat {
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
    pub size: u64,
}

/// `blake3(source_identifier, stored_thumbnail_size, source_mtime, source_size)`.
/// Returned as a lowercase hex string, suitable as a filename-safe cache key.
pub fn fingerprint(identifier: &str, stored_size: u32, stat: SourceStat) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(identifier.as_bytes());
    hasher.update(&stored_size.to_le_bytes());
    hasher.update(&stat.mtime_secs.to_le_bytes());
    hasher.update(&stat.mtime_nanos.to_le_bytes());
    hasher.update(&stat.size.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_changes_with_any_input() {
        let stat = SourceStat { mtime_secs: 100, mtime_nanos: 0, size: 1024 };
        let base = fingerprint("a.png", 128, stat);

        assert_ne!(base, fingerprint("b.png", 128, stat));
        assert_ne!(base, fingerprint("a.png", 256, stat));
        assert_ne!(
            base,
            fingerprint("a.png", 128, SourceStat { mtime_secs: 101, ..stat })
        );
        assert_ne!(
            base,
            fingerprint("a.png", 128, SourceStat { size: 2048, ..stat })
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let stat = SourceStat { mtime_secs: 5, mtime_nanos: 7, size: 99 };
        assert_eq!(fingerprint("x", 64, stat), fingerprint("x", 64, stat));
    }
}
