//! Standalone cache maintenance CLI: opens the on-disk cache (the default
//! location, or `--path <file>`), runs a retention sweep and `VACUUM`, and
//! prints before/after stats. Doesn't require the `shell` feature — it talks
//! to `browsey_core::core::cache` directly.

use browsey_core::core::cache::{CacheConfig, CacheStore};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut database_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--path" => database_path = args.next().map(std::path::PathBuf::from),
            other => {
                eprintln!("unrecognized argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let mut config = CacheConfig::default();
    if let Some(path) = database_path {
        config.database_path = path;
    }

    let store = match CacheStore::open(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open cache: {e}");
            std::process::exit(1);
        }
    };

    let before = store.stats().unwrap_or_else(|e| {
        eprintln!("failed to read stats: {e}");
        std::process::exit(1);
    });
    println!(
        "before: {} tier1 entries, {} tier2 entries, {} bytes",
        before.tier1_entries, before.tier2_entries, before.total_size_bytes
    );

    let evicted = store.run_retention_sweep().unwrap_or_else(|e| {
        eprintln!("retention sweep failed: {e}");
        std::process::exit(1);
    });
    println!("retention sweep evicted {evicted} stale entries");

    if let Err(e) = store.vacuum() {
        eprintln!("vacuum failed: {e}");
        std::process::exit(1);
    }

    let after = store.stats().unwrap_or_else(|e| {
        eprintln!("failed to read stats: {e}");
        std::process::exit(1);
    });
    println!(
        "after: {} tier1 entries, {} tier2 entries, {} bytes",
        after.tier1_entries, after.tier2_entries, after.total_size_bytes
    );
}
