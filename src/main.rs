#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use browsey_core::commands::{
    archive_extract_to_file, archive_info, archive_list_entries, cache_clear, cache_stats,
    cache_vacuum, cancel_thumbnail, cancel_thumbnails_for_path, request_thumbnail, thumbnail_stats,
    PipelineState,
};
use browsey_core::config::CoreConfig;
use browsey_core::core::archive::ArchiveManager;
use browsey_core::core::cache::CacheStore;
use browsey_core::core::thumbnail::ThumbnailGenerator;
use browsey_core::logging;
use tauri::Manager;

fn main() {
    let log_dir = logging::default_log_dir();
    if let Err(e) = logging::init_logging(&log_dir, "browsey.log") {
        eprintln!("failed to initialize logging: {e}");
    }

    let config = CoreConfig::load_or_default(&CoreConfig::default_config_path());

    let cache = CacheStore::open(config.cache.clone().into())
        .map(Arc::new)
        .expect("failed to open thumbnail cache");

    let archives = Arc::new(ArchiveManager::new(config.archive.clone().into()));

    let generator = Arc::new(ThumbnailGenerator::new(config.generator.clone().into()));
    generator.set_cache(Some(cache.clone()));
    generator.start();

    let state = PipelineState { generator, archives, cache };

    tauri::Builder::default()
        .plugin(tauri_plugin_drag::init())
        .manage(state)
        .on_window_event(|window, event| {
            if matches!(event, tauri::WindowEvent::CloseRequested { .. } | tauri::WindowEvent::Destroyed) {
                let state = window.app_handle().state::<PipelineState>();
                state.generator.stop();
                state.archives.evict_all();
            }
        })
        .invoke_handler(tauri::generate_handler![
            request_thumbnail,
            cancel_thumbnail,
            cancel_thumbnails_for_path,
            thumbnail_stats,
            archive_info,
            archive_list_entries,
            archive_extract_to_file,
            cache_stats,
            cache_clear,
            cache_vacuum,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|_app_handle, _event| {});
}
