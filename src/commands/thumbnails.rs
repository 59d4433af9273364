//! Thumbnail generation commands (C5): requests are fire-and-forget from the
//! frontend's perspective, results land on the `thumbnail-ready` event.

use std::sync::Arc;

use tauri::{AppHandle, Emitter, State};

use crate::core::thumbnail::{GeneratorStats, Priority, RequestId, ThumbnailGenerator, ThumbnailSource};

/// Managed Tauri state exposing the pipeline core to command handlers.
pub struct PipelineState {
    pub generator: Arc<ThumbnailGenerator>,
    pub archives: Arc<crate::core::archive::ArchiveManager>,
    pub cache: Arc<crate::core::cache::CacheStore>,
}

#[tauri::command]
pub fn request_thumbnail(
    app: AppHandle,
    state: State<'_, PipelineState>,
    path: String,
    target_size: u32,
    priority: Priority,
) -> RequestId {
    let generator = state.generator.clone();
    generator.request(
        ThumbnailSource::File(path),
        priority,
        target_size,
        Arc::new(move |result| {
            let _ = app.emit("thumbnail-ready", &result);
        }),
    )
}

#[tauri::command]
pub fn cancel_thumbnail(state: State<'_, PipelineState>, id: RequestId) -> bool {
    state.generator.cancel(id)
}

#[tauri::command]
pub fn cancel_thumbnails_for_path(state: State<'_, PipelineState>, path: String) -> usize {
    state.generator.cancel_by_path(&path)
}

#[tauri::command]
pub fn thumbnail_stats(state: State<'_, PipelineState>) -> GeneratorStats {
    state.generator.stats()
}
