//! Cache maintenance commands (C2): stats, clear, and an on-demand vacuum
//! (the same operation `src/bin/cache_vacuum.rs` runs standalone).

use tauri::State;

use crate::core::cache::CacheStats;
use crate::errors::api_error::ApiResult;
use crate::errors::domain::map_api_result;

use super::thumbnails::PipelineState;

#[tauri::command]
pub fn cache_stats(state: State<'_, PipelineState>) -> ApiResult<CacheStats> {
    map_api_result(state.cache.stats())
}

#[tauri::command]
pub fn cache_clear(state: State<'_, PipelineState>) -> ApiResult<()> {
    map_api_result(state.cache.clear())
}

#[tauri::command]
pub fn cache_vacuum(state: State<'_, PipelineState>) -> ApiResult<()> {
    map_api_result(state.cache.vacuum())
}
