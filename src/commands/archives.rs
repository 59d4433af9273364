//! Archive inspection/extraction commands (C3), thin wrappers over
//! `ArchiveManager`'s checkout/checkin pool.

use std::path::PathBuf;

use tauri::State;

use crate::core::archive::{ArchiveEntry, ArchiveInfo};
use crate::errors::api_error::ApiResult;
use crate::errors::domain::map_api_result;

use super::thumbnails::PipelineState;

#[tauri::command]
pub fn archive_info(state: State<'_, PipelineState>, path: PathBuf) -> ApiResult<ArchiveInfo> {
    map_api_result(state.archives.info(&path))
}

#[tauri::command]
pub fn archive_list_entries(state: State<'_, PipelineState>, path: PathBuf) -> ApiResult<Vec<ArchiveEntry>> {
    map_api_result(state.archives.list_entries(&path))
}

#[tauri::command]
pub fn archive_extract_to_file(
    state: State<'_, PipelineState>,
    path: PathBuf,
    entry_path: String,
    dest: PathBuf,
) -> ApiResult<()> {
    map_api_result(state.archives.extract_to_file(&path, &entry_path, &dest, None))
}
