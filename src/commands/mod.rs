//! Thin Tauri command layer over the pipeline core. Every command here
//! parks request setup (parsing, channel wiring) and hands the actual work
//! to `crate::core`; the `ApiError` conversions are grounded on
//! `errors::domain::map_api_result`, the same pattern the teacher's original
//! command modules used.

pub mod archives;
pub mod cache;
pub mod thumbnails;

pub use archives::{archive_extract_to_file, archive_info, archive_list_entries};
pub use cache::{cache_clear, cache_stats, cache_vacuum};
pub use thumbnails::{
    cancel_thumbnail, cancel_thumbnails_for_path, request_thumbnail, thumbnail_stats, PipelineState,
};
