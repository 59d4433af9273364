//! Library root for the thumbnail production and caching pipeline: virtual
//! paths, the two-tier cache store, the archive reader pool, the priority
//! request queue, and the thumbnail generator. Builds without the `shell`
//! feature; the desktop application (`src/main.rs`) is a thin Tauri command
//! layer over this crate.

pub mod config;
pub mod core;
pub mod errors;
pub mod logging;

#[cfg(feature = "shell")]
pub mod commands;
