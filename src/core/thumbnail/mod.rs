//! Thumbnail Generator (C5): a worker pool that drains the priority queue,
//! consults the cache, decodes + downsamples, writes back, and delivers
//! results — without ever touching UI state directly.

pub mod decoder;
pub mod downsample;
pub mod error;
pub mod request;

pub use error::{ThumbnailError, ThumbnailErrorCode};
pub use request::{
    DecodedImage, PixelFormat, Priority, RequestId, ResultCallback, ThumbnailRequest, ThumbnailResult,
    ThumbnailSource,
};

use crate::core::cache::{CacheStore, SourceStat};
use crate::core::queue::ThumbnailQueue;
use decoder::{DecoderRegistry, EncodedSource};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub worker_count: usize,
    pub default_thumbnail_size: u32,
    pub max_queue_size: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().clamp(2, 8),
            default_thumbnail_size: 256,
            max_queue_size: None,
        }
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct GeneratorStats {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub failed_requests: u64,
    pub cancelled_requests: u64,
    pub total_processing_time_ms: u64,
    pub pending_count: u64,
    pub in_flight_count: u64,
}

#[derive(Default)]
struct AtomicStats {
    total_requests: AtomicU64,
    completed_requests: AtomicU64,
    failed_requests: AtomicU64,
    cancelled_requests: AtomicU64,
    total_processing_time_ms: AtomicU64,
    in_flight_count: AtomicU64,
}

pub struct ThumbnailGenerator {
    config: GeneratorConfig,
    queue: Arc<ThumbnailQueue>,
    cache: Mutex<Option<Arc<CacheStore>>>,
    decoders: Arc<DecoderRegistry>,
    next_id: AtomicU64,
    running: Arc<AtomicBool>,
    stats: Arc<AtomicStats>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThumbnailGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            queue: Arc::new(ThumbnailQueue::new()),
            cache: Mutex::new(None),
            decoders: Arc::new(DecoderRegistry::default()),
            next_id: AtomicU64::new(1),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(AtomicStats::default()),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_cache(&self, cache: Option<Arc<CacheStore>>) {
        *self.cache.lock().unwrap() = cache;
    }

    pub fn set_decoders(&mut self, decoders: DecoderRegistry) {
        self.decoders = Arc::new(decoders);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Idempotent: spawns `worker_count` workers if not already running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.restart();
        let mut workers = self.workers.lock().unwrap();
        for worker_index in 0..self.config.worker_count {
            let queue = self.queue.clone();
            let cache = self.cache.lock().unwrap().clone();
            let decoders = self.decoders.clone();
            let stats = self.stats.clone();
            let running = self.running.clone();
            let handle = std::thread::Builder::new()
                .name(format!("thumbnail-worker-{worker_index}"))
                .spawn(move || worker_loop(queue, cache, decoders, stats, running))
                .expect("failed to spawn thumbnail worker thread");
            workers.push(handle);
        }
    }

    /// Clears the run flag, stops the queue (waking all workers), and joins
    /// every worker thread.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.queue.stop();
        let mut workers = self.workers.lock().unwrap();
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }

    fn allocate_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn request(&self, source: ThumbnailSource, priority: Priority, target_size: u32, callback: ResultCallback) -> RequestId {
        let id = self.allocate_id();
        let target_size = if target_size == 0 { self.config.default_thumbnail_size } else { target_size };
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        self.queue.push(ThumbnailRequest {
            id,
            source,
            target_size,
            priority,
            callback,
            created_at: id,
        });
        id
    }

    pub fn request_from_memory(
        &self,
        vpath: crate::core::virtual_path::VirtualPath,
        bytes: Arc<[u8]>,
        priority: Priority,
        target_size: u32,
        callback: ResultCallback,
    ) -> RequestId {
        self.request(ThumbnailSource::Memory(vpath, bytes), priority, target_size, callback)
    }

    /// Pushes every request in the batch and invokes `on_batch_complete` once
    /// all of their IDs have reached a terminal state.
    pub fn request_batch(
        &self,
        sources: Vec<(ThumbnailSource, Priority, u32)>,
        on_batch_complete: impl Fn() + Send + Sync + 'static,
    ) -> Vec<RequestId> {
        let remaining = Arc::new(AtomicU64::new(sources.len() as u64));
        let on_batch_complete = Arc::new(on_batch_complete);
        sources
            .into_iter()
            .map(|(source, priority, size)| {
                let remaining = remaining.clone();
                let on_batch_complete = on_batch_complete.clone();
                self.request(
                    source,
                    priority,
                    size,
                    Arc::new(move |_result: ThumbnailResult| {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            on_batch_complete();
                        }
                    }),
                )
            })
            .collect()
    }

    pub fn cancel(&self, id: RequestId) -> bool {
        let cancelled = self.queue.cancel(id);
        if cancelled {
            self.stats.cancelled_requests.fetch_add(1, Ordering::Relaxed);
        }
        cancelled
    }

    pub fn cancel_by_path(&self, path: &str) -> usize {
        let count = self.queue.cancel_by_path(path);
        self.stats.cancelled_requests.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    pub fn cancel_all(&self) -> usize {
        let count = self.queue.cancel_all();
        self.stats.cancelled_requests.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    pub fn update_priority(&self, id: RequestId, new_priority: Priority) -> bool {
        self.queue.update_priority(id, new_priority)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            completed_requests: self.stats.completed_requests.load(Ordering::Relaxed),
            failed_requests: self.stats.failed_requests.load(Ordering::Relaxed),
            cancelled_requests: self.stats.cancelled_requests.load(Ordering::Relaxed),
            total_processing_time_ms: self.stats.total_processing_time_ms.load(Ordering::Relaxed),
            pending_count: self.queue.len() as u64,
            in_flight_count: self.stats.in_flight_count.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.stats.total_requests.store(0, Ordering::Relaxed);
        self.stats.completed_requests.store(0, Ordering::Relaxed);
        self.stats.failed_requests.store(0, Ordering::Relaxed);
        self.stats.cancelled_requests.store(0, Ordering::Relaxed);
        self.stats.total_processing_time_ms.store(0, Ordering::Relaxed);
    }
}

impl Drop for ThumbnailGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn source_stat(path: &str) -> Option<SourceStat> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    let duration = mtime.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(SourceStat {
        mtime_secs: duration.as_secs() as i64,
        mtime_nanos: duration.subsec_nanos(),
        size: meta.len(),
    })
}

fn worker_loop(
    queue: Arc<ThumbnailQueue>,
    cache: Option<Arc<CacheStore>>,
    decoders: Arc<DecoderRegistry>,
    stats: Arc<AtomicStats>,
    running: Arc<AtomicBool>,
) {
    while let Some(request) = queue.pop() {
        if queue.is_cancelled(request.id) {
            queue.clear_cancelled(request.id);
            continue;
        }
        let is_stopped_at_delivery = !running.load(Ordering::Acquire);
        process_request(request, &queue, cache.as_ref(), &decoders, &stats, is_stopped_at_delivery);
    }
}

fn process_request(
    request: ThumbnailRequest,
    queue: &ThumbnailQueue,
    cache: Option<&Arc<CacheStore>>,
    decoders: &DecoderRegistry,
    stats: &AtomicStats,
    queue_already_stopping: bool,
) {
    stats.in_flight_count.fetch_add(1, Ordering::Relaxed);
    let start = std::time::Instant::now();
    let identifier = request.source.identifier();

    let outcome = run_pipeline(&request, cache, decoders);

    let elapsed_ms = start.elapsed().as_millis() as u64;
    stats.total_processing_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    stats.in_flight_count.fetch_sub(1, Ordering::Relaxed);

    let result = match outcome {
        Ok(result) => {
            stats.completed_requests.fetch_add(1, Ordering::Relaxed);
            result
        }
        Err(err) => {
            stats.failed_requests.fetch_add(1, Ordering::Relaxed);
            ThumbnailResult::failure(request.id, identifier, err.code.as_code_str_pub(), err.message)
        }
    };

    let stopped_now = queue_already_stopping || queue.is_stopped();
    if stopped_now {
        return;
    }

    let callback = request.callback.clone();
    if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
        error!(request_id = request.id, "thumbnail result callback panicked");
    }
}

fn run_pipeline(
    request: &ThumbnailRequest,
    cache: Option<&Arc<CacheStore>>,
    decoders: &DecoderRegistry,
) -> Result<ThumbnailResult, ThumbnailError> {
    let identifier = request.source.identifier();

    if let ThumbnailSource::File(path) = &request.source {
        if let (Some(cache), Some(stat)) = (cache, source_stat(path)) {
            if let Ok(Some((thumbnail, ow, oh))) = cache.get_thumbnail(&identifier, stat, request.target_size) {
                return Ok(ThumbnailResult::success(request.id, identifier, thumbnail, ow, oh));
            }
        }
    }

    let (encoded, extension) = match &request.source {
        ThumbnailSource::File(path) => (
            EncodedSource::File(std::path::PathBuf::from(path)),
            std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase(),
        ),
        ThumbnailSource::Memory(vpath, bytes) => (EncodedSource::Memory(bytes.clone()), vpath.extension()),
    };

    let decoded = decoders.decode(&encoded, &extension, &[], request.target_size)?;
    let original_width = decoded.width();
    let original_height = decoded.height();
    let thumbnail = downsample::downsample_to_fit(&decoded, request.target_size);

    if let ThumbnailSource::File(path) = &request.source {
        if let (Some(cache), Some(stat)) = (cache, source_stat(path)) {
            if let Err(e) = cache.put_thumbnail(&identifier, stat, request.target_size, &thumbnail, original_width, original_height) {
                warn!(error = %e, path = %path, "failed to write thumbnail to cache");
            }
        }
    }

    Ok(ThumbnailResult::success(request.id, identifier, thumbnail, original_width, original_height))
}

impl ThumbnailErrorCode {
    /// Small helper so `process_request` can read the code string without
    /// importing the `ErrorCode` trait at every call site.
    fn as_code_str_pub(self) -> &'static str {
        use crate::errors::domain::ErrorCode;
        self.as_code_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn start_is_idempotent_and_stop_joins_workers() {
        let generator = ThumbnailGenerator::new(GeneratorConfig { worker_count: 2, ..Default::default() });
        generator.start();
        generator.start();
        assert!(generator.is_running());
        generator.stop();
        assert!(!generator.is_running());
    }

    #[test]
    fn request_on_missing_file_delivers_failure_result() {
        let generator = ThumbnailGenerator::new(GeneratorConfig { worker_count: 1, ..Default::default() });
        generator.start();
        let (tx, rx) = mpsc::channel();
        generator.request(
            ThumbnailSource::File("/nonexistent/path/does-not-exist.png".into()),
            Priority::Normal,
            64,
            Arc::new(move |result: ThumbnailResult| {
                let _ = tx.send(result);
            }),
        );
        let result = rx.recv_timeout(std::time::Duration::from_secs(5)).expect("result never arrived");
        assert!(!result.is_success());
        generator.stop();
    }

    #[test]
    fn cancelled_request_never_invokes_callback() {
        let generator = ThumbnailGenerator::new(GeneratorConfig { worker_count: 1, ..Default::default() });
        let (tx, rx) = mpsc::channel::<()>();
        let id = generator.request(
            ThumbnailSource::File("/nonexistent/never-read.png".into()),
            Priority::Low,
            64,
            Arc::new(move |_| {
                let _ = tx.send(());
            }),
        );
        assert!(generator.cancel(id));
        generator.start();
        generator.stop();
        assert!(rx.try_recv().is_err());
    }
}
