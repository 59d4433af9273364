//! Tracing setup extracted from the teacher's `main.rs`: a local-time
//! formatter and a size-rotating file writer feeding `tracing-subscriber`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::time::FormatTime;

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f%:z"))
    }
}

struct SizeLimitedWriter {
    file: File,
    path: PathBuf,
    max_bytes: u64,
}

impl SizeLimitedWriter {
    fn open(path: PathBuf, max_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path, max_bytes })
    }

    fn rotate_if_needed(&mut self) -> io::Result<()> {
        let size = self.file.metadata()?.len();
        if size < self.max_bytes {
            return Ok(());
        }
        let rotated = self.path.with_extension("log.1");
        std::fs::rename(&self.path, &rotated)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

impl Write for SizeLimitedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.rotate_if_needed()?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// A `MakeWriter` wrapping a mutex-guarded `SizeLimitedWriter`, handed
/// straight to `tracing_subscriber::fmt`'s `.with_writer(...)`.
struct RotatingWriter(Mutex<SizeLimitedWriter>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriterGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterGuard(&self.0)
    }
}

struct RotatingWriterGuard<'a>(&'a Mutex<SizeLimitedWriter>);

impl Write for RotatingWriterGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

/// Initializes the global `tracing` subscriber: local-time formatter, a
/// size-rotating file writer under `log_dir`, and `RUST_LOG`-driven
/// filtering (falling back to `info`). Returns an error string if
/// a subscriber is already installed rather than panicking, since the
/// desktop shell's `main()` calls this once at start-up but library
/// consumers embedding the core may have already installed their own.
pub fn init_logging(log_dir: &Path, file_name: &str) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|e| e.to_string())?;
    let log_path = log_dir.join(file_name);
    let writer = SizeLimitedWriter::open(log_path, MAX_LOG_BYTES).map_err(|e| e.to_string())?;
    let make_writer = RotatingWriter(Mutex::new(writer));

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_timer(LocalTimestamp)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .try_init()
        .map_err(|e| e.to_string())
}

pub fn default_log_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("nive")
        .join("logs")
}
