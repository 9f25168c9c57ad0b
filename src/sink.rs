//! Sink side of the log: the output callback type and a file adapter
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::dispatch::TraceLog;

/// Consumes completed JSON chunks. Invoked from whichever thread flushes;
/// must not call back into the log.
pub type OutputCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// The default sink: discards everything.
pub fn null_output() -> OutputCallback {
    Arc::new(|_| {})
}

/// Writes JSON chunks to a file. Chunks arriving after [`close`](Self::close)
/// are reported on the diagnostics channel and discarded.
pub struct FileSink {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Arc<Self>> {
        let file = File::create(path)?;
        Ok(Arc::new(Self {
            writer: Mutex::new(Some(BufWriter::new(file))),
        }))
    }

    /// Installs this sink as `log`'s output callback.
    pub fn install(self: &Arc<Self>, log: &TraceLog) {
        let sink = Arc::clone(self);
        log.set_output_callback(move |chunk| sink.write_chunk(chunk));
    }

    pub fn write_chunk(&self, chunk: &str) {
        let mut guard = self.writer.lock().unwrap();
        match guard.as_mut() {
            Some(writer) => {
                if let Err(err) = writer.write_all(chunk.as_bytes()) {
                    log::warn!("trace file write failed: {err}");
                }
            }
            None => {
                log::warn!("trace chunk of {} bytes arrived after close, discarded", chunk.len());
            }
        }
    }

    /// Flushes and closes the file; later chunks are discarded.
    pub fn close(&self) -> std::io::Result<()> {
        let mut guard = self.writer.lock().unwrap();
        match guard.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// Starts writing the process-wide log to `path` and returns a guard that
/// finishes the document on drop.
///
/// The guard flushes pending events, emits the epilogue and closes the file,
/// so a well-formed trace lands on disk even on early returns.
pub fn start_file_tracing(path: impl AsRef<Path>) -> std::io::Result<FileTracingGuard> {
    let sink = FileSink::create(path)?;
    let log = TraceLog::global();
    sink.install(log);
    log.begin_logging();
    Ok(FileTracingGuard { log, sink })
}

pub struct FileTracingGuard {
    log: &'static TraceLog,
    sink: Arc<FileSink>,
}

impl FileTracingGuard {
    pub fn sink(&self) -> &Arc<FileSink> {
        &self.sink
    }
}

impl Drop for FileTracingGuard {
    fn drop(&mut self) {
        self.log.flush();
        self.log.end_logging();
        if let Err(err) = self.sink.close() {
            log::warn!("closing trace file failed: {err}");
        }
    }
}
