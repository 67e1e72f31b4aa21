//! Destinations for captured output lines.

use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{Error, Result};

/// Receives each cleaned content line of a command's output.
pub trait OutputSink: Send {
    /// Accept one non-empty content line (no line terminator).
    fn accept(&mut self, line: &str) -> Result<()>;

    /// Flush and close. Called once when the exchange ends, on success or
    /// failure.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Accumulates lines in memory. Only for small, bounded outputs.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines joined with `\n`.
    pub fn into_text(self) -> String {
        self.lines.join("\n")
    }
}

impl OutputSink for MemorySink {
    fn accept(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Writes each line to a freshly created file as soon as it arrives.
///
/// Lines are terminated with `\r\n` and written as bytes, so nothing
/// rewrites line endings. Non-ASCII characters are dropped.
///
/// File writes block. On a multi-threaded runtime they run under
/// [`tokio::task::block_in_place`] so other sessions on the same worker
/// keep going; on a current-thread runtime they run inline.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Option<LineWriter<File>>,
    written: usize,
}

impl FileSink {
    /// Create (or truncate) `path`, creating missing parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::output(parent, e))?;
        }
        let file = File::create(&path).map_err(|e| Error::output(&path, e))?;
        debug!("Capturing output to {}", path.display());
        Ok(Self {
            path,
            writer: Some(LineWriter::new(file)),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl OutputSink for FileSink {
    fn accept(&mut self, line: &str) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let mut ascii: Vec<u8> = line.bytes().filter(u8::is_ascii).collect();
        ascii.extend_from_slice(b"\r\n");
        blocking(|| writer.write_all(&ascii)).map_err(|e| Error::output(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            blocking(|| writer.flush()).map_err(|e| Error::output(&self.path, e))?;
        }
        Ok(())
    }
}

/// Run blocking file I/O without stalling a shared runtime worker.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}
