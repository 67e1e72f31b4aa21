//! Output file naming.

use std::path::{Path, PathBuf};

use chrono::Local;

/// Builds `<dir>/<hostname>-<desc>-<timestamp><ext>` paths.
///
/// The timestamp is taken once, when the namer is created, so every file a
/// script run produces shares it.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    timestamp: String,
}

impl OutputNamer {
    /// Stamp with the local time rendered through `date_format`.
    pub fn new(date_format: &str) -> Self {
        Self {
            timestamp: Local::now().format(date_format).to_string(),
        }
    }

    pub fn with_timestamp(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// File name without directory. `ext` may be given with or without
    /// its leading dot; empty parts are skipped.
    pub fn file_name(&self, hostname: &str, desc: &str, ext: &str) -> String {
        let desc = clean_description(desc);
        let stem = [hostname, desc.as_str(), self.timestamp.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("-");
        let stem = stem.trim_matches('-');

        let ext = ext.trim_start_matches('.');
        if ext.is_empty() {
            stem.to_string()
        } else {
            format!("{stem}.{ext}")
        }
    }

    pub fn path(&self, dir: &Path, hostname: &str, desc: &str, ext: &str) -> PathBuf {
        dir.join(self.file_name(hostname, desc, ext))
    }
}

/// Make a command or description safe to embed in a file name.
pub fn clean_description(desc: &str) -> String {
    desc.replace("| ", "")
        .replace(['|', '\\'], "")
        .replace(['/', '.', ':'], "-")
}
