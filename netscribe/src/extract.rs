//! Hand-off point to an external structured-output extractor.

use std::path::Path;

/// Raw captured output given to an extractor.
#[derive(Debug, Clone, Copy)]
pub enum RawSource<'a> {
    Text(&'a str),
    File(&'a Path),
}

impl RawSource<'_> {
    /// Load the raw text, reading the file if needed.
    pub fn read(&self) -> std::io::Result<String> {
        match self {
            RawSource::Text(text) => Ok((*text).to_string()),
            RawSource::File(path) => std::fs::read_to_string(path),
        }
    }
}

/// Turns raw CLI output into rows using a template the engine never
/// inspects.
pub trait RawOutputExtractor: Send + Sync {
    fn extract(
        &self,
        source: RawSource<'_>,
        template: &str,
    ) -> Result<Vec<Vec<String>>, Box<dyn std::error::Error + Send + Sync>>;
}
