//! Match results, pagination styles and line cleanup.

use log::warn;
use regex::Regex;

use crate::error::{Error, Result};

/// Outcome of waiting for one of several candidate strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// 1-based index of the candidate that matched.
    pub index: usize,

    /// The candidate text that matched.
    pub matched: String,

    /// Everything received before the match.
    pub before: String,
}

impl MatchOutcome {
    /// Whether candidate `index` (1-based) is the one that matched.
    pub fn is(&self, index: usize) -> bool {
        self.index == index
    }
}

/// How a device family paginates and how it redraws after a page.
///
/// After the acknowledging space, devices erase the marker with a burst of
/// backspaces and spaces (or a carriage-return redraw) that lands in front
/// of the next content line. `residue` must capture the real content in a
/// group named `line`.
#[derive(Debug, Clone)]
pub struct PagerStyle {
    marker: String,
    residue: Regex,
}

impl PagerStyle {
    pub fn new(marker: impl Into<String>, residue: &str) -> Result<Self> {
        let marker = marker.into();
        let residue = Regex::new(residue).map_err(|e| Error::InvalidConfig {
            message: format!("invalid pager residue pattern: {e}"),
        })?;
        if marker.is_empty() {
            return Err(Error::InvalidConfig {
                message: "pager marker must not be empty".to_string(),
            });
        }
        if !residue.capture_names().any(|n| n == Some("line")) {
            return Err(Error::InvalidConfig {
                message: "pager residue pattern needs a named group 'line'".to_string(),
            });
        }
        Ok(Self { marker, residue })
    }

    /// Literal text the device prints when it holds output back.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn residue(&self) -> &Regex {
        &self.residue
    }

    /// Turn one raw line into content: strip residue, line endings and
    /// control characters.
    ///
    /// Residue that the pattern does not recognise is stripped anyway and
    /// logged, so marker debris never passes silently as content.
    pub fn clean_line(&self, raw: &str) -> String {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if let Some(line) = self
            .residue
            .captures(raw)
            .and_then(|caps| caps.name("line"))
        {
            return strip_control(line.as_str());
        }

        if raw.contains(self.marker.as_str()) || raw.contains('\x08') {
            warn!("Unrecognized pagination residue in {:?}; stripping it", raw);
            return strip_control(&raw.replace(self.marker.as_str(), ""))
                .trim()
                .to_string();
        }

        strip_control(raw)
    }
}

/// Drop control characters other than tab.
pub fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\t' || !c.is_control())
        .collect()
}
