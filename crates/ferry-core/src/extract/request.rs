//! Extraction request: what to extract, where to put it, and under which limits.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opaque handle to the source medium. Strategies decide how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Path(PathBuf),
    Url(String),
}

impl SourceRef {
    /// Argument form handed to external tools.
    pub fn as_arg(&self) -> String {
        match self {
            SourceRef::Path(p) => p.to_string_lossy().into_owned(),
            SourceRef::Url(u) => u.clone(),
        }
    }

    /// Lowercased extension of the path or URL path, if any.
    fn extension(&self) -> Option<String> {
        let last = match self {
            SourceRef::Path(p) => p.file_name()?.to_string_lossy().into_owned(),
            SourceRef::Url(u) => {
                let no_query = u.split(['?', '#']).next().unwrap_or(u);
                no_query.rsplit('/').next()?.to_string()
            }
        };
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Where the winning strategy should write its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkDescriptor {
    /// Write to this file path.
    File(PathBuf),
    /// Keep the output in memory.
    Memory,
}

impl SinkDescriptor {
    pub fn path(&self) -> Option<&Path> {
        match self {
            SinkDescriptor::File(p) => Some(p),
            SinkDescriptor::Memory => None,
        }
    }
}

/// Limits every strategy must respect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    /// Upper bound on extracted duration (None = whole source).
    pub max_duration: Option<Duration>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_duration: None,
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Immutable per-call extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    source: SourceRef,
    sink: SinkDescriptor,
    constraints: Constraints,
    category: String,
}

impl ExtractionRequest {
    /// Build a request. The telemetry category defaults to the source extension.
    pub fn new(source: SourceRef, sink: SinkDescriptor, constraints: Constraints) -> Self {
        let category = source.extension().unwrap_or_else(|| "unknown".to_string());
        Self {
            source,
            sink,
            constraints,
            category,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn sink(&self) -> &SinkDescriptor {
        &self.sink
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Key used to group telemetry across similar requests.
    pub fn category(&self) -> &str {
        &self.category
    }
}
