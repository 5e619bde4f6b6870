//! Result types returned by a batch run.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a batch run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per attempted document, in processing order.
    pub documents: Vec<DocumentResult>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// All image files written by the run, across documents.
    pub fn images(&self) -> impl Iterator<Item = &PathBuf> {
        self.documents.iter().flat_map(|d| d.images.iter())
    }
}

/// Outcome for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Document filename, e.g. `"a.md"`.
    pub name: String,

    /// Path the document was read from.
    pub source: PathBuf,

    /// Path the transformed document was written to; `None` if it failed.
    pub output: Option<PathBuf>,

    /// Images written for this document, in diagram order. May be non-empty
    /// even when `error` is set.
    pub images: Vec<PathBuf>,

    /// Diagram fences found in the document.
    pub diagrams: usize,

    pub duration_ms: u64,

    /// Set when the document failed under `FailurePolicy::SkipDocument`.
    pub error: Option<DocumentError>,
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Eligible documents found at start.
    pub total_documents: usize,
    /// Documents whose transformed copy was written.
    pub transformed_documents: usize,
    /// Documents skipped after an error.
    pub failed_documents: usize,
    /// Images written.
    pub rendered_diagrams: usize,
    pub total_duration_ms: u64,
}
