//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the batch walks its documents and diagrams.
//!
//! # Example
//!
//! ```rust
//! use mermaid_md2png::{BatchConfig, BatchProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     images: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_diagram_rendered(&self, document: &str, ordinal: usize, image: &Path) {
//!         self.images.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{document} #{ordinal} → {}", image.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { images: AtomicUsize::new(0) });
//!
//! let config = BatchConfig::builder("docs")
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// Processing is sequential, so events arrive strictly in document order and
/// diagram order. Implementations are still `Send + Sync` because the config
/// that carries them is shared across await points. All methods have default
/// no-op implementations so callers only override what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after discovery and before the browser is used.
    ///
    /// # Arguments
    /// * `total_documents` — number of eligible documents found
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document is read.
    ///
    /// # Arguments
    /// * `document` — document filename
    /// * `index`    — 1-indexed position in the batch
    /// * `total`    — total documents in the batch
    fn on_document_start(&self, document: &str, index: usize, total: usize) {
        let _ = (document, index, total);
    }

    /// Called after each diagram's image has been written.
    ///
    /// # Arguments
    /// * `document` — document filename
    /// * `ordinal`  — 0-indexed diagram position within the document
    /// * `image`    — path of the written PNG
    fn on_diagram_rendered(&self, document: &str, ordinal: usize, image: &Path) {
        let _ = (document, ordinal, image);
    }

    /// Called when a transformed document has been written.
    ///
    /// # Arguments
    /// * `document` — document filename
    /// * `diagrams` — number of diagrams replaced
    fn on_document_complete(&self, document: &str, diagrams: usize) {
        let _ = (document, diagrams);
    }

    /// Called when a document fails (under either failure policy).
    fn on_document_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }

    /// Called once after the last document has been attempted.
    ///
    /// # Arguments
    /// * `total_documents` — documents attempted
    /// * `success_count`   — documents transformed without error
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
