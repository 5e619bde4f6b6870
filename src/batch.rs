//! Batch entry points: transform every document in a directory.
//!
//! [`run_batch`] owns the browser for the whole run. It is started once,
//! after discovery and output-directory setup, and closed exactly once on
//! every exit path. [`process_batch`] is the document loop itself, generic
//! over the renderer so it can run without a browser.

use crate::config::{BatchConfig, FailurePolicy};
use crate::error::{DocumentError, Md2PngError};
use crate::output::{BatchReport, BatchStats, DocumentResult};
use crate::pipeline::extract::extract_blocks;
use crate::pipeline::input::{discover_documents, SourceDocument};
use crate::pipeline::session::{DiagramRenderer, RenderSession};
use crate::pipeline::transform::transform_document;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Transform every eligible document under `config.input_dir`.
///
/// # Returns
/// A [`BatchReport`] describing every attempted document. Under
/// [`FailurePolicy::SkipDocument`] failed documents appear in the report
/// with `error` set.
///
/// # Errors
/// - config errors (missing input directory) before anything is started
/// - [`Md2PngError::Launch`] if the browser cannot start
/// - the first document failure under [`FailurePolicy::Abort`]
/// - a failed browser shutdown after an otherwise successful run
pub async fn run_batch(config: &BatchConfig) -> Result<BatchReport, Md2PngError> {
    let total_start = Instant::now();
    info!("Starting batch: {}", config.input_dir.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    config.validate_input()?;

    // ── Step 2: Discover documents ───────────────────────────────────────
    let docs = discover_documents(&config.input_dir, &config.document_suffix).await?;
    info!("Found {} document(s)", docs.len());

    // ── Step 3: Ensure output directories ────────────────────────────────
    ensure_dir(&config.assets_dir()).await?;
    ensure_dir(&config.dist_dir()).await?;

    // ── Step 4: Start the browser ────────────────────────────────────────
    let session = RenderSession::open(&config.launch, &config.script)
        .await?
        .with_render_timeout(Duration::from_secs(config.render_timeout_secs));

    // ── Step 5: Transform documents ──────────────────────────────────────
    let outcome = process_batch(&session, config, &docs).await;

    // ── Step 6: Shut the browser down ────────────────────────────────────
    let closed = session.close().await;

    let mut report = match (outcome, closed) {
        (Ok(report), Ok(())) => report,
        (Ok(_), Err(e)) => return Err(e.into()),
        (Err(e), Ok(())) => return Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Browser shutdown also failed: {}", close_err);
            return Err(e);
        }
    };

    report.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Batch complete: {}/{} documents, {} images, {}ms total",
        report.stats.transformed_documents,
        report.stats.total_documents,
        report.stats.rendered_diagrams,
        report.stats.total_duration_ms
    );
    Ok(report)
}

/// Blocking wrapper around [`run_batch`] for callers without a runtime.
pub fn run_batch_sync(config: &BatchConfig) -> Result<BatchReport, Md2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config))
}

/// Transform `docs` one after another with `renderer`.
///
/// Output directories must already exist. The renderer is borrowed, never
/// closed here.
pub async fn process_batch<R: DiagramRenderer>(
    renderer: &R,
    config: &BatchConfig,
    docs: &[SourceDocument],
) -> Result<BatchReport, Md2PngError> {
    let start = Instant::now();
    let total = docs.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results = Vec::with_capacity(total);
    let mut succeeded = 0usize;

    for (idx, doc) in docs.iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(&doc.name, idx + 1, total);
        }

        let doc_start = Instant::now();
        let mut images = Vec::new();
        let mut diagrams = 0usize;
        let outcome = process_document(renderer, config, doc, &mut images, &mut diagrams).await;
        let duration_ms = doc_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                succeeded += 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_complete(&doc.name, images.len());
                }
                results.push(DocumentResult {
                    name: doc.name.clone(),
                    source: doc.path.clone(),
                    output: Some(output),
                    images,
                    diagrams,
                    duration_ms,
                    error: None,
                });
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(&doc.name, &e.to_string());
                }
                match config.failure_policy {
                    FailurePolicy::Abort => {
                        if let Some(ref cb) = config.progress_callback {
                            cb.on_batch_complete(idx + 1, succeeded);
                        }
                        return Err(e);
                    }
                    FailurePolicy::SkipDocument => {
                        warn!("Skipping {}: {}", doc.name, e);
                        results.push(DocumentResult {
                            name: doc.name.clone(),
                            source: doc.path.clone(),
                            output: None,
                            images,
                            diagrams,
                            duration_ms,
                            error: Some(DocumentError::from_fatal(&e)),
                        });
                    }
                }
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    let stats = BatchStats {
        total_documents: total,
        transformed_documents: succeeded,
        failed_documents: total - succeeded,
        rendered_diagrams: results.iter().map(|r| r.images.len()).sum(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    Ok(BatchReport {
        documents: results,
        stats,
    })
}

/// Read, transform, and write one document. Returns the output path.
async fn process_document<R: DiagramRenderer>(
    renderer: &R,
    config: &BatchConfig,
    doc: &SourceDocument,
    images: &mut Vec<PathBuf>,
    diagrams: &mut usize,
) -> Result<PathBuf, Md2PngError> {
    let raw = tokio::fs::read_to_string(&doc.path)
        .await
        .map_err(|e| Md2PngError::ReadFailed {
            path: doc.path.clone(),
            source: e,
        })?;
    *diagrams = extract_blocks(&raw).count();
    debug!("{}: {} diagram(s)", doc.name, diagrams);

    let text = transform_document(renderer, doc, &raw, config, images).await?;

    let output = config.dist_dir().join(&doc.name);
    tokio::fs::write(&output, text)
        .await
        .map_err(|e| Md2PngError::WriteFailed {
            path: output.clone(),
            source: e,
        })?;
    debug!("{}: wrote {}", doc.name, output.display());
    Ok(output)
}

async fn ensure_dir(path: &Path) -> Result<(), Md2PngError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Md2PngError::CreateDirFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
