//! Document discovery: list the eligible documents in the input directory.
//!
//! The scan is flat (no recursion) and happens once, before any rendering.
//! Results are sorted by filename so runs are reproducible regardless of the
//! order the file system returns entries in.

use crate::error::Md2PngError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One document selected for transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Filename, e.g. `"a.md"`. Also the stem of every image name.
    pub name: String,
    /// Full path inside the input directory.
    pub path: PathBuf,
}

/// List regular files in `dir` whose name ends with `suffix`.
///
/// Symlinks are followed. Subdirectories (even ones named `x.md`) and files
/// with non-UTF-8 names are skipped.
pub async fn discover_documents(
    dir: &Path,
    suffix: &str,
) -> Result<Vec<SourceDocument>, Md2PngError> {
    let list_err = |e| Md2PngError::ListDirFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_err)?;
    let mut docs = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!("Skipping non-UTF-8 filename: {}", path.display());
            continue;
        };
        if !name.ends_with(suffix) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => docs.push(SourceDocument { name, path }),
            Ok(_) => debug!("Skipping non-file entry: {}", path.display()),
            Err(e) => warn!("Skipping unreadable entry {}: {}", path.display(), e),
        }
    }

    docs.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(
        "Discovered {} document(s) ending in '{}' in {}",
        docs.len(),
        suffix,
        dir.display()
    );
    Ok(docs)
}
