//! Error types for the mermaid-md2png library.
//!
//! Four error types reflect four distinct failure scopes:
//!
//! * [`Md2PngError`] — **Fatal**: the batch cannot proceed (missing input
//!   directory, unreadable config file, browser would not start, a diagram
//!   failed under the default abort policy). Returned as `Err(Md2PngError)`
//!   from [`crate::batch::run_batch`] and the config loaders.
//!
//! * [`LaunchError`] — the shared browser process could not be started.
//!
//! * [`RenderError`] — one diagram could not be turned into an image.
//!   Produced by [`crate::pipeline::session::DiagramRenderer::render`].
//!
//! * [`DocumentError`] — **Non-fatal**: one document failed while the batch
//!   runs with [`crate::config::FailurePolicy::SkipDocument`]. Stored inside
//!   [`crate::output::DocumentResult`] so callers can inspect partial success.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mermaid-md2png library.
#[derive(Debug, Error)]
pub enum Md2PngError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Input directory does not exist.
    #[error("Input directory '{path}' doesn't exist")]
    InputNotFound { path: PathBuf },

    /// Input path exists but is a file.
    #[error("Input '{path}' is not a directory")]
    InputNotADirectory { path: PathBuf },

    /// A referenced configuration, stylesheet, or script file is missing.
    #[error("{kind} file '{path}' doesn't exist")]
    ConfigFileNotFound { kind: &'static str, path: PathBuf },

    /// A referenced JSON file could not be parsed.
    #[error("Invalid {kind} file '{path}': {detail}")]
    InvalidConfigFile {
        kind: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The shared browser process could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// A diagram failed to render; the containing document was abandoned.
    #[error("Diagram #{ordinal} in '{document}' failed: {source}")]
    Render {
        document: PathBuf,
        ordinal: usize,
        #[source]
        source: RenderError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not list the input directory.
    #[error("Failed to list directory '{path}': {source}")]
    ListDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read an input document.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write an image or transformed document.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create an output directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PngError {
    /// `true` for errors raised while validating inputs, before any
    /// rendering has started.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Md2PngError::InputNotFound { .. }
                | Md2PngError::InputNotADirectory { .. }
                | Md2PngError::ConfigFileNotFound { .. }
                | Md2PngError::InvalidConfigFile { .. }
                | Md2PngError::InvalidConfig(_)
        )
    }
}

/// The shared rendering-engine process could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No browser executable was configured or discovered.
    #[error("{0}")]
    BrowserNotFound(String),

    /// Launch options were rejected before spawning.
    #[error("Invalid browser launch options: {0}")]
    InvalidOptions(String),

    /// The browser process failed to start or to accept a DevTools connection.
    #[error(
        "Failed to launch browser: {0}\n\
If running as root or inside a container, try a launch-options file with {{\"sandbox\": false}}."
    )]
    Spawn(String),

    /// The hosting page could not be written to a scratch directory.
    #[error("Failed to prepare hosting page '{path}': {source}")]
    HostPage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single diagram could not be rendered.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// A fresh page could not be opened or configured.
    #[error("could not open rendering surface: {detail}")]
    SurfaceFailed { detail: String },

    /// The hosting page did not load or the rendering library is missing.
    #[error("hosting page failed to load: {detail}")]
    HostLoadFailed { detail: String },

    /// The library produced no `<svg>` element (invalid diagram source).
    #[error("no diagram was produced: {detail}")]
    NoGraphic { detail: String },

    /// The produced graphic has zero width or height.
    #[error("rendered diagram has an empty bounding box ({width}x{height})")]
    EmptyBoundingBox { width: f64, height: f64 },

    /// Screenshot capture failed or returned an unusable image.
    #[error("screenshot capture failed: {detail}")]
    CaptureFailed { detail: String },

    /// The render call exceeded the configured timeout.
    #[error("render timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A non-fatal error for a single document.
///
/// Stored alongside [`crate::output::DocumentResult`] when the batch runs
/// with [`crate::config::FailurePolicy::SkipDocument`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// One of the document's diagrams failed to render.
    #[error("diagram #{ordinal}: {source}")]
    Render { ordinal: usize, source: RenderError },

    /// The document or one of its outputs could not be read or written.
    #[error("{detail}")]
    Io { detail: String },
}

impl DocumentError {
    /// Downgrade a fatal error raised while transforming one document.
    pub fn from_fatal(err: &Md2PngError) -> Self {
        match err {
            Md2PngError::Render {
                ordinal, source, ..
            } => DocumentError::Render {
                ordinal: *ordinal,
                source: source.clone(),
            },
            other => DocumentError::Io {
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_not_found_display() {
        let e = Md2PngError::InputNotFound {
            path: PathBuf::from("docs"),
        };
        assert_eq!(e.to_string(), "Input directory 'docs' doesn't exist");
        assert!(e.is_config_error());
    }

    #[test]
    fn config_file_not_found_names_kind() {
        let e = Md2PngError::ConfigFileNotFound {
            kind: "CSS",
            path: PathBuf::from("style.css"),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("CSS file"), "got: {msg}");
        assert!(msg.contains("style.css"));
    }

    #[test]
    fn render_error_is_not_config_error() {
        let e = Md2PngError::Render {
            document: PathBuf::from("a.md"),
            ordinal: 2,
            source: RenderError::NoGraphic {
                detail: "Parse error on line 1".into(),
            },
        };
        assert!(!e.is_config_error());
        let msg = e.to_string();
        assert!(msg.contains("#2"), "got: {msg}");
        assert!(msg.contains("a.md"));
        assert!(msg.contains("Parse error"));
    }

    #[test]
    fn empty_bounding_box_display() {
        let e = RenderError::EmptyBoundingBox {
            width: 0.0,
            height: 120.0,
        };
        assert!(e.to_string().contains("0x120"));
    }

    #[test]
    fn launch_error_converts_into_fatal() {
        let e: Md2PngError = LaunchError::Spawn("no DevTools port".into()).into();
        assert!(matches!(e, Md2PngError::Launch(_)));
        assert!(e.to_string().contains("sandbox"));
    }

    #[test]
    fn document_error_from_render_keeps_ordinal() {
        let fatal = Md2PngError::Render {
            document: PathBuf::from("b.md"),
            ordinal: 1,
            source: RenderError::Timeout { secs: 5 },
        };
        match DocumentError::from_fatal(&fatal) {
            DocumentError::Render { ordinal, source } => {
                assert_eq!(ordinal, 1);
                assert_eq!(source, RenderError::Timeout { secs: 5 });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn document_error_from_io_keeps_message() {
        let fatal = Md2PngError::WriteFailed {
            path: PathBuf::from("dist/a.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let e = DocumentError::from_fatal(&fatal);
        assert!(e.to_string().contains("dist/a.md"));
    }
}
