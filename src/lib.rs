//! # mermaid-md2png
//!
//! Render the Mermaid diagrams embedded in Markdown documents to PNG images,
//! and write copies of the documents that reference the images instead.
//!
//! ## Why this crate?
//!
//! Plenty of Markdown renderers (package registries, PDF exporters, chat
//! tools, e-mail) do not understand ```` ```mermaid ```` fences and show the
//! raw diagram source. This crate renders each diagram once, in a real
//! browser with the real Mermaid library, and swaps the fence for an
//! `<img>` tag that works everywhere.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input/
//!  │
//!  ├─ 1. Discover   *.md files in the input directory (flat, sorted)
//!  ├─ 2. Launch     one headless Chrome for the whole batch
//!  ├─ 3. Extract    mermaid fences, in document order
//!  ├─ 4. Render     one fresh page per diagram, cropped screenshot
//!  ├─ 5. Write      input/assets/<doc><n>.png
//!  └─ 6. Rewrite    input/dist/<doc> with <img src="…"> in place of fences
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mermaid_md2png::{run_batch, BatchConfig, RenderConfig, Theme};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let render = RenderConfig::builder().theme(Theme::Forest).build()?;
//!     let config = BatchConfig::builder("docs").render(render).build()?;
//!     let report = run_batch(&config).await?;
//!     eprintln!(
//!         "{} documents, {} images",
//!         report.stats.transformed_documents,
//!         report.stats.rendered_diagrams
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mermaid-md2png = { version = "0.1", default-features = false }
//! ```
//!
//! ## Finding a browser
//!
//! Chrome or Chromium must be installed. Set `CHROME_PATH`, or name the
//! executable with `executablePath` in a launch-options file; otherwise the
//! usual install locations and `PATH` are searched.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_batch, run_batch, run_batch_sync};
pub use config::{
    load_engine_options, load_launch_options, load_stylesheet, resolve_script_file, BatchConfig,
    BatchConfigBuilder, FailurePolicy, LaunchOptions, LinkStyle, RenderConfig,
    RenderConfigBuilder, ScriptSource, Theme,
};
pub use error::{DocumentError, LaunchError, Md2PngError, RenderError};
pub use output::{BatchReport, BatchStats, DocumentResult};
pub use pipeline::extract::{extract_blocks, DiagramBlock};
pub use pipeline::host::BoundingBox;
pub use pipeline::input::SourceDocument;
pub use pipeline::session::{DiagramRenderer, RenderResult, RenderSession};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
