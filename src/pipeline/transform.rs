//! Per-document transformation: render every diagram, write its image, and
//! substitute an image reference for its fence.
//!
//! Blocks are handled strictly one after another in discovery order. The
//! first render failure stops the document; images written before it stay
//! on disk and are reported through the caller's `written` list.

use crate::config::{BatchConfig, LinkStyle};
use crate::error::Md2PngError;
use crate::pipeline::extract::{extract_blocks, DiagramBlock};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::session::DiagramRenderer;
use crate::pipeline::substitute::{image_reference, link_path, DocumentRewriter};
use std::path::PathBuf;
use tracing::{debug, info};

/// Image filename for a block: the document name followed by the ordinal,
/// e.g. `a.md0.png`.
pub fn image_file_name(document: &str, ordinal: usize) -> String {
    format!("{document}{ordinal}.png")
}

/// How a generated image is referenced from the transformed document.
pub fn image_link(config: &BatchConfig, file_name: &str) -> String {
    match config.link_style {
        LinkStyle::AsWritten => link_path(&config.assets_dir().join(file_name)),
        LinkStyle::RelativeToDocument => format!("../{}/{}", config.assets_dir_name, file_name),
    }
}

/// Transform `raw`, the text of `doc`, and return the rewritten text.
///
/// Each rendered image's path is pushed onto `written` as soon as the file
/// exists, so the caller knows what was produced even when this fails.
pub async fn transform_document<R: DiagramRenderer>(
    renderer: &R,
    doc: &SourceDocument,
    raw: &str,
    config: &BatchConfig,
    written: &mut Vec<PathBuf>,
) -> Result<String, Md2PngError> {
    let assets_dir = config.assets_dir();
    let mut rewriter = DocumentRewriter::new(raw);

    for block in extract_blocks(raw) {
        let image_path = render_block(renderer, doc, &block, config, &assets_dir).await?;
        written.push(image_path.clone());

        if let Some(ref cb) = config.progress_callback {
            cb.on_diagram_rendered(&doc.name, block.ordinal, &image_path);
        }

        let file_name = image_file_name(&doc.name, block.ordinal);
        let reference = image_reference(&image_link(config, &file_name));
        rewriter.substitute(&block, &reference)?;
    }

    if rewriter.applied() > 0 {
        info!(
            "{}: replaced {} diagram(s)",
            doc.name,
            rewriter.applied()
        );
    } else {
        debug!("{}: no diagrams", doc.name);
    }
    Ok(rewriter.finish())
}

/// Render one block and write its PNG under `assets_dir`.
async fn render_block<R: DiagramRenderer>(
    renderer: &R,
    doc: &SourceDocument,
    block: &DiagramBlock<'_>,
    config: &BatchConfig,
    assets_dir: &std::path::Path,
) -> Result<PathBuf, Md2PngError> {
    debug!("{}: rendering diagram #{}", doc.name, block.ordinal);

    let result = renderer
        .render(block.source, &config.render)
        .await
        .map_err(|source| Md2PngError::Render {
            document: doc.path.clone(),
            ordinal: block.ordinal,
            source,
        })?;

    let image_path = assets_dir.join(image_file_name(&doc.name, block.ordinal));
    tokio::fs::write(&image_path, &result.image)
        .await
        .map_err(|e| Md2PngError::WriteFailed {
            path: image_path.clone(),
            source: e,
        })?;

    debug!(
        "{}: wrote {} ({}x{} px)",
        doc.name,
        image_path.display(),
        result.pixel_width,
        result.pixel_height
    );
    Ok(image_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::error::RenderError;
    use crate::pipeline::host::BoundingBox;
    use crate::pipeline::session::RenderResult;
    use std::sync::Mutex;

    /// Records every source it is asked to render and fails on `"boom"`.
    #[derive(Default)]
    struct ScriptedRenderer {
        seen: Mutex<Vec<String>>,
    }

    impl DiagramRenderer for ScriptedRenderer {
        async fn render(
            &self,
            source: &str,
            _config: &RenderConfig,
        ) -> Result<RenderResult, RenderError> {
            self.seen.lock().unwrap().push(source.to_string());
            if source == "boom" {
                return Err(RenderError::NoGraphic {
                    detail: "Parse error".into(),
                });
            }
            Ok(RenderResult {
                image: source.as_bytes().to_vec(),
                bounding_box: BoundingBox {
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                },
                pixel_width: 10,
                pixel_height: 10,
                has_alpha: false,
            })
        }
    }

    fn setup(raw: &str) -> (tempfile::TempDir, BatchConfig, SourceDocument) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        let doc_path = dir.path().join("doc.md");
        std::fs::write(&doc_path, raw).unwrap();
        let config = BatchConfig::builder(dir.path()).build().unwrap();
        let doc = SourceDocument {
            name: "doc.md".into(),
            path: doc_path,
        };
        (dir, config, doc)
    }

    #[test]
    fn image_names_include_document_name() {
        assert_eq!(image_file_name("a.md", 0), "a.md0.png");
        assert_eq!(image_file_name("notes.md", 12), "notes.md12.png");
    }

    #[test]
    fn relative_links_point_out_of_dist() {
        let config = BatchConfig::builder("input")
            .link_style(LinkStyle::RelativeToDocument)
            .build()
            .unwrap();
        assert_eq!(image_link(&config, "a.md0.png"), "../assets/a.md0.png");
    }

    #[test]
    fn written_links_keep_input_prefix() {
        let config = BatchConfig::builder("input").build().unwrap();
        assert_eq!(image_link(&config, "a.md0.png"), "input/assets/a.md0.png");
    }

    #[tokio::test]
    async fn renders_in_order_and_substitutes() {
        let raw = "x\n```mermaid\nfirst\n```\ny\n```mermaid\nsecond\n```\nz\n";
        let (dir, config, doc) = setup(raw);
        let renderer = ScriptedRenderer::default();
        let mut written = Vec::new();

        let text = transform_document(&renderer, &doc, raw, &config, &mut written)
            .await
            .unwrap();

        assert_eq!(*renderer.seen.lock().unwrap(), vec!["first", "second"]);
        let assets = dir.path().join("assets");
        assert_eq!(written, vec![assets.join("doc.md0.png"), assets.join("doc.md1.png")]);
        assert_eq!(std::fs::read(&written[1]).unwrap(), b"second");

        let link0 = link_path(&assets.join("doc.md0.png"));
        let link1 = link_path(&assets.join("doc.md1.png"));
        assert_eq!(
            text,
            format!("x\n<img src=\"{link0}\">\ny\n<img src=\"{link1}\">\nz\n")
        );
    }

    #[tokio::test]
    async fn failure_stops_remaining_blocks() {
        let raw = "```mermaid\nok\n```\n```mermaid\nboom\n```\n```mermaid\nnever\n```\n";
        let (dir, config, doc) = setup(raw);
        let renderer = ScriptedRenderer::default();
        let mut written = Vec::new();

        let err = transform_document(&renderer, &doc, raw, &config, &mut written)
            .await
            .unwrap_err();

        match err {
            Md2PngError::Render { ordinal, .. } => assert_eq!(ordinal, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*renderer.seen.lock().unwrap(), vec!["ok", "boom"]);
        assert_eq!(written, vec![dir.path().join("assets").join("doc.md0.png")]);
        assert!(!dir.path().join("assets").join("doc.md2.png").exists());
    }

    #[tokio::test]
    async fn document_without_diagrams_is_unchanged() {
        let raw = "# Title\n\n```rust\nfn main() {}\n```\n";
        let (_dir, config, doc) = setup(raw);
        let mut written = Vec::new();
        let renderer = ScriptedRenderer::default();
        let text = transform_document(&renderer, &doc, raw, &config, &mut written)
            .await
            .unwrap();
        assert_eq!(text, raw);
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn missing_assets_dir_is_write_error() {
        let raw = "```mermaid\nA\n```\n";
        let (dir, config, doc) = setup(raw);
        std::fs::remove_dir(dir.path().join("assets")).unwrap();
        let renderer = ScriptedRenderer::default();
        let err = transform_document(&renderer, &doc, raw, &config, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PngError::WriteFailed { .. }));
    }
}
