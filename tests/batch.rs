//! Batch pipeline tests that run without a browser.
//!
//! A fake [`DiagramRenderer`] produces real PNGs with the `image` crate, so
//! discovery, extraction, image writing, substitution, and the failure
//! policies are exercised end to end on a scratch directory.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use mermaid_md2png::pipeline::input::discover_documents;
use mermaid_md2png::pipeline::substitute::link_path;
use mermaid_md2png::{
    process_batch, BatchConfig, BatchProgressCallback, BatchReport, BoundingBox, DiagramRenderer,
    DocumentError, FailurePolicy, LinkStyle, Md2PngError, ProgressCallback, RenderConfig,
    RenderError, RenderResult,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

const DIAGRAM: &str = "graph TD; A-->B;";
const INVALID: &str = "not a diagram";

/// Renders any source except [`INVALID`] into a small PNG whose width grows
/// with the source length.
#[derive(Default)]
struct FakeRenderer {
    calls: Mutex<Vec<String>>,
}

impl FakeRenderer {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DiagramRenderer for FakeRenderer {
    async fn render(
        &self,
        source: &str,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        self.calls.lock().unwrap().push(source.to_string());
        if source.trim() == INVALID {
            return Err(RenderError::NoGraphic {
                detail: "Parse error on line 1".into(),
            });
        }

        let width = 20 + source.len() as u32;
        let height = 10;
        let img = if config.is_transparent() {
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
        };
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode fake PNG");

        Ok(RenderResult {
            image: bytes,
            bounding_box: BoundingBox {
                x: 8.0,
                y: 8.0,
                width: f64::from(width),
                height: f64::from(height),
            },
            pixel_width: width,
            pixel_height: height,
            has_alpha: config.is_transparent(),
        })
    }
}

fn fence(source: &str) -> String {
    format!("```mermaid\n{source}\n```")
}

/// Scratch input directory with the given documents plus output directories.
fn input_with(docs: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in docs {
        std::fs::write(dir.path().join(name), text).unwrap();
    }
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::create_dir(dir.path().join("dist")).unwrap();
    dir
}

async fn run(
    renderer: &FakeRenderer,
    config: &BatchConfig,
) -> Result<BatchReport, Md2PngError> {
    let docs = discover_documents(&config.input_dir, &config.document_suffix)
        .await
        .unwrap();
    process_batch(renderer, config, &docs).await
}

fn asset(dir: &Path, name: &str) -> PathBuf {
    dir.join("assets").join(name)
}

fn dist(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join("dist").join(name)).unwrap()
}

/// Every `src="…"` value in `text`.
fn image_sources(text: &str) -> Vec<String> {
    text.split("<img src=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(str::to_string)
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_diagram_is_rendered_and_replaced() {
    let doc = format!("# Flow\n\nBefore.\n\n{}\n\nAfter.\n", fence(DIAGRAM));
    let dir = input_with(&[("a.md", &doc)]);
    let config = BatchConfig::builder(dir.path()).build().unwrap();
    let renderer = FakeRenderer::default();

    let report = run(&renderer, &config).await.unwrap();

    let png = asset(dir.path(), "a.md0.png");
    let img = image::open(&png).expect("a.md0.png should be a PNG");
    assert!(img.width() > 0 && img.height() > 0);

    let expected_link = link_path(&png);
    assert_eq!(
        dist(dir.path(), "a.md"),
        format!("# Flow\n\nBefore.\n\n<img src=\"{expected_link}\">\n\nAfter.\n")
    );

    assert_eq!(renderer.calls(), vec![DIAGRAM]);
    assert_eq!(report.stats.total_documents, 1);
    assert_eq!(report.stats.transformed_documents, 1);
    assert_eq!(report.stats.rendered_diagrams, 1);
    assert_eq!(report.documents[0].images, vec![png]);
    assert_eq!(report.documents[0].diagrams, 1);
}

#[tokio::test]
async fn identical_diagrams_get_separate_images() {
    let doc = format!("{}\n\nmiddle\n\n{}\n", fence(DIAGRAM), fence(DIAGRAM));
    let dir = input_with(&[("doc.md", &doc)]);
    let config = BatchConfig::builder(dir.path()).build().unwrap();

    run(&FakeRenderer::default(), &config).await.unwrap();

    let first = asset(dir.path(), "doc.md0.png");
    let second = asset(dir.path(), "doc.md1.png");
    assert!(first.is_file());
    assert!(second.is_file());
    assert_eq!(
        dist(dir.path(), "doc.md"),
        format!(
            "<img src=\"{}\">\n\nmiddle\n\n<img src=\"{}\">\n",
            link_path(&first),
            link_path(&second)
        )
    );
}

#[tokio::test]
async fn every_reference_points_at_an_existing_image() {
    let a = format!("{}\ntext\n{}\n", fence("graph LR; X-->Y;"), fence(DIAGRAM));
    let b = format!("~~~mermaid\nsequenceDiagram\n  A->>B: hi\n~~~\n\n{}\n", fence(DIAGRAM));
    let dir = input_with(&[("a.md", &a), ("b.md", &b), ("c.md", "no diagrams\n")]);
    let config = BatchConfig::builder(dir.path()).build().unwrap();

    let report = run(&FakeRenderer::default(), &config).await.unwrap();
    assert_eq!(report.stats.rendered_diagrams, 4);

    for name in ["a.md", "b.md", "c.md"] {
        for src in image_sources(&dist(dir.path(), name)) {
            assert!(Path::new(&src).is_file(), "{name}: {src} should exist");
        }
    }
    assert_eq!(dist(dir.path(), "c.md"), "no diagrams\n");
}

#[tokio::test]
async fn relative_links_resolve_from_dist() {
    let dir = input_with(&[("a.md", &fence(DIAGRAM))]);
    let config = BatchConfig::builder(dir.path())
        .link_style(LinkStyle::RelativeToDocument)
        .build()
        .unwrap();

    run(&FakeRenderer::default(), &config).await.unwrap();

    let text = dist(dir.path(), "a.md");
    assert_eq!(text, "<img src=\"../assets/a.md0.png\">");
    for src in image_sources(&text) {
        assert!(dir.path().join("dist").join(&src).is_file());
    }
}

#[tokio::test]
async fn non_documents_and_unclosed_fences_are_left_alone() {
    let unclosed = "intro\n```mermaid\ngraph TD; A-->B;\n";
    let dir = input_with(&[("open.md", unclosed), ("notes.txt", &fence(DIAGRAM))]);
    let config = BatchConfig::builder(dir.path()).build().unwrap();
    let renderer = FakeRenderer::default();

    let report = run(&renderer, &config).await.unwrap();

    assert!(renderer.calls().is_empty());
    assert_eq!(report.stats.total_documents, 1);
    assert_eq!(dist(dir.path(), "open.md"), unclosed);
    assert!(!dir.path().join("dist").join("notes.txt").exists());
}

// ── Failure policies ─────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_diagram_aborts_the_batch() {
    let bad = format!("{}\n{}\n{}\n", fence(DIAGRAM), fence(INVALID), fence(DIAGRAM));
    let dir = input_with(&[
        ("a.md", &fence(DIAGRAM)),
        ("b.md", &bad),
        ("c.md", &fence(DIAGRAM)),
    ]);
    let config = BatchConfig::builder(dir.path()).build().unwrap();
    let renderer = FakeRenderer::default();

    let err = run(&renderer, &config).await.unwrap_err();

    match err {
        Md2PngError::Render {
            ref document,
            ordinal,
            ref source,
        } => {
            assert!(document.ends_with("b.md"));
            assert_eq!(ordinal, 1);
            assert!(matches!(source, RenderError::NoGraphic { .. }));
        }
        ref other => panic!("expected a render error, got {other}"),
    }

    // a.md finished; b.md stopped at its bad block; c.md never started.
    assert_eq!(renderer.calls(), vec![DIAGRAM, DIAGRAM, INVALID]);
    assert!(dir.path().join("dist").join("a.md").is_file());
    assert!(!dir.path().join("dist").join("b.md").exists());
    assert!(!dir.path().join("dist").join("c.md").exists());
    // Images written before the failure are kept.
    assert!(asset(dir.path(), "b.md0.png").is_file());
    assert!(!asset(dir.path(), "b.md2.png").exists());
}

#[tokio::test]
async fn skip_document_policy_continues() {
    let dir = input_with(&[
        ("a.md", &fence(INVALID)),
        ("b.md", &fence(DIAGRAM)),
    ]);
    let config = BatchConfig::builder(dir.path())
        .failure_policy(FailurePolicy::SkipDocument)
        .build()
        .unwrap();

    let report = run(&FakeRenderer::default(), &config).await.unwrap();

    assert_eq!(report.stats.total_documents, 2);
    assert_eq!(report.stats.transformed_documents, 1);
    assert_eq!(report.stats.failed_documents, 1);

    let failed = &report.documents[0];
    assert_eq!(failed.name, "a.md");
    assert!(failed.output.is_none());
    assert!(matches!(
        failed.error,
        Some(DocumentError::Render { ordinal: 0, .. })
    ));
    assert!(!dir.path().join("dist").join("a.md").exists());

    let ok = &report.documents[1];
    assert_eq!(ok.output.as_deref(), Some(dir.path().join("dist").join("b.md").as_path()));
    assert!(ok.error.is_none());
}

// ── Config pass-through, progress, report ────────────────────────────────────

#[tokio::test]
async fn transparent_background_reaches_renderer() {
    let dir = input_with(&[("a.md", &fence(DIAGRAM))]);
    let render = RenderConfig::builder()
        .background_color("transparent")
        .build()
        .unwrap();
    let config = BatchConfig::builder(dir.path()).render(render).build().unwrap();

    run(&FakeRenderer::default(), &config).await.unwrap();

    let img = image::open(asset(dir.path(), "a.md0.png")).unwrap();
    assert!(img.color().has_alpha());
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl BatchProgressCallback for Recorder {
    fn on_batch_start(&self, total_documents: usize) {
        self.events.lock().unwrap().push(format!("start {total_documents}"));
    }
    fn on_document_start(&self, document: &str, index: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("doc {document} {index}/{total}"));
    }
    fn on_diagram_rendered(&self, document: &str, ordinal: usize, _image: &Path) {
        self.events
            .lock()
            .unwrap()
            .push(format!("img {document} {ordinal}"));
    }
    fn on_document_complete(&self, document: &str, diagrams: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ok {document} {diagrams}"));
    }
    fn on_document_error(&self, document: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err {document}"));
    }
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_documents}"));
    }
}

#[tokio::test]
async fn progress_events_follow_processing_order() {
    let two = format!("{}\n{}\n", fence(DIAGRAM), fence(DIAGRAM));
    let dir = input_with(&[("b.md", &fence(INVALID)), ("a.md", &two)]);
    let recorder = Arc::new(Recorder::default());
    let config = BatchConfig::builder(dir.path())
        .failure_policy(FailurePolicy::SkipDocument)
        .progress_callback(recorder.clone() as ProgressCallback)
        .build()
        .unwrap();

    run(&FakeRenderer::default(), &config).await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 2",
            "doc a.md 1/2",
            "img a.md 0",
            "img a.md 1",
            "ok a.md 2",
            "doc b.md 2/2",
            "err b.md",
            "done 1/2",
        ]
    );
}

#[tokio::test]
async fn report_serialises_to_json() {
    let dir = input_with(&[("a.md", &fence(DIAGRAM)), ("b.md", &fence(INVALID))]);
    let config = BatchConfig::builder(dir.path())
        .failure_policy(FailurePolicy::SkipDocument)
        .build()
        .unwrap();

    let report = run(&FakeRenderer::default(), &config).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["stats"]["rendered_diagrams"], 1);
    assert_eq!(json["documents"][0]["name"], "a.md");
    assert!(json["documents"][1]["error"]["Render"].is_object());

    let back: BatchReport = serde_json::from_value(json).unwrap();
    assert_eq!(back.images().count(), 1);
}
