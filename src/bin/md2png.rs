//! CLI binary for mermaid-md2png.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! loads the referenced config files, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use mermaid_md2png::{
    load_engine_options, load_launch_options, load_stylesheet, resolve_script_file, run_batch,
    BatchConfig, BatchProgressCallback, FailurePolicy, LaunchOptions, LinkStyle, ProgressCallback,
    RenderConfig, ScriptSource, Theme,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one bar over documents, one log line per
/// document and a dim line per diagram.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the document currently being processed.
    doc_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` tells us how many documents there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            doc_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn doc_elapsed(&self) -> String {
        let secs = self
            .doc_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering diagrams in {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, document: &str, _index: usize, _total: usize) {
        if let Ok(mut t) = self.doc_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(document.to_string());
    }

    fn on_diagram_rendered(&self, _document: &str, ordinal: usize, image: &Path) {
        self.bar.println(dim(&format!(
            "      #{ordinal:<3} → {}",
            image.display()
        )));
    }

    fn on_document_complete(&self, document: &str, diagrams: usize) {
        self.bar.println(format!(
            "  {} {:<32}  {:<12}  {}",
            green("✓"),
            document,
            dim(&format!("{diagrams:>3} diagrams")),
            self.doc_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, document: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep the log line to one terminal row.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            document,
            red(&msg),
            self.doc_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents transformed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents transformed  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every ```mermaid fence in docs/*.md
  md2png -i docs

  # Dark theme, transparent background
  md2png -i docs -t dark -b transparent

  # Extra Mermaid config and a stylesheet
  md2png -i docs -c mermaid.json -C diagrams.css

  # Run as root inside a container
  echo '{"sandbox": false}' > chrome.json
  md2png -i docs -p chrome.json

  # Keep going past broken diagrams, print a JSON report
  md2png -i docs --keep-going --json > report.json

OUTPUT:
  <input>/assets/<document><n>.png   one image per diagram, n counts from 0
  <input>/dist/<document>            copy of the document, fences replaced
                                     by <img src="…"> tags

LAUNCH OPTIONS FILE (-p):
  executablePath   Chrome/Chromium binary to run
  args             extra command-line switches
  headless         default true
  sandbox          default true; set false when running as root
  userDataDir      profile directory
  timeout          DevTools request timeout in milliseconds

ENVIRONMENT VARIABLES:
  CHROME_PATH      Chrome/Chromium executable (skips auto-discovery)
  RUST_LOG         Log filter, e.g. mermaid_md2png=debug
  MD2PNG_*         Every flag, e.g. MD2PNG_THEME=forest
"#;

/// Render Mermaid diagrams in Markdown documents to PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "md2png",
    version,
    about = "Render Mermaid diagrams in Markdown documents to PNG images",
    long_about = "Find every ```mermaid fence in the Markdown documents of a directory, render \
each diagram with headless Chrome, save it as a PNG under <input>/assets, and write a copy of \
each document to <input>/dist with the fences replaced by image references.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the Markdown documents.
    #[arg(short, long, env = "MD2PNG_INPUT")]
    input: PathBuf,

    /// Mermaid theme.
    #[arg(short, long, env = "MD2PNG_THEME", value_enum, default_value = "default")]
    theme: ThemeArg,

    /// Rendering surface width in pixels.
    #[arg(short, long, env = "MD2PNG_WIDTH", default_value_t = 800,
          value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Rendering surface height in pixels.
    #[arg(short = 'H', long, env = "MD2PNG_HEIGHT", default_value_t = 600,
          value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Background colour, e.g. white, '#F0F0F0', or transparent.
    #[arg(short, long = "backgroundColor", visible_alias = "background-color",
          env = "MD2PNG_BACKGROUND_COLOR", default_value = "white")]
    background_color: String,

    /// JSON file merged into the Mermaid initializer config.
    #[arg(short = 'c', long = "configFile", visible_alias = "config-file",
          env = "MD2PNG_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// CSS file injected into every rendering page.
    #[arg(short = 'C', long = "cssFile", visible_alias = "css-file", env = "MD2PNG_CSS_FILE")]
    css_file: Option<PathBuf>,

    /// JSON file of browser launch options.
    #[arg(short = 'p', long = "engineConfigFile",
          visible_alias = "engine-config-file",
          env = "MD2PNG_ENGINE_CONFIG_FILE")]
    engine_config_file: Option<PathBuf>,

    /// Filename suffix of the documents to process.
    #[arg(long, env = "MD2PNG_SUFFIX", default_value = ".md")]
    suffix: String,

    /// Local mermaid.min.js to use instead of the CDN copy.
    #[arg(long, env = "MD2PNG_MERMAID_JS")]
    mermaid_js: Option<PathBuf>,

    /// Per-diagram render timeout in seconds (0 disables).
    #[arg(long, env = "MD2PNG_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Skip documents whose diagrams fail instead of stopping the batch.
    #[arg(long, env = "MD2PNG_KEEP_GOING")]
    keep_going: bool,

    /// Reference images as ../assets/… so links resolve from inside dist/.
    #[arg(long, env = "MD2PNG_RELATIVE_LINKS")]
    relative_links: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "MD2PNG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PNG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Default,
    Forest,
    Dark,
    Neutral,
}

impl From<ThemeArg> for Theme {
    fn from(v: ThemeArg) -> Self {
        match v {
            ThemeArg::Default => Theme::Default,
            ThemeArg::Forest => Theme::Forest,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Neutral => Theme::Neutral,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    // Every referenced file is loaded here so a bad path stops the run
    // before the browser is started.
    let mut config = build_config(&cli)?;
    config.validate_input()?;

    // The spinner starts ticking as soon as it exists, so it is only created
    // once the configuration is known to be good.
    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        config.progress_callback = Some(cb as ProgressCallback);
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let report = run_batch(&config)
        .await
        .with_context(|| format!("Failed to render diagrams in {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &report.stats;
        eprintln!(
            "{}  {}/{} documents  {} images  {}ms  →  {}",
            if stats.failed_documents == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.transformed_documents,
            stats.total_documents,
            stats.rendered_diagrams,
            stats.total_duration_ms,
            bold(&config.dist_dir().display().to_string()),
        );
        for doc in report.documents.iter().filter(|d| d.error.is_some()) {
            if let Some(ref err) = doc.error {
                eprintln!("   {} {}: {}", red("✗"), doc.name, err);
            }
        }
    }

    if report.stats.failed_documents > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args and referenced files to `BatchConfig`.
fn build_config(cli: &Cli) -> Result<BatchConfig> {
    let mut render = RenderConfig::builder()
        .theme(cli.theme.into())
        .width(cli.width)
        .height(cli.height)
        .background_color(cli.background_color.clone());

    if let Some(ref path) = cli.config_file {
        render = render.engine_options(load_engine_options(path)?);
    }
    if let Some(ref path) = cli.css_file {
        render = render.extra_style(load_stylesheet(path)?);
    }
    let render = render.build().context("Invalid render configuration")?;

    let launch = match cli.engine_config_file {
        Some(ref path) => load_launch_options(path)?,
        None => LaunchOptions::default(),
    };

    let script = match cli.mermaid_js {
        Some(ref path) => resolve_script_file(path)?,
        None => ScriptSource::default(),
    };

    BatchConfig::builder(&cli.input)
        .render(render)
        .launch(launch)
        .script(script)
        .document_suffix(cli.suffix.clone())
        .render_timeout_secs(cli.timeout)
        .failure_policy(if cli.keep_going {
            FailurePolicy::SkipDocument
        } else {
            FailurePolicy::Abort
        })
        .link_style(if cli.relative_links {
            LinkStyle::RelativeToDocument
        } else {
            LinkStyle::AsWritten
        })
        .build()
        .context("Invalid configuration")
}
