//! Configuration types for a diagram batch.
//!
//! Two layers mirror the two things a run needs:
//!
//! * [`RenderConfig`] — how each diagram looks (theme, surface size,
//!   background, stylesheet override, extra initializer options). Immutable
//!   once built and shared by reference across every render in the batch.
//! * [`BatchConfig`] — where documents come from and go to, how the browser
//!   is launched, and what happens when a document fails.
//!
//! Both are built via builders so callers set only what they care about and
//! rely on documented defaults for the rest.

use crate::error::Md2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default rendering library location used by the hosting page.
pub const DEFAULT_MERMAID_URL: &str = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";

/// Background value that makes captured images keep an alpha channel.
pub const TRANSPARENT: &str = "transparent";

// ── RenderConfig ─────────────────────────────────────────────────────────

/// How every diagram in the batch is rendered.
///
/// Built via [`RenderConfig::builder()`] or [`RenderConfig::default()`].
///
/// # Example
/// ```rust
/// use mermaid_md2png::{RenderConfig, Theme};
///
/// let config = RenderConfig::builder()
///     .theme(Theme::Forest)
///     .width(1024)
///     .background_color("transparent")
///     .build()
///     .unwrap();
/// assert!(config.is_transparent());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Mermaid theme. Default: [`Theme::Default`].
    pub theme: Theme,

    /// Surface width in CSS pixels. Default: 800.
    ///
    /// Only the viewport the diagram is laid out in; the captured image is
    /// cropped to the diagram's own bounding box.
    pub width: u32,

    /// Surface height in CSS pixels. Default: 600.
    pub height: u32,

    /// Page background: any CSS colour, or `"transparent"`. Default: `"white"`.
    pub background_color: String,

    /// Stylesheet injected into every hosting page before rendering.
    pub extra_style: Option<String>,

    /// Extra keys merged over `{ "theme": … }` for the library initializer.
    pub engine_options: Option<Map<String, Value>>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            width: 800,
            height: 600,
            background_color: "white".to_string(),
            extra_style: None,
            engine_options: None,
        }
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` when captures should omit the page background.
    pub fn is_transparent(&self) -> bool {
        self.background_color.trim().eq_ignore_ascii_case(TRANSPARENT)
    }

    /// The object handed to `mermaid.initialize`.
    ///
    /// Starts from `{ "theme": <theme> }`; keys from [`Self::engine_options`]
    /// replace same-named keys (a shallow merge). `startOnLoad` is always
    /// forced off because rendering is triggered explicitly per surface.
    pub fn mermaid_config(&self) -> Value {
        let mut merged = Map::new();
        merged.insert("theme".into(), Value::String(self.theme.as_str().into()));
        if let Some(ref extra) = self.engine_options {
            for (k, v) in extra {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged.insert("startOnLoad".into(), Value::Bool(false));
        Value::Object(merged)
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn theme(mut self, theme: Theme) -> Self {
        self.config.theme = theme;
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.config.width = width;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.config.height = height;
        self
    }

    pub fn background_color(mut self, color: impl Into<String>) -> Self {
        self.config.background_color = color.into();
        self
    }

    pub fn extra_style(mut self, css: impl Into<String>) -> Self {
        self.config.extra_style = Some(css.into());
        self
    }

    pub fn engine_options(mut self, options: Map<String, Value>) -> Self {
        self.config.engine_options = Some(options);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, Md2PngError> {
        let c = &self.config;
        if c.width == 0 || c.height == 0 {
            return Err(Md2PngError::InvalidConfig(format!(
                "Width and height must be positive, got {}x{}",
                c.width, c.height
            )));
        }
        if c.background_color.trim().is_empty() {
            return Err(Md2PngError::InvalidConfig(
                "Background colour must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Built-in Mermaid themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Forest,
    Dark,
    Neutral,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Forest => "forest",
            Theme::Dark => "dark",
            Theme::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Md2PngError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Theme::Default),
            "forest" => Ok(Theme::Forest),
            "dark" => Ok(Theme::Dark),
            "neutral" => Ok(Theme::Neutral),
            other => Err(Md2PngError::InvalidConfig(format!(
                "Theme must be one of default, forest, dark, neutral; got '{other}'"
            ))),
        }
    }
}

// ── LaunchOptions ────────────────────────────────────────────────────────

/// How the shared headless browser is started.
///
/// Deserialised from the engine-options JSON file; field names are camelCase
/// so files written for other headless-Chrome tools mostly carry over.
/// Keys this crate does not understand land in [`Self::ignored`] and are
/// logged, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchOptions {
    /// Browser executable. If `None`, discovered via `chrome-locate`.
    pub executable_path: Option<PathBuf>,

    /// Extra command-line switches passed to the browser.
    pub args: Vec<String>,

    /// Run without a visible window. Default: true.
    pub headless: bool,

    /// Keep Chrome's sandbox enabled. Default: true.
    ///
    /// Chrome refuses to start sandboxed as root, which is the usual state
    /// inside containers; set `false` there.
    pub sandbox: bool,

    /// Profile directory. If `None`, the browser uses a throwaway profile.
    pub user_data_dir: Option<PathBuf>,

    /// DevTools request timeout in milliseconds.
    pub timeout: Option<u64>,

    #[serde(flatten, skip_serializing)]
    pub ignored: BTreeMap<String, Value>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable_path: None,
            args: Vec::new(),
            headless: true,
            sandbox: true,
            user_data_dir: None,
            timeout: None,
            ignored: BTreeMap::new(),
        }
    }
}

// ── BatchConfig ──────────────────────────────────────────────────────────

/// Where the hosting page loads the rendering library from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptSource {
    /// Remote URL, loaded over the network by the browser.
    Url(String),
    /// Local `mermaid.min.js`, copied next to the hosting page.
    File(PathBuf),
}

impl Default for ScriptSource {
    fn default() -> Self {
        ScriptSource::Url(DEFAULT_MERMAID_URL.to_string())
    }
}

/// What the batch does when one document fails.
///
/// | Policy | Behaviour |
/// |--------|-----------|
/// | `Abort` | Stop the batch and return the error (default) |
/// | `SkipDocument` | Record the error, skip that document's output, continue |
///
/// Under both policies the browser is shut down exactly once, and images
/// already written for the failing document stay on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    #[default]
    Abort,
    SkipDocument,
}

/// How image references are spelled in transformed documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStyle {
    /// `<input>/assets/<doc><n>.png`, built from the input path as given. (default)
    #[default]
    AsWritten,
    /// `../assets/<doc><n>.png`, resolvable from inside the dist directory.
    RelativeToDocument,
}

/// Configuration for one batch run.
///
/// Built via [`BatchConfig::builder()`].
///
/// # Example
/// ```rust
/// use mermaid_md2png::{BatchConfig, FailurePolicy};
///
/// let config = BatchConfig::builder("docs")
///     .failure_policy(FailurePolicy::SkipDocument)
///     .render_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.assets_dir(), std::path::Path::new("docs/assets"));
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Directory scanned (non-recursively) for documents.
    pub input_dir: PathBuf,

    /// Filename suffix a document must end with. Default: `".md"`.
    pub document_suffix: String,

    /// Name of the image directory under `input_dir`. Default: `"assets"`.
    pub assets_dir_name: String,

    /// Name of the transformed-document directory under `input_dir`. Default: `"dist"`.
    pub dist_dir_name: String,

    /// Appearance of every diagram.
    pub render: RenderConfig,

    /// Browser launch options.
    pub launch: LaunchOptions,

    /// Rendering library location.
    pub script: ScriptSource,

    /// Per-diagram timeout in seconds; 0 disables it. Default: 60.
    pub render_timeout_secs: u64,

    /// Default: [`FailurePolicy::Abort`].
    pub failure_policy: FailurePolicy,

    /// Default: [`LinkStyle::AsWritten`].
    pub link_style: LinkStyle,

    /// Optional observer for per-document events.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("input_dir", &self.input_dir)
            .field("document_suffix", &self.document_suffix)
            .field("assets_dir_name", &self.assets_dir_name)
            .field("dist_dir_name", &self.dist_dir_name)
            .field("render", &self.render)
            .field("launch", &self.launch)
            .field("script", &self.script)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("failure_policy", &self.failure_policy)
            .field("link_style", &self.link_style)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for the given input directory.
    pub fn builder(input_dir: impl Into<PathBuf>) -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: BatchConfig {
                input_dir: input_dir.into(),
                document_suffix: ".md".to_string(),
                assets_dir_name: "assets".to_string(),
                dist_dir_name: "dist".to_string(),
                render: RenderConfig::default(),
                launch: LaunchOptions::default(),
                script: ScriptSource::default(),
                render_timeout_secs: 60,
                failure_policy: FailurePolicy::default(),
                link_style: LinkStyle::default(),
                progress_callback: None,
            },
        }
    }

    /// `<input>/assets`
    pub fn assets_dir(&self) -> PathBuf {
        self.input_dir.join(&self.assets_dir_name)
    }

    /// `<input>/dist`
    pub fn dist_dir(&self) -> PathBuf {
        self.input_dir.join(&self.dist_dir_name)
    }

    /// Check that the input directory exists and is a directory.
    pub fn validate_input(&self) -> Result<(), Md2PngError> {
        let path = &self.input_dir;
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Md2PngError::InputNotADirectory { path: path.clone() }),
            Err(_) => Err(Md2PngError::InputNotFound { path: path.clone() }),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn render(mut self, render: RenderConfig) -> Self {
        self.config.render = render;
        self
    }

    pub fn launch(mut self, launch: LaunchOptions) -> Self {
        self.config.launch = launch;
        self
    }

    pub fn script(mut self, script: ScriptSource) -> Self {
        self.config.script = script;
        self
    }

    pub fn document_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.document_suffix = suffix.into();
        self
    }

    pub fn assets_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.assets_dir_name = name.into();
        self
    }

    pub fn dist_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.dist_dir_name = name.into();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn link_style(mut self, style: LinkStyle) -> Self {
        self.config.link_style = style;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Does not touch the file system; see [`BatchConfig::validate_input`].
    pub fn build(self) -> Result<BatchConfig, Md2PngError> {
        let c = &self.config;
        if c.document_suffix.is_empty() {
            return Err(Md2PngError::InvalidConfig(
                "Document suffix must not be empty".into(),
            ));
        }
        for (what, name) in [("assets", &c.assets_dir_name), ("dist", &c.dist_dir_name)] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(Md2PngError::InvalidConfig(format!(
                    "The {what} directory name must be a single path component, got '{name}'"
                )));
            }
        }
        if c.assets_dir_name == c.dist_dir_name {
            return Err(Md2PngError::InvalidConfig(
                "Assets and dist directories must differ".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── File loaders ─────────────────────────────────────────────────────────

/// Load the JSON object merged into the library initializer config.
pub fn load_engine_options(path: &Path) -> Result<Map<String, Value>, Md2PngError> {
    const KIND: &str = "Configuration";
    let text = read_config_file(KIND, path)?;
    match parse_json(KIND, path, &text)? {
        Value::Object(map) => Ok(map),
        other => Err(Md2PngError::InvalidConfigFile {
            kind: KIND,
            path: path.to_path_buf(),
            detail: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

/// Load browser launch options from a JSON file.
pub fn load_launch_options(path: &Path) -> Result<LaunchOptions, Md2PngError> {
    const KIND: &str = "Launch options";
    let text = read_config_file(KIND, path)?;
    serde_json::from_str(&text).map_err(|e| Md2PngError::InvalidConfigFile {
        kind: KIND,
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Load the stylesheet injected into every hosting page.
pub fn load_stylesheet(path: &Path) -> Result<String, Md2PngError> {
    read_config_file("CSS", path)
}

/// Resolve a local rendering-library file to an absolute path.
pub fn resolve_script_file(path: &Path) -> Result<ScriptSource, Md2PngError> {
    let abs = std::fs::canonicalize(path).map_err(|_| Md2PngError::ConfigFileNotFound {
        kind: "Script",
        path: path.to_path_buf(),
    })?;
    Ok(ScriptSource::File(abs))
}

fn read_config_file(kind: &'static str, path: &Path) -> Result<String, Md2PngError> {
    if !path.is_file() {
        return Err(Md2PngError::ConfigFileNotFound {
            kind,
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| Md2PngError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn parse_json(kind: &'static str, path: &Path, text: &str) -> Result<Value, Md2PngError> {
    serde_json::from_str(text).map_err(|e| Md2PngError::InvalidConfigFile {
        kind,
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
