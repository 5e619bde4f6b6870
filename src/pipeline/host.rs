//! The hosting page and the scripts evaluated inside it.
//!
//! Every diagram is rendered on a fresh page that loads the same local HTML
//! file. The file holds one empty `#container` element and a `<script>` tag
//! that pulls in the rendering library. All per-diagram work happens through
//! the small script builders below; diagram text, theme config, and CSS are
//! always passed as JSON literals, never spliced into script source raw.
//!
//! Keeping the page and scripts here means they can be inspected in unit
//! tests without a browser.

use crate::config::ScriptSource;
use crate::error::LaunchError;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Element id the diagram definition is placed into.
pub const CONTAINER_ID: &str = "container";

/// Filename of the hosting page inside its scratch directory.
pub const HOST_PAGE_NAME: &str = "index.html";

/// Filename a local library copy is given next to the hosting page.
const LOCAL_SCRIPT_NAME: &str = "mermaid.min.js";

/// Hosting page template. `{script_src}` is replaced before writing.
const HOST_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <style>
      html, body { margin: 0; padding: 0; }
      #container { display: inline-block; }
    </style>
    <script src="{script_src}"></script>
  </head>
  <body>
    <div id="container"></div>
  </body>
</html>
"#;

/// A hosting page written to its own scratch directory.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct HostPage {
    dir: TempDir,
    url: String,
}

impl HostPage {
    /// Write the hosting page for `script` into a fresh scratch directory.
    ///
    /// A local library file is copied next to the page so it loads from the
    /// same origin as the page itself.
    pub fn write(script: &ScriptSource) -> Result<Self, LaunchError> {
        let dir = tempfile::Builder::new()
            .prefix("md2png-host-")
            .tempdir()
            .map_err(|e| LaunchError::HostPage {
                path: std::env::temp_dir(),
                source: e,
            })?;

        let script_src = match script {
            ScriptSource::Url(url) => url.clone(),
            ScriptSource::File(path) => {
                let target = dir.path().join(LOCAL_SCRIPT_NAME);
                std::fs::copy(path, &target).map_err(|e| LaunchError::HostPage {
                    path: path.clone(),
                    source: e,
                })?;
                LOCAL_SCRIPT_NAME.to_string()
            }
        };

        let page_path = dir.path().join(HOST_PAGE_NAME);
        std::fs::write(&page_path, render_host_html(&script_src)).map_err(|e| {
            LaunchError::HostPage {
                path: page_path.clone(),
                source: e,
            }
        })?;
        debug!("Hosting page written to {}", page_path.display());

        let url = file_url(&page_path);
        Ok(Self { dir, url })
    }

    /// `file://` URL of the hosting page.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Path of the hosting page on disk.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join(HOST_PAGE_NAME)
    }
}

/// Fill the hosting template with a script URL.
pub fn render_host_html(script_src: &str) -> String {
    HOST_TEMPLATE.replace("{script_src}", &escape_attr(script_src))
}

/// Build a `file://` URL for an absolute path.
pub fn file_url(path: &Path) -> String {
    let mut spelled = path.to_string_lossy().replace('\\', "/");
    if !spelled.starts_with('/') {
        // Windows drive paths: C:/x -> /C:/x
        spelled.insert(0, '/');
    }
    let mut url = String::from("file://");
    for ch in spelled.chars() {
        match ch {
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '?' => url.push_str("%3F"),
            '%' => url.push_str("%25"),
            c => url.push(c),
        }
    }
    url
}

fn escape_attr(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

// ── Page scripts ─────────────────────────────────────────────────────────

/// Evaluates to `true` once the rendering library is loaded.
pub fn library_probe_script() -> &'static str {
    "typeof window.mermaid !== 'undefined'"
}

/// Set the page background, e.g. `"white"` or `"transparent"`.
pub fn background_script(color: &str) -> String {
    format!(
        "document.body.style.background = {};",
        Value::String(color.to_string())
    )
}

/// Render `definition` into the container.
///
/// The script resolves to `null` on success and to an error message when the
/// library rejects the definition.
pub fn render_script(definition: &str, mermaid_config: &Value, css: Option<&str>) -> String {
    let definition = Value::String(definition.to_string());
    let css = css.map_or(Value::Null, |c| Value::String(c.to_string()));
    format!(
        r#"(async () => {{
  const container = document.getElementById({container});
  container.textContent = {definition};
  try {{
    window.mermaid.initialize({mermaid_config});
    const css = {css};
    if (css) {{
      const style = document.createElement('style');
      style.textContent = css;
      document.head.appendChild(style);
    }}
    await window.mermaid.run({{ nodes: [container] }});
    return null;
  }} catch (e) {{
    return String((e && e.message) || e);
  }}
}})()"#,
        container = Value::String(CONTAINER_ID.to_string()),
    )
}

/// Evaluates to the rendered graphic's bounding box, or `null` when the
/// container holds no `<svg>`.
pub fn bounding_box_script() -> String {
    format!(
        r#"(() => {{
  const svg = document.querySelector('#{CONTAINER_ID} svg');
  if (!svg) return null;
  const r = svg.getBoundingClientRect();
  return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
}})()"#
    )
}

/// Page-coordinate rectangle of the rendered graphic, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, serde::Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// `true` when the box has a positive area.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}
