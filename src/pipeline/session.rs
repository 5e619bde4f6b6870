//! The shared rendering session: one browser process, one page per diagram.
//!
//! ## Why one process, many pages?
//!
//! Starting Chrome costs far more than rendering a diagram. The session
//! starts the browser once per batch and opens a short-lived page for every
//! diagram, so no state (library config, injected CSS, a half-rendered
//! `<svg>`) can leak from one diagram into the next.
//!
//! ## Render steps
//!
//! ```text
//! new page ─▶ viewport ─▶ hosting page ─▶ background ─▶ run library
//!          ─▶ bounding box ─▶ clipped screenshot ─▶ close page
//! ```
//!
//! Each render runs under a deadline. The page is closed on every path,
//! including errors and timeouts.
//!
//! [`DiagramRenderer`] is the seam the document transformer depends on, so
//! the rest of the pipeline can be exercised without a browser.

use crate::config::{LaunchOptions, RenderConfig, ScriptSource};
use crate::error::{LaunchError, RenderError};
use crate::pipeline::capture::inspect_png;
use crate::pipeline::host::{self, BoundingBox, HostPage};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default per-diagram render deadline.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// A rendered diagram.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// PNG bytes, cropped to [`Self::bounding_box`].
    pub image: Vec<u8>,
    /// Where the graphic sat on the page, in CSS pixels.
    pub bounding_box: BoundingBox,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// `true` when the PNG kept an alpha channel.
    pub has_alpha: bool,
}

/// Turns one diagram definition into a PNG.
///
/// Implementations must not carry state from one call into the next.
pub trait DiagramRenderer: Send + Sync {
    fn render(
        &self,
        source: &str,
        config: &RenderConfig,
    ) -> impl Future<Output = Result<RenderResult, RenderError>> + Send;
}

/// A running browser plus the hosting page every diagram is rendered on.
pub struct RenderSession {
    browser: Browser,
    handler: JoinHandle<()>,
    host: HostPage,
    render_timeout: Duration,
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("host", &self.host.url())
            .field("render_timeout", &self.render_timeout)
            .finish_non_exhaustive()
    }
}

impl RenderSession {
    /// Start the browser and write the hosting page.
    pub async fn open(
        launch: &LaunchOptions,
        script: &ScriptSource,
    ) -> Result<Self, LaunchError> {
        for key in launch.ignored.keys() {
            warn!("Ignoring unsupported launch option '{}'", key);
        }

        let executable = resolve_executable(launch)?;
        info!("Launching browser: {}", executable.display());

        let config = browser_config(launch, executable)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| LaunchError::Spawn(e.to_string()))?;

        // The DevTools connection only makes progress while its handler is
        // polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("DevTools handler event error: {}", e);
                }
            }
        });

        let host = match HostPage::write(script) {
            Ok(host) => host,
            Err(e) => {
                let mut browser = browser;
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(e);
            }
        };
        debug!("Hosting page written to {}", host.path().display());

        Ok(Self {
            browser,
            handler,
            host,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        })
    }

    /// Override the per-diagram deadline. A zero duration disables it.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Shut the browser down and wait for the process to exit.
    pub async fn close(mut self) -> Result<(), LaunchError> {
        debug!("Closing browser");
        let closed = self.browser.close().await;
        let waited = self.browser.wait().await;
        let _ = self.handler.await;
        closed.map_err(|e| LaunchError::Spawn(format!("browser did not close cleanly: {e}")))?;
        waited.map_err(|e| LaunchError::Spawn(format!("browser did not exit: {e}")))?;
        Ok(())
    }

    async fn render_on(
        &self,
        page: &Page,
        source: &str,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(config.width),
            i64::from(config.height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| RenderError::SurfaceFailed {
            detail: format!("set viewport: {e}"),
        })?;

        page.goto(self.host.url())
            .await
            .map_err(|e| RenderError::HostLoadFailed {
                detail: e.to_string(),
            })?;

        let loaded = evaluate(page, host::library_probe_script())
            .await
            .map_err(|detail| RenderError::HostLoadFailed { detail })?;
        if loaded != Value::Bool(true) {
            return Err(RenderError::HostLoadFailed {
                detail: "rendering library did not load".into(),
            });
        }

        evaluate(page, &host::background_script(&config.background_color))
            .await
            .map_err(|detail| RenderError::SurfaceFailed { detail })?;

        let script = host::render_script(
            source,
            &config.mermaid_config(),
            config.extra_style.as_deref(),
        );
        match evaluate(page, &script).await {
            Ok(Value::Null) => {}
            Ok(Value::String(message)) => return Err(RenderError::NoGraphic { detail: message }),
            Ok(other) => {
                return Err(RenderError::NoGraphic {
                    detail: format!("unexpected render result: {other}"),
                })
            }
            Err(detail) => return Err(RenderError::NoGraphic { detail }),
        }

        let bbox_value = evaluate(page, &host::bounding_box_script())
            .await
            .map_err(|detail| RenderError::NoGraphic { detail })?;
        let bounding_box = crop_region(bbox_value)?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport {
                x: bounding_box.x,
                y: bounding_box.y,
                width: bounding_box.width,
                height: bounding_box.height,
                scale: 1.0,
            })
            .omit_background(config.is_transparent())
            .capture_beyond_viewport(true)
            .build();
        let image = page
            .screenshot(params)
            .await
            .map_err(|e| RenderError::CaptureFailed {
                detail: e.to_string(),
            })?;

        let info = inspect_png(&image)?;
        Ok(RenderResult {
            image,
            bounding_box,
            pixel_width: info.width,
            pixel_height: info.height,
            has_alpha: info.has_alpha,
        })
    }
}

impl DiagramRenderer for RenderSession {
    async fn render(
        &self,
        source: &str,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        let secs = self.render_timeout.as_secs();
        let deadline = (!self.render_timeout.is_zero())
            .then(|| Instant::now() + self.render_timeout);

        // A target the browser created after `new_page` timed out has no
        // handle here and is only reclaimed when the browser closes.
        let page = match within(deadline, self.browser.new_page("about:blank")).await {
            Some(Ok(page)) => page,
            Some(Err(e)) => {
                return Err(RenderError::SurfaceFailed {
                    detail: e.to_string(),
                })
            }
            None => return Err(RenderError::Timeout { secs }),
        };

        let result = within(deadline, self.render_on(&page, source, config))
            .await
            .unwrap_or(Err(RenderError::Timeout { secs }));

        if let Err(e) = page.close().await {
            warn!("Failed to close rendering page: {}", e);
        }

        if let Ok(ref r) = result {
            debug!(
                "Rendered {}x{} px diagram (bbox {:.1}x{:.1})",
                r.pixel_width, r.pixel_height, r.bounding_box.width, r.bounding_box.height
            );
        }
        result
    }
}

/// Turn the page's bounding-box result into the screenshot clip.
///
/// `null` means the container holds no `<svg>`; a box without area would
/// produce an empty image, so both fail the block.
fn crop_region(value: Value) -> Result<BoundingBox, RenderError> {
    if value.is_null() {
        return Err(RenderError::NoGraphic {
            detail: "container holds no <svg> element".into(),
        });
    }
    let bounding_box: BoundingBox =
        serde_json::from_value(value).map_err(|e| RenderError::NoGraphic {
            detail: format!("unreadable bounding box: {e}"),
        })?;
    if !bounding_box.has_area() {
        return Err(RenderError::EmptyBoundingBox {
            width: bounding_box.width,
            height: bounding_box.height,
        });
    }
    Ok(bounding_box)
}

/// Run `fut` to completion, or until `deadline` passes (`None`).
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Evaluate `expression`, awaiting promises, and return its JSON value.
async fn evaluate(page: &Page, expression: &str) -> Result<Value, String> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()?;
    let result = page.evaluate(params).await.map_err(|e| e.to_string())?;
    Ok(result.value().cloned().unwrap_or(Value::Null))
}

fn resolve_executable(launch: &LaunchOptions) -> Result<PathBuf, LaunchError> {
    match launch.executable_path {
        Some(ref path) => {
            if path.is_file() {
                Ok(path.clone())
            } else {
                Err(LaunchError::BrowserNotFound(format!(
                    "Configured browser executable '{}' doesn't exist",
                    path.display()
                )))
            }
        }
        None => chrome_locate::find_browser()
            .map_err(|e| LaunchError::BrowserNotFound(e.to_string())),
    }
}

fn browser_config(
    launch: &LaunchOptions,
    executable: PathBuf,
) -> Result<BrowserConfig, LaunchError> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(executable)
        .args(launch.args.iter().cloned());
    if !launch.sandbox {
        builder = builder.no_sandbox();
    }
    if !launch.headless {
        builder = builder.with_head();
    }
    if let Some(ref dir) = launch.user_data_dir {
        builder = builder.user_data_dir(dir);
    }
    if let Some(ms) = launch.timeout {
        builder = builder
            .request_timeout(Duration::from_millis(ms))
            .launch_timeout(Duration::from_millis(ms));
    }
    builder.build().map_err(LaunchError::InvalidOptions)
}
