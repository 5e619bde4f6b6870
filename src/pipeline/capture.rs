//! Screenshot checks: confirm captured bytes are a usable PNG.
//!
//! The browser hands back whatever it captured. Decoding the header here
//! turns a blank or truncated capture into a [`RenderError`] instead of an
//! unreadable file on disk, and tells us whether transparency survived.

use crate::error::RenderError;
use image::ImageFormat;
use tracing::debug;

/// What a captured PNG looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureInfo {
    pub width: u32,
    pub height: u32,
    /// `true` when the PNG carries an alpha channel.
    pub has_alpha: bool,
}

/// Decode `bytes` as PNG and report its dimensions and colour type.
pub fn inspect_png(bytes: &[u8]) -> Result<CaptureInfo, RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::CaptureFailed {
            detail: "screenshot returned no data".into(),
        });
    }

    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| {
        RenderError::CaptureFailed {
            detail: format!("screenshot is not a valid PNG: {e}"),
        }
    })?;

    let info = CaptureInfo {
        width: img.width(),
        height: img.height(),
        has_alpha: img.color().has_alpha(),
    };
    debug!(
        "Captured {}x{} px PNG ({} bytes, alpha={})",
        info.width,
        info.height,
        bytes.len(),
        info.has_alpha
    );

    if info.width == 0 || info.height == 0 {
        return Err(RenderError::CaptureFailed {
            detail: format!("screenshot is {}x{} px", info.width, info.height),
        });
    }
    Ok(info)
}
