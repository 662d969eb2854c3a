//! Chrome DevTools Protocol raster backend
//!
//! Renders the off-screen clone in a dedicated headless Chrome tab and
//! captures it with a clip at the requested device scale. The tab is the
//! off-screen surface: the clone is mounted into it for one pass and removed
//! again by a guard, whichever way the pass ends.

use std::sync::Arc;

use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};

use crate::dom::OffscreenClone;
use crate::rendering::style::to_hex;
use crate::rendering::{Bitmap, RasterBackend};
use crate::{Error, Result};

const CLONE_ID: &str = "__rfprint_clone";

/// Rasterizes with headless Chrome (uses the `headless_chrome` crate)
pub struct CdpRasterizer {
    // kept alive for as long as the tab is used
    _browser: Browser,
    tab: Arc<Tab>,
}

impl CdpRasterizer {
    pub fn new() -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(|e| Error::RenderFailure(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::RenderFailure(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::RenderFailure(format!("Failed to create tab: {}", e)))?;

        Ok(Self { _browser: browser, tab })
    }
}

/// Removes the clone from the tab when dropped.
struct MountedInTab<'a> {
    tab: &'a Tab,
}

impl Drop for MountedInTab<'_> {
    fn drop(&mut self) {
        let script = format!("(function(){{ const n = document.getElementById('{}'); if (n) n.remove(); }})()", CLONE_ID);
        if let Err(e) = self.tab.evaluate(&script, false) {
            warn!("failed to detach clone from tab: {}", e);
        }
    }
}

impl RasterBackend for CdpRasterizer {
    fn rasterize(&self, clone: &OffscreenClone<'_>, scale: u32) -> Result<Bitmap> {
        let region = clone.region();
        let page = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body style=\"margin:0\">\
             <div id=\"{}\" style=\"position:absolute;left:0;top:0;width:{}px;background:{}\">{}</div></body></html>",
            CLONE_ID,
            region.width,
            to_hex(region.background),
            region.markup
        );
        let url = format!(
            "data:text/html;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(page.as_bytes())
        );

        self.tab
            .navigate_to(&url)
            .map_err(|e| Error::RenderFailure(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::RenderFailure(format!("Wait for navigation failed: {}", e)))?;
        let _mounted = MountedInTab { tab: &self.tab };

        let measured = self
            .tab
            .evaluate(
                &format!("Math.ceil(document.getElementById('{}').getBoundingClientRect().height)", CLONE_ID),
                false,
            )
            .map_err(|e| Error::RenderFailure(format!("Measuring clone failed: {}", e)))?;
        let height = measured
            .value
            .as_ref()
            .and_then(|v| v.as_f64())
            .filter(|h| *h >= 1.0)
            .ok_or_else(|| Error::RenderFailure("clone has no measurable height".into()))?;
        debug!("clone measures {}x{} css px", region.width, height);

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: region.width as f64,
            height,
            scale: scale as f64,
        };
        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::RenderFailure(format!("Screenshot failed: {}", e)))?;

        let pixels = image::load_from_memory(&png)
            .map_err(|e| Error::RenderFailure(format!("Screenshot decode failed: {}", e)))?
            .to_rgba8();
        Ok(Bitmap::new(pixels))
    }

    fn name(&self) -> &'static str {
        "cdp"
    }
}
