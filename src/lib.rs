//! RFox Print
//!
//! Turns the HTML invoice preview of the agency dashboard into a paginated
//! PDF: the preview node is cloned, rasterized to one full-height bitmap,
//! sliced into page-sized bands and assembled into a document that is both
//! downloaded locally and handed to a persistence service as a base64 copy.
//!
//! # Features
//!
//! - **Block renderer** (always on): pure-Rust layout and raster, no browser
//! - **HTTP persistence** (`http`, default): stores artifacts through a REST endpoint
//! - **CDP backend** (`cdp`): rasterizes with headless Chrome instead
//!
//! # Example
//!
//! ```no_run
//! use rfprint::{DocumentMeta, ExportConfig};
//!
//! let config = ExportConfig {
//!     out_dir: "downloads".into(),
//!     ..Default::default()
//! };
//! let html = std::fs::read_to_string("invoice.html").unwrap();
//! let meta = DocumentMeta {
//!     display_name: "Acme Corp - March".into(),
//!     document_number: "INV-2024-031".into(),
//!     party_id: "client-17".into(),
//!     total: 4250.5,
//! };
//! let outcome = rfprint::export_html(&config, &html, &meta);
//! println!("{}", outcome.message());
//! ```

use std::path::{Path, PathBuf};

use image::Rgba;
use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod dom;
pub mod error;
pub mod export;
pub mod paginate;
pub mod pdf;
pub mod platform;
pub mod rendering;

// Async facade over a worker-owned pipeline
pub mod async_api;

// Chrome DevTools backend (feature-gated)
#[cfg(feature = "cdp")]
pub mod cdp;

pub use artifact::{DocumentMeta, StoredArtifact};
pub use async_api::Exporter;
pub use dom::Document;
pub use error::{Error, Result};
pub use export::{export_html, ExportOutcome, ExportPipeline, Severity};
pub use paginate::{PageGeometry, Paper};
pub use rendering::{Bitmap, BlockRasterizer, RasterBackend, RasterOptions};

/// Configuration for exports
///
/// The defaults reproduce the dashboard's behaviour: an 800 unit design
/// width captured at 2x onto A4 pages with a 10 mm margin, downloads in the
/// current directory and no persistence.
///
/// # Examples
///
/// ```
/// let cfg = rfprint::ExportConfig::default();
/// assert_eq!(cfg.design_width, 800);
/// assert_eq!(cfg.selector, "#invoice-preview");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Logical width the preview clone is forced to
    pub design_width: u32,
    /// Device pixel multiplier used for rasterization
    pub scale: u32,
    /// Paper preset
    pub paper: Paper,
    /// Uniform page margin in points
    pub margin: f32,
    /// Background fill used when the preview declares none (`#rrggbb`)
    pub background: String,
    /// CSS selector of the preview node
    pub selector: String,
    /// Directory downloads are written to
    pub out_dir: PathBuf,
    /// REST endpoint receiving stored artifacts; `None` disables persistence
    pub persist_url: Option<String>,
    /// Timeout for the persistence request in milliseconds
    pub persist_timeout_ms: u64,
    /// Optional deadline for a whole export when run through [`Exporter`]
    pub export_timeout_ms: Option<u64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            design_width: 800,
            scale: 2,
            paper: Paper::A4,
            margin: paginate::geometry::DEFAULT_MARGIN,
            background: "#ffffff".to_string(),
            selector: "#invoice-preview".to_string(),
            out_dir: PathBuf::from("."),
            persist_url: None,
            persist_timeout_ms: 30000,
            export_timeout_ms: None,
        }
    }
}

impl ExportConfig {
    /// Load a JSON configuration file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read {}: {}", path.display(), e)))?;
        let cfg: ExportConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::for_paper(self.paper, self.margin)
    }

    pub fn background_color(&self) -> Result<Rgba<u8>> {
        rendering::style::parse_color(&self.background)
            .ok_or_else(|| Error::ConfigError(format!("invalid background color {:?}", self.background)))
    }

    pub fn raster_options(&self) -> Result<RasterOptions> {
        Ok(RasterOptions {
            design_width: self.design_width,
            scale: self.scale,
            background: self.background_color()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.design_width == 0 {
            return Err(Error::ConfigError("design_width must be positive".into()));
        }
        if self.scale == 0 || self.scale > 8 {
            return Err(Error::ConfigError(format!("scale must be between 1 and 8, got {}", self.scale)));
        }
        if self.selector.trim().is_empty() {
            return Err(Error::ConfigError("selector must not be empty".into()));
        }
        self.background_color()?;
        self.geometry()
            .validate()
            .map_err(|e| Error::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.scale, 2);
        assert_eq!(config.paper, Paper::A4);
        assert!(config.persist_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ExportConfig = serde_json::from_str(r#"{"paper":"letter","persist_url":"http://localhost:9/pdf"}"#).unwrap();
        assert_eq!(cfg.paper, Paper::Letter);
        assert_eq!(cfg.design_width, 800);
        assert_eq!(cfg.geometry().width, 612.0);
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = ExportConfig { scale: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
        let cfg = ExportConfig { background: "transparent".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = ExportConfig { background: "#ffé00".into(), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
        let cfg = ExportConfig { margin: 400.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rfprint.json");
        std::fs::write(&path, r#"{"scale": 1, "selector": "main .invoice"}"#).unwrap();
        let cfg = ExportConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.scale, 1);
        assert_eq!(cfg.selector, "main .invoice");
        assert!(ExportConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
