//! Export pipeline: capture → paginate → encode → download → persist.
//!
//! Every call ends in exactly one [`ExportOutcome`]. Capture, pagination,
//! encoding and download errors are fatal and happen before anything is
//! stored. A persistence error is downgraded to a warning: the download has
//! already been handed over and is neither retried nor rolled back.

use std::path::PathBuf;

use log::{error, info, warn};

use crate::artifact::{download_filename, DocumentMeta, StoredArtifact};
use crate::dom::Document;
use crate::paginate::{self, PageGeometry};
use crate::platform::{DirectorySink, DownloadSink, NoPersistence, Persistence};
use crate::rendering::{self, BlockRasterizer, RasterBackend, RasterOptions};
use crate::{Error, ExportConfig, Result};

/// A fully assembled document, not yet handed to any boundary.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub filename: String,
    pub pdf: Vec<u8>,
    pub page_count: usize,
    pub artifact: StoredArtifact,
}

/// What the user got.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub filename: String,
    pub location: PathBuf,
    pub page_count: usize,
    pub bytes: usize,
}

/// Toast severity for the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The three outcomes a caller can observe.
#[derive(Debug)]
pub enum ExportOutcome {
    Success(DownloadReport),
    SuccessWithPersistenceWarning { download: DownloadReport, warning: Error },
    Failure(Error),
}

impl ExportOutcome {
    pub fn severity(&self) -> Severity {
        match self {
            ExportOutcome::Success(_) => Severity::Info,
            ExportOutcome::SuccessWithPersistenceWarning { .. } => Severity::Warning,
            ExportOutcome::Failure(_) => Severity::Error,
        }
    }

    /// User-facing message for the toast
    pub fn message(&self) -> String {
        match self {
            ExportOutcome::Success(d) => format!("Downloaded {} ({} pages)", d.filename, d.page_count),
            ExportOutcome::SuccessWithPersistenceWarning { download, .. } => format!(
                "Downloaded {}, but it could not be saved to the client record",
                download.filename
            ),
            ExportOutcome::Failure(_) => "Could not generate the invoice PDF".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ExportOutcome::Failure(_))
    }

    pub fn download(&self) -> Option<&DownloadReport> {
        match self {
            ExportOutcome::Success(d) | ExportOutcome::SuccessWithPersistenceWarning { download: d, .. } => Some(d),
            ExportOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ExportOutcome::Success(_) => None,
            ExportOutcome::SuccessWithPersistenceWarning { warning, .. } => Some(warning),
            ExportOutcome::Failure(e) => Some(e),
        }
    }
}

/// Owns the backend and both boundaries for a series of exports.
pub struct ExportPipeline {
    backend: Box<dyn RasterBackend>,
    downloads: Box<dyn DownloadSink>,
    persistence: Box<dyn Persistence>,
    options: RasterOptions,
    geometry: PageGeometry,
}

impl ExportPipeline {
    /// Pipeline with the block renderer, no download target other than the
    /// given sink, and no persistence.
    pub fn new(options: RasterOptions, geometry: PageGeometry, downloads: impl DownloadSink + 'static) -> Self {
        Self {
            backend: Box::new(BlockRasterizer::new()),
            downloads: Box::new(downloads),
            persistence: Box::new(NoPersistence),
            options,
            geometry,
        }
    }

    /// Build the standard pipeline from configuration: block renderer,
    /// directory downloads and HTTP persistence when a URL is configured.
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        config.validate()?;
        let mut pipeline = Self::new(
            config.raster_options()?,
            config.geometry(),
            DirectorySink::new(config.out_dir.clone()),
        );
        if let Some(url) = &config.persist_url {
            pipeline = pipeline.with_persistence(Self::http_persistence(url, config.persist_timeout_ms)?);
        }
        Ok(pipeline)
    }

    #[cfg(feature = "http")]
    fn http_persistence(url: &str, timeout_ms: u64) -> Result<crate::platform::HttpPersistence> {
        crate::platform::HttpPersistence::new(url, timeout_ms)
    }

    #[cfg(not(feature = "http"))]
    fn http_persistence(url: &str, _timeout_ms: u64) -> Result<NoPersistence> {
        Err(Error::ConfigError(format!(
            "persistence URL {} configured but the `http` feature is disabled",
            url
        )))
    }

    pub fn with_backend(mut self, backend: impl RasterBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn with_persistence(mut self, persistence: impl Persistence + 'static) -> Self {
        self.persistence = Box::new(persistence);
        self
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Capture, paginate and encode without touching either boundary.
    pub fn generate(&self, document: &Document, selector: &str, meta: &DocumentMeta) -> Result<GeneratedDocument> {
        let bitmap = rendering::capture(self.backend.as_ref(), document, selector, &self.options)?;
        let output = paginate::paginate(&bitmap, &self.geometry)?;
        let title = if meta.display_name.is_empty() { None } else { Some(meta.display_name.as_str()) };
        let pdf = output.to_pdf(title)?;
        let page_count = output.page_count();
        let artifact = StoredArtifact::from_pdf(&pdf, meta, page_count);
        Ok(GeneratedDocument {
            filename: download_filename(&meta.document_number),
            pdf,
            page_count,
            artifact,
        })
    }

    /// Run one export. Meant to be called once per user action.
    pub fn export(&self, document: &Document, selector: &str, meta: &DocumentMeta) -> ExportOutcome {
        let generated = match self.generate(document, selector, meta) {
            Ok(g) => g,
            Err(e) => {
                error!("export of {:?} failed: {}", meta.document_number, e);
                return ExportOutcome::Failure(e);
            }
        };

        let location = match self.downloads.save(&generated.filename, &generated.pdf) {
            Ok(l) => l,
            Err(e) => {
                error!("download of {} failed: {}", generated.filename, e);
                return ExportOutcome::Failure(e);
            }
        };
        let download = DownloadReport {
            filename: generated.filename,
            location,
            page_count: generated.page_count,
            bytes: generated.pdf.len(),
        };
        info!("exported {} ({} pages, {} bytes)", download.filename, download.page_count, download.bytes);

        match self.persistence.store(&generated.artifact) {
            Ok(()) => ExportOutcome::Success(download),
            Err(e) => {
                let warning = match e {
                    Error::PersistenceFailure(_) => e,
                    other => Error::PersistenceFailure(other.to_string()),
                };
                warn!("{} downloaded but not stored: {}", download.filename, warning);
                ExportOutcome::SuccessWithPersistenceWarning { download, warning }
            }
        }
    }
}

/// Convenience wrapper: parse `html` and export with the standard pipeline.
pub fn export_html(config: &ExportConfig, html: &str, meta: &DocumentMeta) -> ExportOutcome {
    let pipeline = match ExportPipeline::from_config(config) {
        Ok(p) => p,
        Err(e) => return ExportOutcome::Failure(e),
    };
    let document = Document::parse(html);
    pipeline.export(&document, &config.selector, meta)
}
