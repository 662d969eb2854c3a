use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::oneshot;

use crate::export::{ExportOutcome, ExportPipeline};
use crate::{DocumentMeta, Document, Error, ExportConfig, Result};

enum Command {
    Export {
        html: String,
        selector: String,
        meta: DocumentMeta,
        resp: oneshot::Sender<ExportOutcome>,
    },
    Close(oneshot::Sender<()>),
}

/// An async-friendly exporter backed by a dedicated worker thread.
///
/// The worker owns the [`ExportPipeline`] and parses each document itself,
/// so nothing non-`Send` crosses threads. At most one export is in flight:
/// a second call while one is pending fails fast with [`Error::Busy`], the
/// same way the dashboard disables its download button.
#[derive(Clone)]
pub struct Exporter {
    cmd_tx: Sender<Command>,
    in_flight: Arc<AtomicBool>,
    timeout_ms: Option<u64>,
}

/// Clears the in-flight flag when the worker is done with a job.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Exporter {
    /// Create an exporter using the standard pipeline for `config`.
    pub async fn new(config: ExportConfig) -> Result<Self> {
        let timeout_ms = config.export_timeout_ms;
        Self::with_pipeline(move || ExportPipeline::from_config(&config), timeout_ms).await
    }

    /// Create an exporter whose pipeline is built by `factory` on the worker
    /// thread.
    pub async fn with_pipeline<F>(factory: F, timeout_ms: Option<u64>) -> Result<Self>
    where
        F: FnOnce() -> Result<ExportPipeline> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) = oneshot::channel();
        let in_flight = Arc::new(AtomicBool::new(false));
        let worker_flag = Arc::clone(&in_flight);

        thread::spawn(move || {
            let pipeline = match factory() {
                Ok(p) => p,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Export { html, selector, meta, resp } => {
                        let guard = InFlight(Arc::clone(&worker_flag));
                        let document = Document::parse(&html);
                        let outcome = pipeline.export(&document, &selector, &meta);
                        drop(document);
                        drop(guard);
                        if resp.send(outcome).is_err() {
                            debug!("export of {:?} settled after its caller went away", meta.document_number);
                        }
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        match init_rx.await {
            Ok(Ok(())) => Ok(Self { cmd_tx, in_flight, timeout_ms }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Other("export worker exited during start-up".into())),
        }
    }

    /// Whether an export is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Export the preview found by `selector` in `html`.
    ///
    /// Suspends until the worker settles. Fails with [`Error::Busy`] when
    /// another export is still running and with [`Error::Timeout`] when the
    /// configured deadline passes first; in that case the worker finishes the
    /// pass in the background and stays busy until it does.
    pub async fn export(&self, html: impl Into<String>, selector: impl Into<String>, meta: DocumentMeta) -> Result<ExportOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }

        let (tx, rx) = oneshot::channel();
        let cmd = Command::Export { html: html.into(), selector: selector.into(), meta, resp: tx };
        if self.cmd_tx.send(cmd).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(Error::Other("export worker has shut down".into()));
        }

        let received = match self.timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), rx).await {
                Ok(r) => r,
                Err(_) => {
                    warn!("export did not settle within {}ms", ms);
                    return Err(Error::Timeout(ms));
                }
            },
            None => rx.await,
        };
        received.map_err(|_| Error::Other("export worker dropped the request".into()))
    }

    /// Stop the worker once queued work is done.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Close(tx))
            .map_err(|_| Error::Other("export worker has shut down".into()))?;
        rx.await.map_err(|_| Error::Other("export worker dropped the close request".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryDownloads;
    use crate::{PageGeometry, RasterOptions};

    const PAGE: &str = r#"<html><body><div id="invoice-preview"><h1>Invoice</h1><p>Total $1</p></div></body></html>"#;

    #[tokio::test]
    async fn exports_on_the_worker() {
        let exporter = Exporter::with_pipeline(
            || {
                let opts = RasterOptions { design_width: 200, scale: 1, ..Default::default() };
                Ok(ExportPipeline::new(opts, PageGeometry::a4(), MemoryDownloads::new()))
            },
            None,
        )
        .await
        .unwrap();

        let meta = DocumentMeta { document_number: "INV-1".into(), ..Default::default() };
        let outcome = exporter.export(PAGE, "#invoice-preview", meta).await.unwrap();
        assert!(matches!(outcome, ExportOutcome::Success(_)));
        assert!(!exporter.is_busy());
        exporter.close().await.unwrap();
    }

    #[tokio::test]
    async fn start_up_errors_are_returned() {
        let res = Exporter::with_pipeline(|| Err(Error::ConfigError("bad".into())), None).await;
        assert!(matches!(res, Err(Error::ConfigError(_))));
    }
}
