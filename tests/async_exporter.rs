use std::sync::Arc;
use std::time::Duration;

use rfprint::dom::OffscreenClone;
use rfprint::platform::MemoryDownloads;
use rfprint::{
    Bitmap, BlockRasterizer, DocumentMeta, Error, ExportOutcome, ExportPipeline, Exporter, PageGeometry,
    RasterBackend, RasterOptions,
};

const PAGE: &str = r#"<html><body><div id="invoice-preview"><h1>Invoice INV-5</h1><p>Total $5.00</p></div></body></html>"#;

/// Sleeps before delegating to the block renderer.
struct SlowRasterizer(Duration);

impl RasterBackend for SlowRasterizer {
    fn rasterize(&self, clone: &OffscreenClone<'_>, scale: u32) -> rfprint::Result<Bitmap> {
        std::thread::sleep(self.0);
        BlockRasterizer.rasterize(clone, scale)
    }
}

async fn slow_exporter(delay_ms: u64, timeout_ms: Option<u64>, downloads: Arc<MemoryDownloads>) -> Exporter {
    Exporter::with_pipeline(
        move || {
            let opts = RasterOptions { design_width: 200, scale: 1, ..Default::default() };
            Ok(ExportPipeline::new(opts, PageGeometry::a4(), downloads)
                .with_backend(SlowRasterizer(Duration::from_millis(delay_ms))))
        },
        timeout_ms,
    )
    .await
    .expect("start exporter")
}

fn meta() -> DocumentMeta {
    DocumentMeta { document_number: "INV-5".into(), ..Default::default() }
}

#[tokio::test]
async fn second_export_while_one_is_running_is_rejected() {
    let downloads = Arc::new(MemoryDownloads::new());
    let exporter = slow_exporter(400, None, Arc::clone(&downloads)).await;

    let first = {
        let exporter = exporter.clone();
        tokio::spawn(async move { exporter.export(PAGE, "#invoice-preview", meta()).await })
    };
    // let the first request claim the exporter
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(exporter.is_busy());

    let second = exporter.export(PAGE, "#invoice-preview", meta()).await;
    assert!(matches!(second, Err(Error::Busy)), "{:?}", second);

    let outcome = first.await.expect("join").expect("first export");
    assert!(matches!(outcome, ExportOutcome::Success(_)), "{:?}", outcome);
    assert_eq!(downloads.files().len(), 1, "only the first request produces a download");
    assert!(!exporter.is_busy());

    // released once settled
    let third = exporter.export(PAGE, "#invoice-preview", meta()).await.expect("third export");
    assert!(third.is_success());
    exporter.close().await.unwrap();
}

#[tokio::test]
async fn deadline_reports_timeout_and_worker_stays_busy() {
    let downloads = Arc::new(MemoryDownloads::new());
    let exporter = slow_exporter(500, Some(50), Arc::clone(&downloads)).await;

    let res = exporter.export(PAGE, "#invoice-preview", meta()).await;
    assert!(matches!(res, Err(Error::Timeout(50))), "{:?}", res);
    assert!(exporter.is_busy());
    assert!(matches!(exporter.export(PAGE, "#invoice-preview", meta()).await, Err(Error::Busy)));

    // the abandoned pass still completes in the background
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(!exporter.is_busy());
    assert_eq!(downloads.files().len(), 1);
}

#[tokio::test]
async fn failures_come_back_as_outcomes() {
    let exporter = slow_exporter(0, None, Arc::new(MemoryDownloads::new())).await;
    let outcome = exporter
        .export("<html><body></body></html>", "#invoice-preview", meta())
        .await
        .expect("worker answered");
    assert!(matches!(outcome, ExportOutcome::Failure(Error::CaptureUnavailable(_))));
    assert!(!exporter.is_busy());
}
