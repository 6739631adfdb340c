//! Ingestion: turn uploaded files into preview items.
//!
//! A PDF becomes one item per page via the rasterisation service; any other
//! file becomes exactly one item holding its original bytes, with no network
//! call. A PDF that cannot be rasterised contributes nothing and is reported
//! in [`IngestReport::failures`]; the other files are unaffected.

use crate::engines::Rasterizer;
use crate::error::IngestError;
use crate::model::{ImagePayload, IngestReport, UploadedFile};
use crate::pipeline::encode::sniff_media_type;
use crate::pipeline::selection::{NewPreview, PreviewCollection};
use crate::progress::SessionProgressCallback;
use tracing::{info, warn};

/// Ingest `files` in order and append their items to `collection`.
///
/// Files are processed one after another; all new items are appended in a
/// single step once every file has been handled.
pub async fn ingest_files(
    files: Vec<UploadedFile>,
    rasterizer: &dyn Rasterizer,
    collection: &mut PreviewCollection,
    progress: &dyn SessionProgressCallback,
) -> IngestReport {
    progress.on_ingest_start(files.len());

    let mut new_items: Vec<NewPreview> = Vec::new();
    let mut failures = Vec::new();

    for file in files {
        if file.is_pdf() {
            match rasterizer.rasterize(&file).await {
                Ok(pages) => {
                    progress.on_file_ingested(&file.filename, pages.len());
                    new_items.extend(pages.into_iter().map(|p| NewPreview {
                        image: ImagePayload::DataUri(p.image_data),
                        filename: file.filename.clone(),
                        origin_page: Some(p.page),
                        from_pdf: true,
                    }));
                }
                Err(e) => {
                    warn!("PDF extract failed for {}: {}", file.filename, e);
                    progress.on_file_failed(&file.filename, &e.to_string());
                    failures.push(IngestError::RasterisationFailed {
                        filename: file.filename.clone(),
                        detail: e.to_string(),
                    });
                }
            }
        } else {
            let media_type = sniff_media_type(&file.bytes, &file.media_type);
            progress.on_file_ingested(&file.filename, 1);
            new_items.push(NewPreview {
                image: ImagePayload::Bytes {
                    data: file.bytes,
                    media_type,
                },
                filename: file.filename,
                origin_page: None,
                from_pdf: false,
            });
        }
    }

    let added = collection.append(new_items);
    info!(
        "Ingested {} preview item(s), {} file(s) failed",
        added.len(),
        failures.len()
    );

    IngestReport { added, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::model::RasterPage;
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns two pages per PDF unless the filename contains "broken".
    #[derive(Default)]
    struct FakeRasterizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(&self, file: &UploadedFile) -> Result<Vec<RasterPage>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if file.filename.contains("broken") {
                return Err(EngineError::BadStatus {
                    engine: "rasteriser".into(),
                    status: 400,
                    message: Some("Cannot open PDF".into()),
                });
            }
            Ok((0..2)
                .map(|page| RasterPage {
                    page,
                    image_data: format!("data:image/png;base64,{}", ["AA==", "AQ=="][page as usize]),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn image_file_needs_no_network_call() {
        let rasterizer = FakeRasterizer::default();
        let mut c = PreviewCollection::new();
        let files = vec![UploadedFile::new("a.jpg", "image/jpeg", vec![1, 2, 3])];

        let report = ingest_files(files, &rasterizer, &mut c, &NoopProgressCallback).await;

        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.added.len(), 1);
        let item = c.get(report.added[0]).expect("present");
        assert!(!item.from_pdf);
        assert!(!item.selected);
        assert_eq!(item.image.to_bytes().unwrap().1, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn pdf_yields_one_item_per_page_in_order() {
        let rasterizer = FakeRasterizer::default();
        let mut c = PreviewCollection::new();
        let files = vec![UploadedFile::new("exam.pdf", "application/pdf", b"%PDF".to_vec())];

        let report = ingest_files(files, &rasterizer, &mut c, &NoopProgressCallback).await;

        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
        let pages: Vec<_> = c.iter().map(|p| (p.origin_page, p.from_pdf)).collect();
        assert_eq!(pages, vec![(Some(0), true), (Some(1), true)]);
        assert_eq!(c.active_id(), Some(report.added[0]));
    }

    #[tokio::test]
    async fn failed_pdf_is_skipped_and_reported() {
        let rasterizer = FakeRasterizer::default();
        let mut c = PreviewCollection::new();
        let files = vec![
            UploadedFile::new("first.png", "image/png", vec![9]),
            UploadedFile::new("broken.pdf", "application/pdf", vec![]),
            UploadedFile::new("last.pdf", "", vec![]),
        ];

        let report = ingest_files(files, &rasterizer, &mut c, &NoopProgressCallback).await;

        assert!(report.is_partial());
        assert_eq!(report.failures.len(), 1);
        let names: Vec<_> = c.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["first.png", "last.pdf", "last.pdf"]);
    }

    #[tokio::test]
    async fn generic_media_type_is_sniffed() {
        let rasterizer = FakeRasterizer::default();
        let mut c = PreviewCollection::new();
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let files = vec![UploadedFile::new("blob", "application/octet-stream", png)];

        ingest_files(files, &rasterizer, &mut c, &NoopProgressCallback).await;

        let item = c.iter().next().expect("one item");
        assert_eq!(item.image.media_type(), "image/png");
    }
}
