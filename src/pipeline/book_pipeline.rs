use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use super::PipelineError;
use crate::book::{BookMetadata, Document, Job, Order, Page, PageKind};
use crate::db::JobRecord;
use crate::delivery::{Delivery, DeliveryNotifier};
use crate::prompt::{self, PromptVariant};
use crate::render::{Cover, ImageSource, PageRenderer, RenderPage, TitlePanel};
use crate::storage::{ArtifactStore, ScratchDir};
use crate::synthesis::ImageSynthesizer;
use crate::worker::{JobRunner, panic_message};

pub const DEFAULT_BOOK_TITLE: &str = "My Coloring Book";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root for per-job scratch directories
    pub work_dir: PathBuf,
    /// Pre-built cover; the title panel is used when unset or missing
    pub cover_image: Option<PathBuf>,
    pub book_title: String,
}

/// Runs one order from prompt to delivered PDF
pub struct BookPipeline {
    synthesizer: Arc<dyn ImageSynthesizer>,
    notifier: Arc<dyn DeliveryNotifier>,
    renderer: PageRenderer,
    artifacts: ArtifactStore,
    settings: PipelineSettings,
}

impl BookPipeline {
    pub fn new(
        synthesizer: Arc<dyn ImageSynthesizer>,
        notifier: Arc<dyn DeliveryNotifier>,
        artifacts: ArtifactStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            synthesizer,
            notifier,
            renderer: PageRenderer::default(),
            artifacts,
            settings,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Generates and delivers the book for `job`; `None` means nothing could be produced.
    pub async fn run(&self, job: &Job) -> Option<Document> {
        match self.execute(job).await {
            Ok(document) => Some(document),
            Err(e) => {
                error!(job_id = %job.id, "Book generation failed: {}", e);
                None
            }
        }
    }

    /// Same as `run`, keeping the failure reason. Panics are caught here.
    pub async fn execute(&self, job: &Job) -> Result<Document, PipelineError> {
        AssertUnwindSafe(self.try_run(job))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Panicked(panic_message(panic.as_ref()))))
    }

    async fn try_run(&self, job: &Job) -> Result<Document, PipelineError> {
        let order = job.order();
        let scratch = ScratchDir::create(&self.settings.work_dir, &job.id)
            .await
            .map_err(PipelineError::Scratch)?;

        let pages = self.synthesize(order, &scratch).await?;
        if pages.is_empty() {
            return Err(PipelineError::NoPages);
        }

        let cover = self.cover(order);
        let renderer = self.renderer.clone();
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&cover, &pages))
            .await
            .map_err(|e| PipelineError::RenderTask(e.to_string()))??;
        drop(scratch);

        let mut document = Document {
            job_id: job.id.clone(),
            bytes: rendered.bytes,
            pages: rendered.placements.iter().map(|placement| placement.kind).collect(),
            metadata: BookMetadata::from_order(order),
            artifact: None,
            delivered: false,
        };
        info!(
            content_pages = document.content_page_count(),
            advertised_pages = order.total_pages,
            bytes = document.bytes.len(),
            "Document rendered"
        );

        match self.artifacts.save(&job.id, &document.bytes).await {
            Ok(path) => document.artifact = Some(path),
            Err(e) => warn!("Document could not be stored, delivering anyway: {}", e),
        }

        let delivery = Delivery::book_ready(&order.recipient, &document);
        document.delivered = match self.notifier.send(&delivery).await {
            Ok(()) => {
                info!(to = %order.recipient, "Book delivered");
                true
            }
            Err(e) => {
                error!(to = %order.recipient, "Book delivery failed: {}", e);
                false
            }
        };

        Ok(document)
    }

    /// Synthesizes pages strictly one after another and spools each to disk.
    ///
    /// Failed pages are skipped. In the colored edition every line-art page is
    /// recolored right away and followed by its colored copy.
    async fn synthesize(&self, order: &Order, scratch: &ScratchDir) -> Result<Vec<RenderPage>, PipelineError> {
        let line_art_prompt = prompt::for_order(order, PromptVariant::LineArt);
        let recolor_prompt = order
            .edition
            .is_colored()
            .then(|| prompt::for_order(order, PromptVariant::Recolor));
        let line_art_count = order.line_art_count();

        info!(
            line_art_pages = line_art_count,
            recolor = recolor_prompt.is_some(),
            prompt = %prompt::excerpt(&line_art_prompt),
            "Synthesizing pages"
        );

        let mut pages = Vec::new();
        let mut skipped = 0;
        let mut position = 0;
        for index in 1..=line_art_count {
            let line_art = match self.synthesizer.synthesize_line_art(&line_art_prompt).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(page = index, "Skipping line art page: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            let colored = match &recolor_prompt {
                Some(instruction) => match self.synthesizer.recolor(&line_art, instruction).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!(page = index, "Recolor failed, keeping line art only: {}", e);
                        None
                    }
                },
                None => None,
            };

            // Skipped pages leave no gap in the numbering.
            position += 1;
            pages.push(self.spool(scratch, Page::new(position, PageKind::LineArt, line_art)).await?);
            if let Some(bytes) = colored {
                pages.push(self.spool(scratch, Page::new(position, PageKind::Colored, bytes)).await?);
            }
            debug!(page = index, of = line_art_count, "Page synthesized");
        }

        if skipped > 0 {
            warn!(skipped, of = line_art_count, "Some pages could not be synthesized");
        }
        Ok(pages)
    }

    async fn spool(&self, scratch: &ScratchDir, page: Page) -> Result<RenderPage, PipelineError> {
        let kind = page.kind;
        let path = scratch.spool(page).await.map_err(PipelineError::Scratch)?;
        Ok(RenderPage {
            kind,
            source: ImageSource::File(path),
        })
    }

    fn cover(&self, order: &Order) -> Cover {
        if let Some(path) = &self.settings.cover_image {
            if path.is_file() {
                return Cover::Image(ImageSource::File(path.clone()));
            }
            warn!(path = %path.display(), "Cover image not found, using title panel");
        }

        Cover::TitlePanel(TitlePanel {
            title: self.settings.book_title.clone(),
            lines: vec![
                format!("Theme: {}", order.theme_text()),
                format!("{} pages - {} difficulty", order.total_pages, order.difficulty.label()),
            ],
            footer: Some("Have fun coloring!".to_string()),
        })
    }

    /// Sends the "payment confirmed" email; failures are logged only
    pub async fn confirm_order(&self, order: &Order) -> bool {
        let delivery = Delivery::order_confirmation(&order.recipient, BookMetadata::from_order(order));
        match self.notifier.send(&delivery).await {
            Ok(()) => {
                info!(order = %order.reference, to = %order.recipient, "Order confirmation sent");
                true
            }
            Err(e) => {
                warn!(order = %order.reference, "Order confirmation failed: {}", e);
                false
            }
        }
    }

    /// Re-sends a stored document to the recorded recipient without regenerating anything
    pub async fn redeliver(&self, record: &JobRecord) -> Result<(), PipelineError> {
        let bytes = self
            .artifacts
            .load(&record.job_id)
            .await
            .map_err(PipelineError::MissingArtifact)?;

        let document = Document {
            job_id: record.job_id.clone(),
            bytes,
            pages: Vec::new(),
            metadata: BookMetadata::from_order(&record.order),
            artifact: Some(self.artifacts.path_for(&record.job_id)),
            delivered: false,
        };
        self.notifier
            .send(&Delivery::book_ready(&record.order.recipient, &document))
            .await?;

        info!(job_id = %record.job_id, to = %record.order.recipient, "Book redelivered");
        Ok(())
    }
}

#[async_trait]
impl JobRunner for BookPipeline {
    async fn run_job(&self, job: &Job) -> Result<Document, PipelineError> {
        self.execute(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Edition, JobState};
    use crate::delivery::DeliveryKind;
    use crate::testing::{FakeSynthesizer, RecordingNotifier, colored_order, png_fixture, sample_order};
    use tempfile::TempDir;

    struct Harness {
        synthesizer: Arc<FakeSynthesizer>,
        notifier: Arc<RecordingNotifier>,
        pipeline: BookPipeline,
        dir: TempDir,
    }

    fn harness(synthesizer: FakeSynthesizer, notifier: RecordingNotifier) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let synthesizer = Arc::new(synthesizer);
        let notifier = Arc::new(notifier);
        let pipeline = BookPipeline::new(
            synthesizer.clone(),
            notifier.clone(),
            ArtifactStore::new(dir.path().join("pdfs")),
            PipelineSettings {
                work_dir: dir.path().join("work"),
                cover_image: None,
                book_title: DEFAULT_BOOK_TITLE.to_string(),
            },
        );
        Harness {
            synthesizer,
            notifier,
            pipeline,
            dir,
        }
    }

    fn page_count(document: &Document) -> usize {
        lopdf::Document::load_mem(&document.bytes).unwrap().get_pages().len()
    }

    fn work_dir_is_empty(harness: &Harness) -> bool {
        std::fs::read_dir(harness.dir.path().join("work"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn colored_edition_recolors_the_same_pages_in_pairs() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());
        let job = Job::new(colored_order("cs_colored", 10));

        let document = h.pipeline.run(&job).await.unwrap();

        assert_eq!(h.synthesizer.line_art_calls(), 5);
        assert_eq!(h.synthesizer.recolor_calls(), 5);
        assert_eq!(
            *h.synthesizer.recolor_inputs.lock().unwrap(),
            *h.synthesizer.produced.lock().unwrap()
        );
        let expected: Vec<PageKind> = (0..5).flat_map(|_| [PageKind::LineArt, PageKind::Colored]).collect();
        assert_eq!(document.pages, expected);
        assert_eq!(page_count(&document), 11);
        assert!(work_dir_is_empty(&h));
    }

    #[tokio::test]
    async fn colored_edition_with_odd_total_rounds_down() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());

        let document = h.pipeline.run(&Job::new(colored_order("cs_odd", 7))).await.unwrap();

        assert_eq!(h.synthesizer.line_art_calls(), 3);
        assert_eq!(document.content_page_count(), 6);
    }

    #[tokio::test]
    async fn failed_line_art_page_is_skipped() {
        let h = harness(FakeSynthesizer::new().failing_line_art(&[3]), RecordingNotifier::default());

        let document = h.pipeline.run(&Job::new(sample_order("cs_skip", 5))).await.unwrap();

        assert_eq!(h.synthesizer.line_art_calls(), 5);
        assert_eq!(document.content_page_count(), 4);
        assert_eq!(page_count(&document), 5);
        assert_eq!(document.metadata.total_pages, 5);
    }

    #[tokio::test]
    async fn pages_after_a_skipped_one_are_numbered_without_gaps() {
        let h = harness(
            FakeSynthesizer::new().failing_line_art(&[2]).failing_recolor(&[2]),
            RecordingNotifier::default(),
        );
        let job = Job::new(colored_order("cs_positions", 8));
        let scratch = ScratchDir::create(&h.dir.path().join("work"), &job.id).await.unwrap();

        let pages = h.pipeline.synthesize(job.order(), &scratch).await.unwrap();

        let names: Vec<String> = pages
            .iter()
            .map(|page| match &page.source {
                ImageSource::File(path) => path.file_name().unwrap().to_string_lossy().into_owned(),
                ImageSource::Bytes(_) => panic!("pages are spooled to disk"),
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "page_001_line_art.img",
                "page_001_colored.img",
                "page_002_line_art.img",
                "page_003_line_art.img",
                "page_003_colored.img",
            ]
        );
    }

    #[tokio::test]
    async fn full_book_has_cover_plus_every_page() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());

        let document = h.pipeline.run(&Job::new(sample_order("cs_full", 24))).await.unwrap();

        assert_eq!(document.content_page_count(), 24);
        assert_eq!(page_count(&document), 25);
        assert_eq!(h.synthesizer.recolor_calls(), 0);
    }

    #[tokio::test]
    async fn failed_recolor_leaves_line_art_only_for_that_slot() {
        let h = harness(FakeSynthesizer::new().failing_recolor(&[2]), RecordingNotifier::default());

        let document = h.pipeline.run(&Job::new(colored_order("cs_recolor", 6))).await.unwrap();

        assert_eq!(
            document.pages,
            vec![
                PageKind::LineArt,
                PageKind::Colored,
                PageKind::LineArt,
                PageKind::LineArt,
                PageKind::Colored,
            ]
        );
    }

    #[tokio::test]
    async fn no_recolor_is_attempted_for_a_failed_line_art_page() {
        let h = harness(FakeSynthesizer::new().failing_line_art(&[1]), RecordingNotifier::default());

        let document = h.pipeline.run(&Job::new(colored_order("cs_gap", 4))).await.unwrap();

        assert_eq!(h.synthesizer.recolor_calls(), 1);
        assert_eq!(document.pages, vec![PageKind::LineArt, PageKind::Colored]);
    }

    #[tokio::test]
    async fn zero_successful_pages_is_a_total_failure() {
        let h = harness(FakeSynthesizer::always_failing(), RecordingNotifier::default());
        let job = Job::new(sample_order("cs_none", 3));

        assert!(h.pipeline.run(&job).await.is_none());
        assert!(matches!(h.pipeline.execute(&job).await, Err(PipelineError::NoPages)));
        assert!(h.notifier.sent().is_empty());
        assert!(h.pipeline.artifacts().load(&job.id).await.is_err());
        assert!(work_dir_is_empty(&h));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_document() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::failing());
        let job = Job::new(sample_order("cs_undelivered", 2));

        let document = h.pipeline.run(&job).await.unwrap();

        assert!(!document.delivered);
        assert_eq!(document.artifact, Some(h.pipeline.artifacts().path_for(&job.id)));
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn delivered_mail_carries_the_pdf() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());

        let document = h.pipeline.run(&Job::new(sample_order("cs_mail", 2))).await.unwrap();

        let sent = h.notifier.sent();
        assert!(document.delivered);
        assert_eq!(sent[0].kind, DeliveryKind::BookReady);
        assert_eq!(sent[0].to, "parent@example.com");
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.bytes, document.bytes);
        assert_eq!(attachment.filename, "coloring_book_cs_mail.pdf");
    }

    #[tokio::test]
    async fn supplied_cover_image_is_used() {
        let mut h = harness(FakeSynthesizer::new(), RecordingNotifier::default());
        let cover = h.dir.path().join("cover.png");
        std::fs::write(&cover, png_fixture(30, 42)).unwrap();
        h.pipeline.settings.cover_image = Some(cover);

        let document = h.pipeline.run(&Job::new(sample_order("cs_cover", 1))).await.unwrap();

        assert_eq!(page_count(&document), 2);
    }

    #[tokio::test]
    async fn confirmation_has_no_attachment() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());
        let order = colored_order("cs_confirm", 12);

        assert!(h.pipeline.confirm_order(&order).await);

        let sent = h.notifier.sent();
        assert_eq!(sent[0].kind, DeliveryKind::OrderConfirmation);
        assert!(sent[0].attachment.is_none());
        assert_eq!(sent[0].metadata.edition, Edition::LineArtPlusColored);
    }

    #[tokio::test]
    async fn redelivery_resends_the_stored_artifact_without_synthesis() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());
        let job = Job::new(sample_order("cs_again", 2));
        let document = h.pipeline.run(&job).await.unwrap();
        let calls_before = h.synthesizer.line_art_calls();

        let mut record = JobRecord::queued(&job);
        record.state = JobState::Completed;
        h.pipeline.redeliver(&record).await.unwrap();

        assert_eq!(h.synthesizer.line_art_calls(), calls_before);
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].attachment.as_ref().unwrap().bytes, document.bytes);
    }

    #[tokio::test]
    async fn redelivery_without_artifact_fails() {
        let h = harness(FakeSynthesizer::new(), RecordingNotifier::default());
        let record = JobRecord::queued(&Job::new(sample_order("cs_missing", 2)));

        let result = h.pipeline.redeliver(&record).await;

        assert!(matches!(result, Err(PipelineError::MissingArtifact(_))));
    }
}
