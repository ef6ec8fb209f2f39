//! Render entry points: one operation per target format, plus the batch
//! archive operation.
//!
//! ## Why one pipeline for every format?
//!
//! Every entry point runs the same sequential pass:
//!
//! ```text
//! validate name ─▶ normalize ─▶ flow / slide layout ─▶ writer ─▶ folder ─▶ URL
//!                   (images resolved here, one block at a time)  (spawn_blocking)
//! ```
//!
//! Writers are CPU-bound and synchronous, so they run in `spawn_blocking`.
//! A writer that fails on the full content is retried once with a minimal
//! "Error in generation" story; the caller still gets a URL. Only input
//! errors and I/O failures reach the caller as `Err`.

use crate::backend::{self, docx, pdf, pptx, text, xlsx};
use crate::config::ExportConfig;
use crate::content::{
    parse_rows, parse_slides, CellValue, Content, FileEntry, FileFormat, Rows, SlideSpec,
};
use crate::error::ExportError;
use crate::output::ExportOutput;
use crate::pipeline::flow::{self, FlowBlock, GENERATION_ERROR_TEXT};
use crate::pipeline::image::{HttpImageResolver, ImageResolver};
use crate::pipeline::normalize::normalize;
use crate::pipeline::slide::{layout, plan_slide, PlannedSlide};
use crate::pipeline::template::{TemplateKind, TemplatePrototype, TemplateStore};
use crate::progress::{ExportProgressCallback, NoopProgressCallback};
use crate::storage::{self, CleanupScheduler, ExportFolder};
use crate::style::StyleSheet;
use export_archive::{ArchiveFormat, ArchiveMember};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

static NOOP: NoopProgressCallback = NoopProgressCallback;

/// Per-call options shared by the single-artifact entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactOptions {
    /// Target filename relative to the export folder. Generated from the
    /// current time when `None`.
    pub filename: Option<String>,
    /// Overrides [`ExportConfig::persistent`] for this call.
    pub persistent: Option<bool>,
    /// Document title (word documents and slide decks).
    pub title: Option<String>,
}

impl ArtifactOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn persistent(mut self, v: bool) -> Self {
        self.persistent = Some(v);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// The rendering service.
///
/// Holds the process-wide read-only state: the style sheet, the template
/// prototypes and the image resolver. Cheap to share behind an `Arc`; every
/// method takes `&self` and keeps no per-request state.
pub struct Exporter {
    config: ExportConfig,
    resolver: Arc<dyn ImageResolver>,
    templates: TemplateStore,
    styles: &'static StyleSheet,
    cleanup: CleanupScheduler,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .field("templates", &self.templates.loaded_kinds())
            .field("cleanup", &self.cleanup)
            .finish()
    }
}

impl Exporter {
    /// Exporter backed by the configured image provider.
    pub fn new(config: ExportConfig) -> Result<Self, ExportError> {
        let resolver = HttpImageResolver::from_config(&config)?;
        Ok(Self::with_resolver(config, Arc::new(resolver)))
    }

    /// Exporter with a caller-supplied image resolver (tests, embedders).
    pub fn with_resolver(config: ExportConfig, resolver: Arc<dyn ImageResolver>) -> Self {
        let templates = TemplateStore::scan(config.template_dir.as_deref());
        let cleanup = CleanupScheduler::new(config.cleanup_delay);
        info!(
            "Exporter ready: output '{}', templates {:?}",
            config.output_dir.display(),
            templates.loaded_kinds()
        );
        Self {
            config,
            resolver,
            templates,
            styles: StyleSheet::shared(),
            cleanup,
        }
    }

    /// Replace the templates discovered at construction.
    pub fn with_templates(mut self, templates: TemplateStore) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Pending folder deletions. Short-lived processes should
    /// [`wait_all`](CleanupScheduler::wait_all) or
    /// [`abort_all`](CleanupScheduler::abort_all) before exiting.
    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    fn progress(&self) -> &dyn ExportProgressCallback {
        match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &NOOP,
        }
    }

    fn template(&self, kind: TemplateKind) -> Option<TemplatePrototype> {
        self.templates.acquire(kind).cloned()
    }

    // ── Single-artifact entry points ─────────────────────────────────────

    /// Markdown or content blocks → PDF.
    pub async fn create_pdf(
        &self,
        content: &Content,
        opts: ArtifactOptions,
    ) -> Result<ExportOutput, ExportError> {
        let start = Instant::now();
        let filename = resolve_filename(opts.filename.as_deref(), "pdf")?;
        info!("Creating PDF '{filename}'");

        let bytes = self.pdf_bytes(content).await?;
        let out = self.publish(&filename, &bytes, opts.persistent).await?;
        info!("PDF ready in {}ms: {}", start.elapsed().as_millis(), out.url);
        Ok(out)
    }

    /// Markdown or content blocks → word-processor document.
    pub async fn create_word(
        &self,
        content: &Content,
        opts: ArtifactOptions,
    ) -> Result<ExportOutput, ExportError> {
        let start = Instant::now();
        let filename = resolve_filename(opts.filename.as_deref(), "docx")?;
        info!("Creating word document '{filename}'");

        let bytes = self.docx_bytes(content, opts.title.as_deref()).await?;
        let out = self.publish(&filename, &bytes, opts.persistent).await?;
        info!(
            "Word document ready in {}ms: {}",
            start.elapsed().as_millis(),
            out.url
        );
        Ok(out)
    }

    /// Slide specs → slide deck. `opts.title` fills the title slide.
    pub async fn create_presentation(
        &self,
        slides: &[SlideSpec],
        opts: ArtifactOptions,
    ) -> Result<ExportOutput, ExportError> {
        let start = Instant::now();
        let filename = resolve_filename(opts.filename.as_deref(), "pptx")?;
        info!("Creating presentation '{filename}' with {} slides", slides.len());

        let bytes = self.pptx_bytes(slides, opts.title.as_deref()).await?;
        let out = self.publish(&filename, &bytes, opts.persistent).await?;
        info!(
            "Presentation ready in {}ms: {}",
            start.elapsed().as_millis(),
            out.url
        );
        Ok(out)
    }

    /// Slide list as loosely-typed JSON (a list, or a string holding one).
    ///
    /// # Errors
    /// [`ExportError::InvalidSlidesData`] when the value is not a list,
    /// [`ExportError::InvalidSlide`] when an entry is not a mapping.
    pub async fn create_presentation_from_value(
        &self,
        slides: &Value,
        opts: ArtifactOptions,
    ) -> Result<ExportOutput, ExportError> {
        let slides = parse_slides(slides)?;
        self.create_presentation(&slides, opts).await
    }

    /// Rows → spreadsheet. `opts.title` names the sheet.
    pub async fn create_excel(
        &self,
        rows: &[Vec<CellValue>],
        opts: ArtifactOptions,
    ) -> Result<ExportOutput, ExportError> {
        let start = Instant::now();
        let filename = resolve_filename(opts.filename.as_deref(), "xlsx")?;
        info!("Creating spreadsheet '{filename}' with {} rows", rows.len());

        let bytes = self.xlsx_bytes(rows.to_vec(), opts.title.clone()).await?;
        let out = self.publish(&filename, &bytes, opts.persistent).await?;
        info!(
            "Spreadsheet ready in {}ms: {}",
            start.elapsed().as_millis(),
            out.url
        );
        Ok(out)
    }

    /// Rows → delimited text.
    pub async fn create_csv(
        &self,
        rows: &[Vec<CellValue>],
        opts: ArtifactOptions,
    ) -> Result<ExportOutput, ExportError> {
        let filename = resolve_filename(opts.filename.as_deref(), "csv")?;
        info!("Creating CSV '{filename}' with {} rows", rows.len());
        let bytes = backend::csv::render(rows);
        self.publish(&filename, &bytes, opts.persistent).await
    }

    /// Raw text written verbatim under `filename`. `.xml` files get a prolog
    /// when they lack one.
    pub async fn create_file(
        &self,
        content: &str,
        filename: &str,
        persistent: Option<bool>,
    ) -> Result<ExportOutput, ExportError> {
        storage::validate_filename(filename)?;
        info!("Creating file '{filename}'");
        let bytes = text::render(content, filename);
        self.publish(filename, &bytes, persistent).await
    }

    // ── Batch ────────────────────────────────────────────────────────────

    /// Render every entry into one folder and bundle them into one archive.
    ///
    /// All or nothing: every entry is validated before anything is written,
    /// and any failure afterwards removes the folder. No partial archive is
    /// ever left behind.
    pub async fn generate_and_archive(
        &self,
        entries: &[FileEntry],
        archive_format: &str,
        archive_name: Option<&str>,
        persistent: Option<bool>,
    ) -> Result<ExportOutput, ExportError> {
        let start = Instant::now();
        let format = archive_format_or_zip(archive_format);
        let archive_filename = format!(
            "{}_{}.{}",
            archive_name.filter(|n| !n.trim().is_empty()).unwrap_or("archive"),
            storage::timestamp(),
            format.extension()
        );
        storage::validate_filename(&archive_filename)?;

        // Validate everything up front.
        let prepared = entries
            .iter()
            .map(PreparedEntry::from_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let total = prepared.len();
        info!("Creating {format} archive of {total} entries");
        self.progress().on_batch_start(total);

        let folder = ExportFolder::create(&self.config.output_dir).await?;
        let result = self
            .write_batch(&folder, &prepared, format, &archive_filename)
            .await;
        let archive_path = match result {
            Ok(path) => path,
            Err(e) => {
                error!("Batch failed, removing {}: {e}", folder.path.display());
                folder.remove().await;
                return Err(e);
            }
        };

        let url = folder.url_for(&self.config.base_url, &archive_path);
        if !self.is_persistent(persistent) {
            self.cleanup.schedule(folder.path.clone());
        }
        self.progress().on_batch_complete(total, &url);
        info!(
            "Archive ready in {}ms: {url}",
            start.elapsed().as_millis()
        );

        Ok(ExportOutput {
            url,
            filename: relative_name(&folder, &archive_path),
            path: archive_path,
        })
    }

    async fn write_batch(
        &self,
        folder: &ExportFolder,
        prepared: &[PreparedEntry],
        format: ArchiveFormat,
        archive_filename: &str,
    ) -> Result<std::path::PathBuf, ExportError> {
        let total = prepared.len();
        let mut members = Vec::with_capacity(total);

        for (i, entry) in prepared.iter().enumerate() {
            self.progress().on_entry_start(i + 1, total, &entry.filename);
            let bytes = self.render_entry(entry).await?;
            let path = folder.file_path(&entry.filename);
            storage::write_atomic(&path, &bytes).await?;

            let url = folder.url_for(&self.config.base_url, &path);
            debug!("Batch entry {}/{total} written: {}", i + 1, path.display());
            self.progress().on_entry_complete(i + 1, total, &url);
            members.push(ArchiveMember::new(&path, relative_name(folder, &path)));
        }

        let dest = folder.file_path(archive_filename);
        let archive_dest = dest.clone();
        tokio::task::spawn_blocking(move || {
            export_archive::create_archive(format, &archive_dest, &members)
        })
        .await
        .map_err(|e| ExportError::Internal(format!("archive task failed: {e}")))??;
        Ok(dest)
    }

    async fn render_entry(&self, entry: &PreparedEntry) -> Result<Vec<u8>, ExportError> {
        let title = entry.title.as_deref();
        match &entry.body {
            EntryBody::Pdf(content) => self.pdf_bytes(content).await,
            EntryBody::Docx(content) => self.docx_bytes(content, title).await,
            EntryBody::Pptx(slides) => self.pptx_bytes(slides, title).await,
            EntryBody::Xlsx(rows) => self.xlsx_bytes(rows.clone(), entry.title.clone()).await,
            EntryBody::Csv(rows) => Ok(backend::csv::render(rows)),
            EntryBody::Raw(raw) => Ok(text::render(raw, &entry.filename)),
        }
    }

    // ── Format pipelines ─────────────────────────────────────────────────

    async fn flow_blocks(&self, content: &Content) -> Vec<FlowBlock> {
        let tree = normalize(content);
        debug!(
            "Normalized content into {} elements ({} images)",
            tree.len(),
            tree.image_count()
        );
        let blocks =
            flow::render_with_progress(&tree, self.resolver.as_ref(), self.styles, self.progress())
                .await;
        debug!("Flow renderer produced {} blocks", blocks.len());
        blocks
    }

    async fn pdf_bytes(&self, content: &Content) -> Result<Vec<u8>, ExportError> {
        let blocks = self.flow_blocks(content).await;
        let sheet = self.styles;
        write_with_fallback("pdf", blocks, FlowBlock::fallback_story(), move |blocks| {
            pdf::render(blocks, sheet)
        })
        .await
    }

    async fn docx_bytes(
        &self,
        content: &Content,
        title: Option<&str>,
    ) -> Result<Vec<u8>, ExportError> {
        let blocks = self.flow_blocks(content).await;
        let sheet = self.styles;
        let title = title.map(str::to_string);
        let template = self.template(TemplateKind::Document);
        write_with_fallback("docx", blocks, FlowBlock::fallback_story(), move |blocks| {
            docx::render(blocks, title.as_deref(), sheet, template.as_ref())
        })
        .await
    }

    async fn pptx_bytes(
        &self,
        slides: &[SlideSpec],
        title: Option<&str>,
    ) -> Result<Vec<u8>, ExportError> {
        let template = self.template(TemplateKind::SlideDeck);
        let frame = pptx::slide_frame(template.as_ref());

        let mut planned = Vec::with_capacity(slides.len());
        for slide in slides {
            planned.push(plan_slide(slide, frame, self.resolver.as_ref(), self.progress()).await);
        }
        let with_images = planned.iter().filter(|p| p.image.is_some()).count();
        debug!(
            "Planned {} slides ({with_images} with images)",
            planned.len()
        );

        let fallback_spec = SlideSpec::new(title.unwrap_or("Presentation"))
            .lines([GENERATION_ERROR_TEXT]);
        let fallback = vec![PlannedSlide {
            layout: layout(&fallback_spec, frame),
            spec: fallback_spec,
            image: None,
        }];
        let title = title.map(str::to_string);
        write_with_fallback("pptx", planned, fallback, move |slides| {
            pptx::render(title.as_deref(), slides, template.as_ref())
        })
        .await
    }

    async fn xlsx_bytes(&self, rows: Rows, sheet_name: Option<String>) -> Result<Vec<u8>, ExportError> {
        let template = self.template(TemplateKind::Spreadsheet);
        let fallback = vec![vec![CellValue::Text(GENERATION_ERROR_TEXT.to_string())]];
        write_with_fallback("xlsx", rows, fallback, move |rows| {
            xlsx::render(rows, sheet_name.as_deref(), template.as_ref())
        })
        .await
    }

    // ── Publishing ───────────────────────────────────────────────────────

    fn is_persistent(&self, explicit: Option<bool>) -> bool {
        explicit.unwrap_or(self.config.persistent)
    }

    /// Write one artifact into a fresh folder and return its URL.
    async fn publish(
        &self,
        filename: &str,
        bytes: &[u8],
        persistent: Option<bool>,
    ) -> Result<ExportOutput, ExportError> {
        let folder = ExportFolder::create(&self.config.output_dir).await?;
        let path = folder.file_path(filename);
        if let Err(e) = storage::write_atomic(&path, bytes).await {
            folder.remove().await;
            return Err(e);
        }

        if !self.is_persistent(persistent) {
            self.cleanup.schedule(folder.path.clone());
        }
        let url = folder.url_for(&self.config.base_url, &path);
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        self.progress().on_entry_complete(1, 1, &url);

        Ok(ExportOutput {
            url,
            filename: relative_name(&folder, &path),
            path,
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Caller name after validation, or a timestamped default.
fn resolve_filename(name: Option<&str>, ext: &str) -> Result<String, ExportError> {
    match name {
        Some(name) if !name.trim().is_empty() => {
            storage::validate_filename(name)?;
            Ok(name.trim().to_string())
        }
        _ => Ok(storage::default_filename(ext)),
    }
}

fn relative_name(folder: &ExportFolder, path: &Path) -> String {
    path.strip_prefix(&folder.path)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unknown archive formats are bundled as zip.
fn archive_format_or_zip(requested: &str) -> ArchiveFormat {
    requested.parse().unwrap_or_else(|_| {
        warn!("Archive format '{requested}' is not supported, using zip");
        ArchiveFormat::Zip
    })
}

/// Run `write` on the blocking pool; on error or panic retry once with
/// `fallback`.
async fn write_with_fallback<T, F>(
    format: &'static str,
    primary: T,
    fallback: T,
    write: F,
) -> Result<Vec<u8>, ExportError>
where
    T: Send + 'static,
    F: Fn(&T) -> Result<Vec<u8>, ExportError> + Send + Sync + 'static,
{
    let write = Arc::new(write);
    let first = Arc::clone(&write);
    let failure = match tokio::task::spawn_blocking(move || first(&primary)).await {
        Ok(Ok(bytes)) => return Ok(bytes),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("writer task failed: {e}"),
    };

    warn!("{format} writer failed, retrying with fallback content: {failure}");
    match tokio::task::spawn_blocking(move || write(&fallback)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(backend::render_failed(
            format,
            format!("{failure}; fallback also failed: {e}"),
        )),
        Err(e) => Err(backend::render_failed(
            format,
            format!("{failure}; fallback task failed: {e}"),
        )),
    }
}

/// A batch entry after validation: everything that can be rejected has
/// been rejected.
#[derive(Debug)]
struct PreparedEntry {
    filename: String,
    title: Option<String>,
    body: EntryBody,
}

#[derive(Debug)]
enum EntryBody {
    Pdf(Content),
    Docx(Content),
    Pptx(Vec<SlideSpec>),
    Xlsx(Rows),
    Csv(Rows),
    Raw(String),
}

impl PreparedEntry {
    fn from_entry(entry: &FileEntry) -> Result<Self, ExportError> {
        let filename = resolve_filename(Some(entry.filename.as_str()), entry.format.extension())?;
        let body = match &entry.format {
            FileFormat::Pdf => EntryBody::Pdf(Content::markdown_from_value(&entry.content)),
            FileFormat::Docx => EntryBody::Docx(Content::from_value(&entry.content)),
            FileFormat::Pptx => {
                let source = entry.slides_data.as_ref().unwrap_or(&entry.content);
                EntryBody::Pptx(parse_slides(source).map_err(|e| {
                    warn!("Batch entry '{filename}' rejected: {e}");
                    e
                })?)
            }
            FileFormat::Xlsx => EntryBody::Xlsx(parse_rows(&entry.content)),
            FileFormat::Csv => EntryBody::Csv(parse_rows(&entry.content)),
            FileFormat::Raw(_) => EntryBody::Raw(raw_text(&entry.content)),
        };
        Ok(Self {
            filename,
            title: entry.title.clone().filter(|t| !t.trim().is_empty()),
            body,
        })
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockError;
    use crate::pipeline::image::{ImageRef, ResolvedImage};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct NoImages;

    #[async_trait]
    impl ImageResolver for NoImages {
        async fn resolve(&self, _reference: &ImageRef) -> Result<ResolvedImage, BlockError> {
            Err(BlockError::NoProvider)
        }
    }

    fn exporter(dir: &TempDir) -> Exporter {
        let config = ExportConfig::builder()
            .output_dir(dir.path())
            .base_url("http://files.test/exports/")
            .persistent(true)
            .build()
            .unwrap();
        Exporter::with_resolver(config, Arc::new(NoImages))
    }

    #[test]
    fn filenames_default_and_validate() {
        assert!(resolve_filename(None, "pdf").unwrap().ends_with(".pdf"));
        assert!(resolve_filename(Some("  "), "csv").unwrap().ends_with(".csv"));
        assert_eq!(resolve_filename(Some("a.pdf"), "pdf").unwrap(), "a.pdf");
        assert!(resolve_filename(Some("../a.pdf"), "pdf").is_err());
    }

    #[test]
    fn unknown_archive_format_falls_back_to_zip() {
        assert_eq!(archive_format_or_zip("rar"), ArchiveFormat::Zip);
        assert_eq!(archive_format_or_zip(""), ArchiveFormat::Zip);
        assert_eq!(archive_format_or_zip("TGZ"), ArchiveFormat::TarGz);
        assert_eq!(archive_format_or_zip("7z"), ArchiveFormat::SevenZ);
    }

    #[test]
    fn raw_text_shapes() {
        assert_eq!(raw_text(&Value::Null), "");
        assert_eq!(raw_text(&json!(["a", "b"])), "a\nb");
        assert!(raw_text(&json!({"k": 1})).contains("\"k\": 1"));
    }

    #[test]
    fn pptx_entries_are_validated_up_front() {
        let mut entry = FileEntry::new(FileFormat::Pptx, "deck.pptx", Value::Null);
        entry.slides_data = Some(json!("not json"));
        assert!(matches!(
            PreparedEntry::from_entry(&entry),
            Err(ExportError::InvalidSlidesData { .. })
        ));
    }

    #[tokio::test]
    async fn fallback_content_is_used_once() {
        let bytes = write_with_fallback("test", 1u8, 2u8, |n| {
            if *n == 1 {
                Err(ExportError::Internal("boom".into()))
            } else {
                Ok(vec![*n])
            }
        })
        .await
        .unwrap();
        assert_eq!(bytes, vec![2]);

        let err = write_with_fallback("test", 1u8, 1u8, |_| -> Result<Vec<u8>, ExportError> {
            Err(ExportError::Internal("boom".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::RenderFailed { .. }));
    }

    #[tokio::test]
    async fn writer_panic_falls_back() {
        let bytes = write_with_fallback("test", 1u8, 2u8, |n| {
            if *n == 1 {
                panic!("writer bug");
            }
            Ok(vec![*n])
        })
        .await
        .unwrap();
        assert_eq!(bytes, vec![2]);
    }

    #[tokio::test]
    async fn csv_lands_under_its_url() {
        let dir = TempDir::new().unwrap();
        let exporter = exporter(&dir);
        let rows = vec![vec![CellValue::from("a"), CellValue::from(1.0)]];
        let out = exporter
            .create_csv(&rows, ArtifactOptions::new().filename("t.csv"))
            .await
            .unwrap();

        assert_eq!(out.filename, "t.csv");
        assert!(out.url.starts_with("http://files.test/exports/export_"));
        assert!(out.url.ends_with("/t.csv"));
        assert_eq!(std::fs::read_to_string(&out.path).unwrap(), "a,1\r\n");
    }

    #[tokio::test]
    async fn unsafe_filename_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let exporter = exporter(&dir);
        let err = exporter
            .create_file("x", "/etc/passwd", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidFilename { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
