//! # edgequake-export
//!
//! Render markdown, typed content blocks, slide specs and tables into PDF,
//! DOCX, PPTX, XLSX, CSV, raw files, or an archive bundling several of them.
//!
//! ## Why this crate?
//!
//! An automation agent wants to say "render this content as format X" and get
//! a URL back. It should not need to know about page layout, font sizing,
//! list numbering or the internals of OOXML packages. This crate owns those
//! decisions: content goes in loosely typed, a finished artifact comes out.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Content
//!  │
//!  ├─ 1. Prepare    deterministic markdown cleanup (regex rules)
//!  ├─ 2. Normalize  markdown / blocks → element tree
//!  ├─ 3. Layout     flow blocks (documents) or slide geometry (decks),
//!  │                images resolved per block, failures become placeholders
//!  ├─ 4. Write      pdf / docx / pptx / xlsx / csv / raw (spawn_blocking)
//!  └─ 5. Publish    export_<uuid>_<timestamp>/ folder, URL, timed cleanup
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_export::{ArtifactOptions, Content, ExportConfig, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Output folder, base URL and image provider come from the environment.
//!     let exporter = Exporter::new(ExportConfig::from_env()?)?;
//!     let content = Content::from("# Report\n\nSome **bold** text\n\n- a\n- b");
//!     let out = exporter
//!         .create_pdf(&content, ArtifactOptions::new().filename("report.pdf"))
//!         .await?;
//!     println!("{}", out.url);
//!     Ok(())
//! }
//! ```
//!
//! ## Error model
//!
//! One failed block never fails the document: a missing image becomes
//! `[Image not found for: …]`. A writer that fails on the full content is
//! retried with a one-paragraph fallback. Only malformed input and I/O
//! failures are returned as [`ExportError`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2doc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-export = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;
pub mod style;
pub mod tree;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, ImageSource};
pub use content::{
    parse_rows, parse_slides, Block, CellValue, Content, FileEntry, FileFormat, ImagePosition,
    ImageSize, Rows, SlideSpec,
};
pub use error::{BlockError, ExportError};
pub use export::{ArtifactOptions, Exporter};
pub use output::ExportOutput;
pub use pipeline::flow::{FlowBlock, ListBlock, ListEntry};
pub use pipeline::image::{HttpImageResolver, ImageRef, ImageResolver, ResolvedImage};
pub use pipeline::normalize::normalize;
pub use pipeline::slide::{dynamic_font_size, layout, Rect, SlideFrame, SlideLayout};
pub use pipeline::template::{resolve_style, TemplateKind, TemplatePrototype, TemplateStore};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::CleanupScheduler;
pub use style::{StyleId, StyleSheet};
pub use tree::{Element, ElementTree};
