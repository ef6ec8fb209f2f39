//! Template merge strategy: optional pre-styled prototypes per output kind.
//!
//! ## Lifecycle
//!
//! [`TemplateStore::scan`] runs once when the [`crate::Exporter`] is built.
//! It takes the first file per kind (by file name order) from one directory
//! and validates it as an OOXML package. A kind whose file is missing or
//! broken is logged and left empty; the other kinds still load.
//!
//! Prototypes are read-only. A render calls
//! [`TemplatePrototype::open`] to get its own [`OoxmlPackage`], edits that,
//! and serializes it. The shared bytes are never touched, so concurrent
//! renders can use one prototype without locking.
//!
//! ## Style lookup
//!
//! [`resolve_style`] prefers a template-defined style, then a short list of
//! common built-in names, and finally reports [`StyleChoice::Manual`] so the
//! writer applies bold/size by hand. A document is never left unstyled.

use crate::error::ExportError;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;

/// Output kinds that accept a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Document,
    SlideDeck,
    Spreadsheet,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [
        TemplateKind::Document,
        TemplateKind::SlideDeck,
        TemplateKind::Spreadsheet,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            TemplateKind::Document => "docx",
            TemplateKind::SlideDeck => "pptx",
            TemplateKind::Spreadsheet => "xlsx",
        }
    }

    /// Package part that must exist for the file to be usable.
    fn main_part(&self) -> &'static str {
        match self {
            TemplateKind::Document => "word/document.xml",
            TemplateKind::SlideDeck => "ppt/presentation.xml",
            TemplateKind::Spreadsheet => "xl/workbook.xml",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateKind::Document => "document",
            TemplateKind::SlideDeck => "slide deck",
            TemplateKind::Spreadsheet => "spreadsheet",
        };
        f.write_str(name)
    }
}

// ── Prototypes ───────────────────────────────────────────────────────────────

/// A validated template file held in memory.
#[derive(Clone)]
pub struct TemplatePrototype {
    kind: TemplateKind,
    path: PathBuf,
    bytes: Arc<[u8]>,
}

impl fmt::Debug for TemplatePrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplatePrototype")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl TemplatePrototype {
    /// Validate raw bytes as a template of `kind`.
    pub fn from_bytes(
        kind: TemplateKind,
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
    ) -> Result<Self, ExportError> {
        let path = path.into();
        let package = OoxmlPackage::from_bytes(&bytes)?;
        if package.get(kind.main_part()).is_none() {
            return Err(ExportError::InvalidContent {
                format: kind.extension().into(),
                reason: format!(
                    "'{}' has no {} part, it is not a {kind} template",
                    path.display(),
                    kind.main_part()
                ),
            });
        }
        Ok(Self {
            kind,
            path,
            bytes: bytes.into(),
        })
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw bytes of the shared prototype. Callers must not assume they can
    /// mutate them; use [`TemplatePrototype::open`] for a private copy.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A private, editable copy of the package.
    pub fn open(&self) -> Result<OoxmlPackage, ExportError> {
        OoxmlPackage::from_bytes(&self.bytes)
    }
}

/// Prototypes discovered at startup, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    document: Option<TemplatePrototype>,
    slide_deck: Option<TemplatePrototype>,
    spreadsheet: Option<TemplatePrototype>,
}

impl TemplateStore {
    /// Store with no templates: every render starts from a blank document.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan `dir` (non-recursive) for the first `.docx`, `.pptx` and `.xlsx`
    /// file in file-name order. Never fails: problems are logged and the
    /// affected kind stays empty.
    pub fn scan(dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            return Self::empty();
        };

        let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect(),
            Err(e) => {
                warn!("Template directory '{}' unreadable: {e}", dir.display());
                return Self::empty();
            }
        };
        files.sort();

        let mut store = Self::empty();
        for kind in TemplateKind::ALL {
            let Some(path) = files.iter().find(|p| has_extension(p, kind.extension())) else {
                debug!("No {kind} template in '{}'", dir.display());
                continue;
            };
            match load(kind, path) {
                Ok(proto) => {
                    info!("Loaded {kind} template '{}'", path.display());
                    store.set(proto);
                }
                Err(e) => warn!("Ignoring {kind} template '{}': {e}", path.display()),
            }
        }
        store
    }

    /// Install a prototype directly (tests and embedders).
    pub fn with(mut self, proto: TemplatePrototype) -> Self {
        self.set(proto);
        self
    }

    fn set(&mut self, proto: TemplatePrototype) {
        let slot = match proto.kind {
            TemplateKind::Document => &mut self.document,
            TemplateKind::SlideDeck => &mut self.slide_deck,
            TemplateKind::Spreadsheet => &mut self.spreadsheet,
        };
        *slot = Some(proto);
    }

    pub fn acquire(&self, kind: TemplateKind) -> Option<&TemplatePrototype> {
        match kind {
            TemplateKind::Document => self.document.as_ref(),
            TemplateKind::SlideDeck => self.slide_deck.as_ref(),
            TemplateKind::Spreadsheet => self.spreadsheet.as_ref(),
        }
    }

    pub fn loaded_kinds(&self) -> Vec<TemplateKind> {
        TemplateKind::ALL
            .into_iter()
            .filter(|k| self.acquire(*k).is_some())
            .collect()
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        // Office lock files (`~$deck.pptx`) are not templates.
        && !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("~$"))
}

fn load(kind: TemplateKind, path: &Path) -> Result<TemplatePrototype, ExportError> {
    let bytes = std::fs::read(path).map_err(|source| ExportError::TemplateReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    TemplatePrototype::from_bytes(kind, path, bytes)
}

// ── Style resolution ─────────────────────────────────────────────────────────

/// Outcome of a style lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleChoice {
    /// Use this style id.
    Named(String),
    /// No suitable style: format by hand.
    Manual,
}

/// Pick the first available style among `preferred` then `fallbacks`.
///
/// Matching ignores ASCII case and spaces, so `"Table Grid"` finds a style
/// with id `TableGrid`. The returned name is the template's own spelling.
pub fn resolve_style<S: AsRef<str>>(
    available: &[S],
    preferred: &str,
    fallbacks: &[&str],
) -> StyleChoice {
    let key = |s: &str| {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase()
    };
    std::iter::once(preferred)
        .chain(fallbacks.iter().copied())
        .find_map(|wanted| {
            let wanted = key(wanted);
            available
                .iter()
                .find(|s| key(s.as_ref()) == wanted)
                .map(|s| s.as_ref().to_string())
        })
        .map(StyleChoice::Named)
        .unwrap_or(StyleChoice::Manual)
}

// ── OOXML package copy ───────────────────────────────────────────────────────

/// An OPC zip package loaded into memory: ordered `(part name, bytes)`.
#[derive(Debug, Clone, Default)]
pub struct OoxmlPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl OoxmlPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExportError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(zip_error)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| ExportError::Internal(format!("template part read: {e}")))?;
            parts.push((file.name().to_string(), data));
        }
        Ok(Self { parts })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    /// Part as UTF-8 text.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|d| String::from_utf8_lossy(d).into_owned())
    }

    /// Insert or replace a part, keeping its original position.
    pub fn set(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.parts.retain(|(n, _)| n != name);
    }

    /// Remove every part whose name satisfies `pred`.
    pub fn remove_where<F: Fn(&str) -> bool>(&mut self, pred: F) {
        self.parts.retain(|(n, _)| !pred(n));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    /// Serialize with Deflate. `[Content_Types].xml` is written first.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let ordered = self
            .parts
            .iter()
            .filter(|(n, _)| n == "[Content_Types].xml")
            .chain(self.parts.iter().filter(|(n, _)| n != "[Content_Types].xml"));
        for (name, data) in ordered {
            zip.start_file(name.as_str(), options).map_err(zip_error)?;
            zip.write_all(data)
                .map_err(|e| ExportError::Internal(format!("package write: {e}")))?;
        }
        let cursor = zip.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }
}

fn zip_error(e: zip::result::ZipError) -> ExportError {
    ExportError::Internal(format!("OOXML package: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut pkg = OoxmlPackage::default();
        for (name, body) in parts {
            pkg.set(name, body.as_bytes().to_vec());
        }
        pkg.to_bytes().unwrap()
    }

    #[test]
    fn resolve_style_order() {
        let available = ["Normal", "Light Grid", "TableGrid"];
        assert_eq!(
            resolve_style(&available, "Table Grid", &["Light Grid"]),
            StyleChoice::Named("TableGrid".into())
        );
        assert_eq!(
            resolve_style(&available, "Fancy", &["light grid"]),
            StyleChoice::Named("Light Grid".into())
        );
        assert_eq!(
            resolve_style(&available, "Fancy", &["Other"]),
            StyleChoice::Manual
        );
    }

    #[test]
    fn package_roundtrip_keeps_parts() {
        let bytes = package(&[("a/b.xml", "<b/>"), ("[Content_Types].xml", "<Types/>")]);
        let mut pkg = OoxmlPackage::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.names().next(), Some("[Content_Types].xml"));
        pkg.set("a/b.xml", b"<c/>".to_vec());
        assert_eq!(pkg.get_str("a/b.xml").as_deref(), Some("<c/>"));
    }

    #[test]
    fn scan_takes_first_file_and_survives_broken_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a_report.docx"),
            package(&[("word/document.xml", "<w:document/>")]),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b_report.docx"),
            package(&[("word/document.xml", "<w:document/>")]),
        )
        .unwrap();
        std::fs::write(dir.path().join("deck.pptx"), b"not a zip").unwrap();
        std::fs::write(
            dir.path().join("book.xlsx"),
            package(&[("xl/workbook.xml", "<workbook/>")]),
        )
        .unwrap();

        let store = TemplateStore::scan(Some(dir.path()));
        let doc = store.acquire(TemplateKind::Document).unwrap();
        assert!(doc.path().ends_with("a_report.docx"));
        assert!(store.acquire(TemplateKind::SlideDeck).is_none());
        assert!(store.acquire(TemplateKind::Spreadsheet).is_some());
    }

    #[test]
    fn unreadable_template_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.docx");
        let err = load(TemplateKind::Document, &gone).unwrap_err();
        assert!(
            matches!(&err, ExportError::TemplateReadFailed { path, .. } if path == &gone),
            "got {err:?}"
        );
    }

    #[test]
    fn wrong_package_kind_is_rejected() {
        let bytes = package(&[("xl/workbook.xml", "<workbook/>")]);
        assert!(TemplatePrototype::from_bytes(TemplateKind::Document, "x.docx", bytes).is_err());
    }

    #[test]
    fn missing_directory_is_empty_store() {
        let store = TemplateStore::scan(Some(Path::new("/definitely/not/here")));
        assert!(store.loaded_kinds().is_empty());
        assert!(TemplateStore::scan(None).loaded_kinds().is_empty());
    }

    #[test]
    fn open_gives_private_copy() {
        let bytes = package(&[("xl/workbook.xml", "<workbook/>")]);
        let proto =
            TemplatePrototype::from_bytes(TemplateKind::Spreadsheet, "b.xlsx", bytes).unwrap();
        let mut copy = proto.open().unwrap();
        copy.set("xl/workbook.xml", b"<changed/>".to_vec());
        let fresh = proto.open().unwrap();
        assert_eq!(fresh.get_str("xl/workbook.xml").as_deref(), Some("<workbook/>"));
    }
}
