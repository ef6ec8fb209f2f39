//! Input model: what callers hand to the exporter.
//!
//! Inputs arrive as loosely-typed JSON (an automation agent writes them), so
//! every type here has a lenient `from_value` constructor. The rule is the
//! same everywhere: known shapes map to closed variants, unknown shapes fall
//! back to a catch-all ([`Block::Generic`], [`CellValue::Text`]) carrying the
//! raw text. Content is never silently dropped.
//!
//! The only input errors that are fatal are structural ones the exporter
//! cannot guess around: a slide that is not a mapping, serialized slide data
//! that does not parse to a list.

use crate::error::ExportError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Content ──────────────────────────────────────────────────────────────

/// Document content for PDF and word-processor output.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Markdown source text.
    Markdown(String),
    /// List of typed content blocks.
    Blocks(Vec<Block>),
}

impl Content {
    /// Markdown given as a list of lines, joined with `\n`.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = lines
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Content::Markdown(joined)
    }

    /// Interpret a JSON value: string → markdown, list → blocks,
    /// a single mapping → one block, null → empty block list.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Content::Markdown(s.clone()),
            Value::Array(items) => Content::Blocks(items.iter().map(Block::from_value).collect()),
            Value::Null => Content::Blocks(Vec::new()),
            other => Content::Blocks(vec![Block::from_value(other)]),
        }
    }

    /// Interpret a JSON value as markdown whenever possible: a list made only
    /// of strings is joined line by line.
    pub fn markdown_from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) if items.iter().all(Value::is_string) => {
                Content::from_lines(items.iter().filter_map(Value::as_str))
            }
            other => Content::from_value(other),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Markdown(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Markdown(s)
    }
}

impl From<Vec<Block>> for Content {
    fn from(blocks: Vec<Block>) -> Self {
        Content::Blocks(blocks)
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Content::from_value(&value))
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────

/// One typed content block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Subtitle(String),
    Paragraph(String),
    List(BlockList),
    /// Literal image: URL or local path.
    Image { src: String, alt: String },
    /// Image to be looked up through the configured provider.
    ImageQuery(String),
    Table(Vec<Vec<String>>),
    /// Unknown block type, kept as text.
    Generic { kind: String, text: String },
}

/// A list of items given as a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockList {
    pub ordered: bool,
    pub items: Vec<BlockListItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockListItem {
    pub text: String,
    pub sub_list: Option<BlockList>,
}

impl Block {
    /// Lenient conversion from JSON. Never fails.
    ///
    /// | Shape | Block |
    /// |-------|-------|
    /// | `"text"` | `Paragraph` |
    /// | `{"type":"title","text":..}` | `Title` |
    /// | `{"type":"subtitle","text":..}` | `Subtitle` |
    /// | `{"type":"paragraph","text":..}` | `Paragraph` |
    /// | `{"type":"list","items":[..],"ordered":bool}` | `List` |
    /// | `{"type":"image","src"/"url"/"path":..,"alt":..}` | `Image` |
    /// | `{"type":"image_query","query":..}` | `ImageQuery` |
    /// | `{"type":"table","data"/"rows":[[..]]}` | `Table` |
    /// | `{"text":..}` | `Paragraph` |
    /// | anything else | `Generic` |
    pub fn from_value(value: &Value) -> Self {
        let obj = match value {
            Value::String(s) => return Block::Paragraph(s.clone()),
            Value::Object(obj) => obj,
            Value::Null => return Block::Paragraph(String::new()),
            other => {
                return Block::Generic {
                    kind: "value".into(),
                    text: scalar_text(other),
                }
            }
        };

        let text = || obj.get("text").map(scalar_text).unwrap_or_default();
        let kind = obj.get("type").and_then(Value::as_str).map(str::to_ascii_lowercase);

        match kind.as_deref() {
            Some("title") => Block::Title(text()),
            Some("subtitle") => Block::Subtitle(text()),
            Some("paragraph") | Some("text") => Block::Paragraph(text()),
            Some("list") => {
                let ordered = obj.get("ordered").and_then(Value::as_bool).unwrap_or(false);
                let items = obj.get("items").cloned().unwrap_or(Value::Null);
                Block::List(parse_list(&items, ordered))
            }
            Some("image") => {
                let src = ["src", "url", "path"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                    .map(str::to_string);
                match (src, obj.get("query").and_then(Value::as_str)) {
                    (Some(src), _) => Block::Image {
                        src,
                        alt: obj.get("alt").map(scalar_text).unwrap_or_default(),
                    },
                    (None, Some(query)) => Block::ImageQuery(query.to_string()),
                    (None, None) => Block::Generic {
                        kind: "image".into(),
                        text: text(),
                    },
                }
            }
            Some("image_query") => {
                let query = obj
                    .get("query")
                    .or_else(|| obj.get("text"))
                    .map(scalar_text)
                    .unwrap_or_default();
                Block::ImageQuery(query)
            }
            Some("table") => {
                let data = obj
                    .get("data")
                    .or_else(|| obj.get("rows"))
                    .cloned()
                    .unwrap_or(Value::Null);
                Block::Table(
                    parse_rows(&data)
                        .into_iter()
                        .map(|row| row.iter().map(CellValue::as_text).collect())
                        .collect(),
                )
            }
            Some(other) => Block::Generic {
                kind: other.to_string(),
                text: obj
                    .get("text")
                    .map(scalar_text)
                    .unwrap_or_else(|| value.to_string()),
            },
            None if obj.contains_key("text") => Block::Paragraph(text()),
            None => Block::Generic {
                kind: "object".into(),
                text: value.to_string(),
            },
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Block::from_value(&value))
    }
}

/// Parse list items. A nested JSON array attaches a sub-list to the
/// preceding item; an object may carry `text` plus its own `items`.
fn parse_list(items: &Value, ordered: bool) -> BlockList {
    let mut list = BlockList {
        ordered,
        items: Vec::new(),
    };
    let values: &[Value] = match items {
        Value::Array(values) => values,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    };

    for value in values {
        match value {
            Value::Array(_) => {
                let sub = parse_list(value, ordered);
                match list.items.last_mut() {
                    Some(prev) if prev.sub_list.is_none() => prev.sub_list = Some(sub),
                    _ => list.items.push(BlockListItem {
                        text: String::new(),
                        sub_list: Some(sub),
                    }),
                }
            }
            Value::Object(obj) => {
                let text = obj.get("text").map(scalar_text).unwrap_or_default();
                let sub_ordered = obj.get("ordered").and_then(Value::as_bool).unwrap_or(ordered);
                let sub_list = obj
                    .get("items")
                    .map(|nested| parse_list(nested, sub_ordered));
                list.items.push(BlockListItem { text, sub_list });
            }
            other => list.items.push(BlockListItem {
                text: scalar_text(other),
                sub_list: None,
            }),
        }
    }
    list
}

/// Plain text for a scalar; JSON text for compound values.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ── Slides ───────────────────────────────────────────────────────────────

/// Where a slide's image goes relative to its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePosition {
    Left,
    #[default]
    Right,
    Top,
    Bottom,
}

impl ImagePosition {
    pub const ALL: [ImagePosition; 4] = [
        ImagePosition::Left,
        ImagePosition::Right,
        ImagePosition::Top,
        ImagePosition::Bottom,
    ];

    /// Unrecognized positions fall back to `Right`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => ImagePosition::Left,
            "top" => ImagePosition::Top,
            "bottom" => ImagePosition::Bottom,
            _ => ImagePosition::Right,
        }
    }
}

/// Requested image footprint on a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [ImageSize::Small, ImageSize::Medium, ImageSize::Large];

    /// Unrecognized sizes fall back to `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => ImageSize::Small,
            "large" => ImageSize::Large,
            _ => ImageSize::Medium,
        }
    }

    /// `(width, height)` in inches.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            ImageSize::Small => (2.0, 1.5),
            ImageSize::Medium => (3.0, 2.0),
            ImageSize::Large => (4.0, 3.0),
        }
    }
}

/// One content slide as requested by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideSpec {
    pub title: String,
    pub content_lines: Vec<String>,
    pub image_query: Option<String>,
    pub image_position: ImagePosition,
    pub image_size: ImageSize,
}

impl SlideSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content_lines: Vec::new(),
            image_query: None,
            image_position: ImagePosition::default(),
            image_size: ImageSize::default(),
        }
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn image(mut self, query: impl Into<String>, position: ImagePosition, size: ImageSize) -> Self {
        self.image_query = Some(query.into());
        self.image_position = position;
        self.image_size = size;
        self
    }

    /// Same slide with the image request removed.
    pub fn without_image(&self) -> Self {
        Self {
            image_query: None,
            ..self.clone()
        }
    }

    pub fn wants_image(&self) -> bool {
        self.image_query
            .as_deref()
            .is_some_and(|q| !q.trim().is_empty())
    }

    /// Total characters of content text (drives font autosizing).
    pub fn total_chars(&self) -> usize {
        self.content_lines.iter().map(|l| l.chars().count()).sum()
    }

    /// Parse one slide mapping. `index` is 1-based and only used in errors.
    ///
    /// `title` defaults to "Untitled"; `content` may be a list or a single
    /// value; anything but a mapping is rejected.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, ExportError> {
        let obj = value.as_object().ok_or_else(|| ExportError::InvalidSlide {
            index,
            reason: format!("expected an object, got {}", json_type_name(value)),
        })?;

        let title = obj
            .get("title")
            .filter(|v| !v.is_null())
            .map(scalar_text)
            .unwrap_or_else(|| "Untitled".to_string());

        let content_lines = match obj.get("content") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(scalar_text).collect(),
            Some(other) => vec![scalar_text(other)],
        };

        let image_query = obj
            .get("image_query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        let image_position = obj
            .get("image_position")
            .and_then(Value::as_str)
            .map(ImagePosition::parse)
            .unwrap_or_default();

        let image_size = obj
            .get("image_size")
            .and_then(Value::as_str)
            .map(ImageSize::parse)
            .unwrap_or_default();

        Ok(Self {
            title,
            content_lines,
            image_query,
            image_position,
            image_size,
        })
    }
}

/// Parse a slide list. A string is treated as serialized JSON and must
/// decode to a list; anything that is not a list is rejected.
pub fn parse_slides(value: &Value) -> Result<Vec<SlideSpec>, ExportError> {
    let parsed;
    let list = match value {
        Value::Array(items) => items,
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).map_err(|e| {
                ExportError::InvalidSlidesData {
                    reason: format!("could not parse serialized slides: {e}"),
                }
            })?;
            parsed
                .as_array()
                .ok_or_else(|| ExportError::InvalidSlidesData {
                    reason: format!(
                        "serialized slides decode to {}, not a list",
                        json_type_name(&parsed)
                    ),
                })?
        }
        other => {
            return Err(ExportError::InvalidSlidesData {
                reason: format!("expected a list, got {}", json_type_name(other)),
            })
        }
    };

    list.iter()
        .enumerate()
        .map(|(i, v)| SlideSpec::from_value(i + 1, v))
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// ── Tabular data ─────────────────────────────────────────────────────────

/// One spreadsheet / CSV cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Text rendering used by CSV and document tables.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(CellValue::from_value(&value))
    }
}

/// Integers print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Ordered rows of ordered cells.
pub type Rows = Vec<Vec<CellValue>>;

/// Lenient row parsing: a list of lists is a table, a list of scalars is one
/// cell per row, a scalar is a single cell, null is no rows.
pub fn parse_rows(value: &Value) -> Rows {
    match value {
        Value::Null => Vec::new(),
        Value::Array(rows) => rows
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(CellValue::from_value).collect(),
                scalar => vec![CellValue::from_value(scalar)],
            })
            .collect(),
        scalar => vec![vec![CellValue::from_value(scalar)]],
    }
}

// ── Batch entries ────────────────────────────────────────────────────────

/// Target format of one batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Csv,
    /// Written verbatim (txt, py, cs, md, json, xml, …).
    Raw(String),
}

impl FileFormat {
    pub fn extension(&self) -> &str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Docx => "docx",
            FileFormat::Pptx => "pptx",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Csv => "csv",
            FileFormat::Raw(ext) => ext,
        }
    }
}

impl From<String> for FileFormat {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => FileFormat::Pdf,
            "docx" | "word" => FileFormat::Docx,
            "pptx" | "presentation" => FileFormat::Pptx,
            "xlsx" | "excel" => FileFormat::Xlsx,
            "csv" => FileFormat::Csv,
            other => FileFormat::Raw(other.trim_start_matches('.').to_string()),
        }
    }
}

impl From<FileFormat> for String {
    fn from(f: FileFormat) -> Self {
        f.extension().to_string()
    }
}

/// One artifact inside a `generate_and_archive` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub format: FileFormat,
    /// Relative name inside the archive. May contain subdirectories.
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub title: Option<String>,
    /// Slide list for `pptx` entries; takes precedence over `content`.
    #[serde(default, alias = "slide_data")]
    pub slides_data: Option<Value>,
}

impl FileEntry {
    pub fn new(format: FileFormat, filename: impl Into<String>, content: Value) -> Self {
        Self {
            format,
            filename: filename.into(),
            content,
            title: None,
            slides_data: None,
        }
    }
}
