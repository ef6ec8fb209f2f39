//! PDF writer on lopdf: Letter pages, base-14 fonts, greedy wrapping.
//!
//! The writer keeps one cursor per page and starts a new page whenever the
//! next line would cross the bottom margin. There is no pagination engine:
//! no widow control, no keep-with-next, no columns.
//!
//! Text is encoded as WinAnsi. Characters outside that code page print as
//! `?`, which is what a Type1 base font can show without embedding.

use super::render_failed;
use crate::error::ExportError;
use crate::pipeline::flow::{image_placeholder, FlowBlock, ListBlock, ListEntry};
use crate::pipeline::image::ResolvedImage;
use crate::style::{FontFamily, Rgb, StyleId, StyleSheet, TextStyle};
use crate::tree::Align;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;
use tracing::{debug, warn};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const MAX_LIST_INDENT: f32 = CONTENT_WIDTH / 2.0;
const CELL_PADDING: f32 = 3.0;

/// Render flow blocks into PDF bytes.
pub fn render(blocks: &[FlowBlock], sheet: &StyleSheet) -> Result<Vec<u8>, ExportError> {
    let mut doc = build(blocks, sheet)?;
    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| render_failed("pdf", e))?;
    Ok(out)
}

fn build(blocks: &[FlowBlock], sheet: &StyleSheet) -> Result<Document, ExportError> {
    let mut writer = PdfWriter::new(sheet);
    for block in blocks {
        writer.block(block)?;
    }
    writer.finish()
}

// ── Fonts and text measurement ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Italic,
    Mono,
}

impl Face {
    const ALL: [Face; 4] = [Face::Regular, Face::Bold, Face::Italic, Face::Mono];

    fn of(style: &TextStyle) -> Self {
        match (style.font, style.bold, style.italic) {
            (FontFamily::Mono, _, _) => Face::Mono,
            (_, true, _) => Face::Bold,
            (_, _, true) => Face::Italic,
            _ => Face::Regular,
        }
    }

    fn resource_name(&self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Italic => "F3",
            Face::Mono => "F4",
        }
    }

    fn base_font(&self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
            Face::Italic => "Helvetica-Oblique",
            Face::Mono => "Courier",
        }
    }

    /// Average advance width per character, as a fraction of the font size.
    fn advance(&self) -> f32 {
        match self {
            Face::Regular | Face::Italic => 0.5,
            Face::Bold => 0.55,
            Face::Mono => 0.6,
        }
    }

    fn width(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * self.advance() * size
    }
}

/// Greedy word wrap. Explicit newlines are kept; a word wider than the
/// line is split by characters.
fn wrap(text: &str, max_width: f32, size: f32, face: Face) -> Vec<String> {
    let per_line = ((max_width / (face.advance() * size)).floor() as usize).max(1);
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        if face == Face::Mono {
            // Code keeps its spacing; only hard-break overlong lines.
            let chars: Vec<char> = raw.chars().collect();
            if chars.is_empty() {
                lines.push(String::new());
            }
            for chunk in chars.chunks(per_line) {
                lines.push(chunk.iter().collect());
            }
            continue;
        }

        let mut line = String::new();
        for word in raw.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > per_line {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let rest = word.split_off(per_line);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let candidate_len = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
            if candidate_len > per_line && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

/// WinAnsi bytes for a base-14 font. Unmappable characters become `?`.
fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            c if (c as u32) <= 255 => c as u8,
            _ => b'?',
        })
        .collect()
}

fn rgb(color: Rgb) -> Vec<Object> {
    let (r, g, b) = color.unit();
    vec![r.into(), g.into(), b.into()]
}

// ── Writer ───────────────────────────────────────────────────────────────────

struct PdfWriter<'a> {
    sheet: &'a StyleSheet,
    doc: Document,
    pages_id: ObjectId,
    fonts: Vec<(Face, ObjectId)>,
    images: Vec<(String, ObjectId)>,
    page_ids: Vec<ObjectId>,
    ops: Vec<Operation>,
    /// Top of the free area on the current page, in PDF user space.
    y: f32,
}

impl<'a> PdfWriter<'a> {
    fn new(sheet: &'a StyleSheet) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let fonts = Face::ALL
            .into_iter()
            .map(|face| {
                let id = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => face.base_font(),
                    "Encoding" => "WinAnsiEncoding",
                });
                (face, id)
            })
            .collect();
        Self {
            sheet,
            doc,
            pages_id,
            fonts,
            images: Vec::new(),
            page_ids: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn at_page_top(&self) -> bool {
        self.y >= PAGE_HEIGHT - MARGIN
    }

    /// Start a new page unless `height` still fits above the bottom margin.
    fn ensure(&mut self, height: f32) -> Result<(), ExportError> {
        if self.y - height < MARGIN && !self.at_page_top() {
            self.finish_page()?;
        }
        Ok(())
    }

    fn finish_page(&mut self) -> Result<(), ExportError> {
        let content = Content {
            operations: std::mem::take(&mut self.ops),
        };
        let encoded = content.encode().map_err(|e| render_failed("pdf", e))?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&encoded)
            .map_err(|e| render_failed("pdf", e))?;
        let compressed = encoder.finish().map_err(|e| render_failed("pdf", e))?;
        let content_id = self.doc.add_object(Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            compressed,
        ));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
        });
        self.page_ids.push(page_id);
        self.y = PAGE_HEIGHT - MARGIN;
        Ok(())
    }

    fn finish(mut self) -> Result<Document, ExportError> {
        if !self.ops.is_empty() || self.page_ids.is_empty() {
            self.finish_page()?;
        }

        let mut font_dict = Dictionary::new();
        for (face, id) in &self.fonts {
            font_dict.set(face.resource_name(), *id);
        }
        let mut xobjects = Dictionary::new();
        for (name, id) in &self.images {
            xobjects.set(name.as_str(), *id);
        }
        let resources_id = self.doc.add_object(dictionary! {
            "Font" => font_dict,
            "XObject" => xobjects,
        });

        for page_id in &self.page_ids {
            if let Ok(Object::Dictionary(page)) = self.doc.get_object_mut(*page_id) {
                page.set("Resources", resources_id);
            }
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let count = self.page_ids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        debug!("PDF assembled: {} page(s), {} image(s)", count, self.images.len());
        Ok(self.doc)
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    fn block(&mut self, block: &FlowBlock) -> Result<(), ExportError> {
        let spacing = self.sheet.spacing();
        match block {
            FlowBlock::Text { style, text, align } => {
                let text_style = self.sheet.get(*style).clone();
                let centered = text_style.centered || *align == Align::Center;
                if !self.at_page_top() {
                    self.y -= text_style.space_before;
                }
                self.paragraph(&text_style, text, 0.0, centered)?;
                let gap = if *style == StyleId::Body {
                    spacing.line_break
                } else {
                    text_style.space_after
                };
                self.y -= gap;
            }
            FlowBlock::List(list) => {
                self.list(list)?;
                self.y -= spacing.list;
            }
            FlowBlock::Table { rows } => {
                self.table(rows)?;
                self.y -= spacing.block;
            }
            FlowBlock::Image { image, alt } => {
                self.image(image, alt)?;
                self.y -= spacing.block;
            }
            FlowBlock::Spacer(size) => {
                self.y -= *size;
                if self.y < MARGIN {
                    self.finish_page()?;
                }
            }
        }
        Ok(())
    }

    /// Wrapped text starting at `MARGIN + style.indent + extra_indent`.
    fn paragraph(
        &mut self,
        style: &TextStyle,
        text: &str,
        extra_indent: f32,
        centered: bool,
    ) -> Result<(), ExportError> {
        let face = Face::of(style);
        let x = MARGIN + style.indent + extra_indent;
        let width = (CONTENT_WIDTH - style.indent - extra_indent).max(style.size);
        for line in wrap(text, width, style.size, face) {
            self.ensure(style.leading)?;
            self.y -= style.leading;
            if let Some(bg) = style.background {
                self.ops.push(Operation::new("rg", rgb(bg)));
                self.ops.push(Operation::new(
                    "re",
                    vec![(x - 4.0).into(), self.y.into(), (width + 8.0).into(), style.leading.into()],
                ));
                self.ops.push(Operation::new("f", vec![]));
            }
            if let Some(border) = style.border {
                self.ops.push(Operation::new("w", vec![1.0f32.into()]));
                self.ops.push(Operation::new("RG", rgb(border)));
                self.ops.push(Operation::new("m", vec![(x - 4.0).into(), self.y.into()]));
                self.ops.push(Operation::new(
                    "l",
                    vec![(x - 4.0).into(), (self.y + style.leading).into()],
                ));
                self.ops.push(Operation::new("S", vec![]));
            }
            let line_x = if centered {
                MARGIN + ((CONTENT_WIDTH - face.width(&line, style.size)) / 2.0).max(0.0)
            } else {
                x
            };
            let baseline = self.y + (style.leading - style.size) / 2.0 + style.size * 0.2;
            self.text_at(face, style.size, style.color, line_x, baseline, &line);
        }
        Ok(())
    }

    fn text_at(&mut self, face: Face, size: f32, color: Rgb, x: f32, y: f32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(face.resource_name().as_bytes().to_vec()), size.into()],
        ));
        self.ops.push(Operation::new("rg", rgb(color)));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    /// Lists are walked with an explicit stack; nesting depth is unbounded.
    fn list(&mut self, root: &ListBlock) -> Result<(), ExportError> {
        let style = self.sheet.get(StyleId::ListItem).clone();
        let indent = self.sheet.list_indent();
        // (list, next entry, items numbered so far)
        let mut stack: Vec<(&ListBlock, usize, usize)> = vec![(root, 0, 0)];

        while let Some(frame) = stack.last_mut() {
            let list: &ListBlock = frame.0;
            let Some(entry) = list.items.get(frame.1) else {
                stack.pop();
                continue;
            };
            frame.1 += 1;
            match entry {
                ListEntry::Text(text) => {
                    frame.2 += 1;
                    let number = frame.2;
                    let marker = if list.ordered {
                        format!("{number}.")
                    } else {
                        "•".to_string()
                    };
                    let level_indent = list_indent(list.depth, indent);
                    self.list_item(&style, &marker, text, level_indent)?;
                }
                ListEntry::List(sub) => stack.push((sub, 0, 0)),
            }
        }
        Ok(())
    }

    fn list_item(
        &mut self,
        style: &TextStyle,
        marker: &str,
        text: &str,
        indent: f32,
    ) -> Result<(), ExportError> {
        let face = Face::of(style);
        self.ensure(style.leading)?;
        let marker_x = MARGIN + indent - face.width(marker, style.size) - 4.0;
        // The marker shares the baseline of the item's first line.
        let baseline = self.y - style.leading + (style.leading - style.size) / 2.0 + style.size * 0.2;
        self.text_at(face, style.size, style.color, marker_x.max(MARGIN), baseline, marker);
        self.paragraph(style, text, indent, false)
    }

    fn table(&mut self, rows: &[Vec<String>]) -> Result<(), ExportError> {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }
        let body = self.sheet.get(StyleId::Body).clone();
        let size = body.size - 1.0;
        let leading = size * 1.25;
        let col_width = CONTENT_WIDTH / columns as f32;

        for (r, row) in rows.iter().enumerate() {
            let face = if r == 0 { Face::Bold } else { Face::Regular };
            let cells: Vec<Vec<String>> = (0..columns)
                .map(|c| {
                    let text = row.get(c).map(String::as_str).unwrap_or("");
                    wrap(text, col_width - 2.0 * CELL_PADDING, size, face)
                })
                .collect();
            let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let row_height = lines as f32 * leading + 2.0 * CELL_PADDING;

            self.ensure(row_height)?;
            let top = self.y;
            self.y -= row_height;

            self.ops.push(Operation::new("w", vec![0.5f32.into()]));
            self.ops.push(Operation::new("RG", rgb(Rgb(0x99, 0x99, 0x99))));
            for c in 0..columns {
                let x = MARGIN + c as f32 * col_width;
                self.ops.push(Operation::new(
                    "re",
                    vec![x.into(), self.y.into(), col_width.into(), row_height.into()],
                ));
            }
            self.ops.push(Operation::new("S", vec![]));

            for (c, cell) in cells.iter().enumerate() {
                let x = MARGIN + c as f32 * col_width + CELL_PADDING;
                for (l, line) in cell.iter().enumerate() {
                    let baseline = top - CELL_PADDING - (l as f32 + 1.0) * leading + size * 0.25;
                    self.text_at(face, size, body.color, x, baseline, line);
                }
            }
        }
        Ok(())
    }

    fn image(&mut self, image: &ResolvedImage, alt: &str) -> Result<(), ExportError> {
        let samples = match image.rgb8() {
            Ok(s) => s,
            Err(e) => {
                warn!("Image '{alt}' could not be embedded: {e}");
                let body = self.sheet.get(StyleId::Body).clone();
                return self.paragraph(&body, &image_placeholder(alt), 0.0, false);
            }
        };

        let (box_w, box_h) = self.sheet.pdf_image_box();
        let scale = (box_w / image.width as f32).min(box_h / image.height as f32);
        let (w, h) = (image.width as f32 * scale, image.height as f32 * scale);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&samples)
            .map_err(|e| render_failed("pdf", e))?;
        let compressed = encoder.finish().map_err(|e| render_failed("pdf", e))?;
        let xobject_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            compressed,
        ));
        let name = format!("Im{}", self.images.len() + 1);
        self.images.push((name.clone(), xobject_id));

        self.ensure(h)?;
        self.y -= h;
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![w.into(), 0.into(), 0.into(), h.into(), MARGIN.into(), self.y.into()],
        ));
        self.ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        self.ops.push(Operation::new("Q", vec![]));
        Ok(())
    }
}

/// Indent for a list level, capped at half the text width so deep nesting
/// stays inside the right margin.
fn list_indent(depth: usize, step: f32) -> f32 {
    (step * (depth as f32 + 1.0)).min(MAX_LIST_INDENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flow::GENERATION_ERROR_TEXT;

    fn tiny_image() -> ResolvedImage {
        let img = image::DynamicImage::new_rgb8(4, 2);
        ResolvedImage::from_image("tiny", img).unwrap()
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("one two three four five six", 50.0, 10.0, Face::Regular);
        // 50pt at 5pt per char: ten characters per line.
        assert_eq!(lines, vec!["one two", "three four", "five six"]);
    }

    #[test]
    fn wrap_splits_overlong_words_and_keeps_newlines() {
        let lines = wrap("abcdefghijkl\nx", 25.0, 10.0, Face::Regular);
        assert_eq!(lines, vec!["abcde", "fghij", "kl", "x"]);
    }

    #[test]
    fn mono_wrap_keeps_indentation() {
        let lines = wrap("    let x = 1;", 200.0, 10.0, Face::Mono);
        assert_eq!(lines, vec!["    let x = 1;"]);
    }

    #[test]
    fn win_ansi_mapping() {
        assert_eq!(to_win_ansi("a•é"), vec![b'a', 0x95, 0xE9]);
        assert_eq!(to_win_ansi("漢"), vec![b'?']);
    }

    #[test]
    fn long_story_breaks_pages() {
        let blocks: Vec<FlowBlock> = (0..200)
            .map(|i| FlowBlock::text(StyleId::Body, format!("Paragraph number {i} with some text.")))
            .collect();
        let doc = build(&blocks, StyleSheet::shared()).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn mixed_blocks_render() {
        let list = ListBlock {
            ordered: true,
            depth: 0,
            items: vec![
                ListEntry::Text("first".into()),
                ListEntry::List(ListBlock {
                    ordered: false,
                    depth: 1,
                    items: vec![ListEntry::Text("nested".into())],
                }),
            ],
        };
        let blocks = vec![
            FlowBlock::text(StyleId::Heading1, "Title (with parens)"),
            FlowBlock::List(list),
            FlowBlock::Table {
                rows: vec![vec!["a".into(), "b".into()], vec!["1".into(), "2".into()]],
            },
            FlowBlock::Image {
                image: tiny_image(),
                alt: "tiny".into(),
            },
            FlowBlock::Spacer(10.0),
            FlowBlock::text(StyleId::Code, "fn main() {}"),
        ];
        let doc = build(&blocks, StyleSheet::shared()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let bytes = render(&blocks, StyleSheet::shared()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
    }

    #[test]
    fn deep_list_indent_is_capped() {
        assert_eq!(list_indent(0, 18.0), 18.0);
        assert_eq!(list_indent(2, 18.0), 54.0);
        assert_eq!(list_indent(40, 18.0), MAX_LIST_INDENT);
        assert!(MARGIN + list_indent(usize::MAX / 2, 18.0) < PAGE_WIDTH - MARGIN);

        // Forty levels deep still renders on one page.
        let mut list = ListBlock {
            ordered: false,
            depth: 40,
            items: vec![ListEntry::Text("deepest".into())],
        };
        for depth in (0..40).rev() {
            list = ListBlock {
                ordered: depth % 2 == 0,
                depth,
                items: vec![ListEntry::Text(format!("level {depth}")), ListEntry::List(list)],
            };
        }
        let doc = build(&[FlowBlock::List(list)], StyleSheet::shared()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn fallback_story_renders() {
        let bytes = render(&FlowBlock::fallback_story(), StyleSheet::shared()).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(GENERATION_ERROR_TEXT, "Error in generation");
    }

    #[test]
    fn empty_input_still_has_a_page() {
        let doc = build(&[], StyleSheet::shared()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
