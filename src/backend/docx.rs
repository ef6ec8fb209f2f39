//! Word-processor writer on docx-rs.
//!
//! ## Blank documents
//!
//! A fresh [`Docx`] gets the built-in styles below, built from the shared
//! [`StyleSheet`] so that PDF and DOCX agree on sizes and colours.
//!
//! ## Templates
//!
//! A template is read with `read_docx`. Its styles, numbering and section
//! properties are kept and its body is dropped, except that the first
//! paragraph is reused as the title slot when a title is given. Styles are
//! looked up with [`resolve_style`]; when a template lacks every candidate
//! the writer formats runs by hand (bold, size, colour).

use super::render_failed;
use crate::error::ExportError;
use crate::pipeline::flow::{FlowBlock, ListBlock, ListEntry};
use crate::pipeline::image::ResolvedImage;
use crate::pipeline::template::{resolve_style, StyleChoice, TemplatePrototype};
use crate::style::{StyleId, StyleSheet, TextStyle};
use crate::tree::Align;
use docx_rs::{
    read_docx, AbstractNumbering, AlignmentType, BreakType, DocumentChild, Docx, IndentLevel,
    Level, LevelJc, LevelText, NumberFormat, Numbering, NumberingId, Paragraph, Pic, Run,
    RunFonts, SpecialIndentType, Start, Style, StyleType, Table, TableCell, TableRow,
};
use std::io::Cursor;
use tracing::{debug, warn};

const EMU_PER_INCH: f64 = 914_400.0;
const MONO_FONT: &str = "Courier New";
/// Numbering ids used on top of a template, clear of ids it may define.
const TEMPLATE_NUMBERING_BASE: usize = 9001;
/// Deepest list level a numbering definition describes.
const MAX_LIST_LEVEL: usize = 8;

/// Built-in paragraph style ids written into blank documents.
const BUILTIN_STYLES: [&str; 10] = [
    "Title",
    "Subtitle",
    "Heading1",
    "Heading2",
    "Heading3",
    "CodeBlock",
    "Quote",
    "ListBullet",
    "ListNumber",
    "TableGrid",
];

/// Render flow blocks into DOCX bytes.
pub fn render(
    blocks: &[FlowBlock],
    title: Option<&str>,
    sheet: &StyleSheet,
    template: Option<&TemplatePrototype>,
) -> Result<Vec<u8>, ExportError> {
    let base = match template {
        Some(proto) => from_template(proto, title).unwrap_or_else(|e| {
            warn!(
                "Document template '{}' unusable, using a blank document: {e}",
                proto.path().display()
            );
            blank(title, sheet)
        }),
        None => blank(title, sheet),
    };

    let mut writer = DocxWriter::new(base, sheet);
    for block in blocks {
        writer.block(block);
    }
    writer.pack()
}

// ── Document bases ───────────────────────────────────────────────────────────

struct Base {
    docx: Docx,
    styles: Vec<String>,
    next_numbering: usize,
}

fn blank(title: Option<&str>, sheet: &StyleSheet) -> Base {
    let mut docx = builtin_styles(Docx::new(), sheet);
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        docx = docx.add_paragraph(
            Paragraph::new()
                .style("Title")
                .align(AlignmentType::Center)
                .add_run(Run::new().add_text(title)),
        );
    }
    Base {
        docx,
        styles: BUILTIN_STYLES.iter().map(|s| s.to_string()).collect(),
        next_numbering: 1,
    }
}

fn from_template(proto: &TemplatePrototype, title: Option<&str>) -> Result<Base, ExportError> {
    let mut docx = read_docx(proto.bytes()).map_err(|e| render_failed("docx", e))?;
    let styles: Vec<String> = docx
        .styles
        .styles
        .iter()
        .map(|s| s.style_id.clone())
        .collect();

    let title_slot = docx.document.children.iter().find_map(|child| match child {
        DocumentChild::Paragraph(p) => Some(p.property.clone()),
        _ => None,
    });
    docx.document.children.clear();

    match (title.filter(|t| !t.trim().is_empty()), title_slot) {
        (Some(title), Some(property)) => {
            let mut para = Paragraph::new().add_run(Run::new().add_text(title));
            para.property = property;
            docx = docx.add_paragraph(para);
        }
        (Some(title), None) => {
            let para = match resolve_style(&styles, "Title", &["Heading1"]) {
                StyleChoice::Named(id) => Paragraph::new().style(&id),
                StyleChoice::Manual => Paragraph::new(),
            };
            docx = docx.add_paragraph(para.add_run(Run::new().add_text(title).bold()));
        }
        (None, _) => {}
    }
    debug!("Document template '{}': {} style(s)", proto.path().display(), styles.len());

    Ok(Base {
        docx,
        styles,
        next_numbering: TEMPLATE_NUMBERING_BASE,
    })
}

fn half_points(points: f32) -> usize {
    (points * 2.0).round() as usize
}

fn paragraph_style(id: &str, name: &str, style: &TextStyle) -> Style {
    let mut s = Style::new(id, StyleType::Paragraph)
        .name(name)
        .size(half_points(style.size))
        .color(&style.color.hex());
    if style.bold {
        s = s.bold();
    }
    if style.italic {
        s = s.italic();
    }
    if style.centered {
        s = s.align(AlignmentType::Center);
    }
    s
}

fn builtin_styles(docx: Docx, sheet: &StyleSheet) -> Docx {
    let mono = RunFonts::new()
        .ascii(MONO_FONT)
        .hi_ansi(MONO_FONT)
        .east_asia(MONO_FONT)
        .cs(MONO_FONT);
    let quote = sheet.get(StyleId::Blockquote);
    let list = sheet.get(StyleId::ListItem);

    docx.add_style(paragraph_style("Title", "Title", sheet.get(StyleId::Title)))
        .add_style(paragraph_style("Subtitle", "Subtitle", sheet.get(StyleId::Subtitle)))
        .add_style(paragraph_style("Heading1", "Heading 1", sheet.get(StyleId::Heading1)))
        .add_style(paragraph_style("Heading2", "Heading 2", sheet.get(StyleId::Heading2)))
        .add_style(paragraph_style("Heading3", "Heading 3", sheet.get(StyleId::Heading3)))
        .add_style(
            paragraph_style("CodeBlock", "Code Block", sheet.get(StyleId::Code)).fonts(mono),
        )
        .add_style(
            paragraph_style("Quote", "Quote", quote).indent(
                Some((quote.indent * 20.0) as i32),
                None,
                None,
                None,
            ),
        )
        .add_style(paragraph_style("ListBullet", "List Bullet", list))
        .add_style(paragraph_style("ListNumber", "List Number", list))
        .add_style(Style::new("TableGrid", StyleType::Table).name("Table Grid"))
}

// ── Writer ───────────────────────────────────────────────────────────────────

struct DocxWriter<'a> {
    docx: Docx,
    styles: Vec<String>,
    sheet: &'a StyleSheet,
    next_numbering: usize,
}

impl<'a> DocxWriter<'a> {
    fn new(base: Base, sheet: &'a StyleSheet) -> Self {
        Self {
            docx: base.docx,
            styles: base.styles,
            sheet,
            next_numbering: base.next_numbering,
        }
    }

    fn pack(self) -> Result<Vec<u8>, ExportError> {
        let mut buffer = Vec::new();
        self.docx
            .build()
            .pack(&mut Cursor::new(&mut buffer))
            .map_err(|e| render_failed("docx", e))?;
        Ok(buffer)
    }

    fn push(&mut self, para: Paragraph) {
        let docx = std::mem::take(&mut self.docx);
        self.docx = docx.add_paragraph(para);
    }

    fn style_for(&self, id: StyleId) -> Option<StyleChoice> {
        let (preferred, fallbacks): (&str, &[&str]) = match id {
            StyleId::Title => ("Title", &["Heading1"]),
            StyleId::Subtitle => ("Subtitle", &["Heading2"]),
            StyleId::Heading1 => ("Heading1", &["Title"]),
            StyleId::Heading2 => ("Heading2", &["Subtitle"]),
            StyleId::Heading3 => ("Heading3", &["Heading2"]),
            StyleId::Code => ("CodeBlock", &["HTMLPreformatted", "Code", "PlainText"]),
            StyleId::Blockquote => ("Quote", &["IntenseQuote", "BlockText"]),
            StyleId::Body | StyleId::ListItem => return None,
        };
        Some(resolve_style(&self.styles, preferred, fallbacks))
    }

    /// A run carrying `text`, with newlines turned into line breaks.
    fn run(text: &str) -> Run {
        let mut run = Run::new();
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                run = run.add_break(BreakType::TextWrapping);
            }
            run = run.add_text(line);
        }
        run
    }

    fn manual(&self, mut run: Run, id: StyleId) -> Run {
        let style = self.sheet.get(id);
        run = run.size(half_points(style.size)).color(&style.color.hex());
        if style.bold {
            run = run.bold();
        }
        if style.italic {
            run = run.italic();
        }
        if id == StyleId::Code {
            run = run.fonts(RunFonts::new().ascii(MONO_FONT).hi_ansi(MONO_FONT));
        }
        run
    }

    fn block(&mut self, block: &FlowBlock) {
        match block {
            FlowBlock::Text { style, text, align } => {
                let mut para = Paragraph::new();
                let mut run = Self::run(text);
                match self.style_for(*style) {
                    Some(StyleChoice::Named(id)) => para = para.style(&id),
                    Some(StyleChoice::Manual) => run = self.manual(run, *style),
                    None => {}
                }
                if *align == Align::Center || self.sheet.get(*style).centered {
                    para = para.align(AlignmentType::Center);
                }
                self.push(para.add_run(run));
            }
            FlowBlock::List(list) => self.list(list),
            FlowBlock::Table { rows } => self.table(rows),
            FlowBlock::Image { image, .. } => self.image(image),
            FlowBlock::Spacer(_) => self.push(Paragraph::new()),
        }
    }

    /// One numbering definition per list block; items sit at the block's
    /// depth. Walked with an explicit stack.
    fn list(&mut self, root: &ListBlock) {
        let mut stack: Vec<(&ListBlock, usize, usize)> = Vec::new();
        let root_id = self.numbering(root.ordered);
        stack.push((root, 0, root_id));

        while let Some(frame) = stack.last_mut() {
            let list: &ListBlock = frame.0;
            let numbering_id = frame.2;
            let Some(entry) = list.items.get(frame.1) else {
                stack.pop();
                continue;
            };
            frame.1 += 1;
            match entry {
                ListEntry::Text(text) => {
                    let level = list.depth.min(MAX_LIST_LEVEL);
                    let preferred = if list.ordered { "ListNumber" } else { "ListBullet" };
                    let mut para = Paragraph::new()
                        .numbering(NumberingId::new(numbering_id), IndentLevel::new(level));
                    if let StyleChoice::Named(id) =
                        resolve_style(&self.styles, preferred, &["ListParagraph"])
                    {
                        para = para.style(&id);
                    }
                    self.push(para.add_run(Self::run(text)));
                }
                ListEntry::List(sub) => {
                    let id = self.numbering(sub.ordered);
                    stack.push((sub, 0, id));
                }
            }
        }
    }

    fn numbering(&mut self, ordered: bool) -> usize {
        let id = self.next_numbering;
        self.next_numbering += 1;

        let mut abstract_numbering = AbstractNumbering::new(id);
        for level in 0..=MAX_LIST_LEVEL {
            let (format, text) = if ordered {
                ("decimal", format!("%{}.", level + 1))
            } else {
                ("bullet", "•".to_string())
            };
            abstract_numbering = abstract_numbering.add_level(
                Level::new(
                    level,
                    Start::new(1),
                    NumberFormat::new(format),
                    LevelText::new(text),
                    LevelJc::new("left"),
                )
                .indent(
                    Some(720 * (level as i32 + 1)),
                    Some(SpecialIndentType::Hanging(360)),
                    None,
                    None,
                ),
            );
        }

        let docx = std::mem::take(&mut self.docx);
        self.docx = docx
            .add_abstract_numbering(abstract_numbering)
            .add_numbering(Numbering::new(id, id));
        id
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let styled = resolve_style(&self.styles, "TableGrid", &["Table Grid", "LightGrid"]);

        let table_rows = rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let cells = (0..columns)
                    .map(|c| {
                        let text = row.get(c).map(String::as_str).unwrap_or("");
                        let mut run = Run::new().add_text(text);
                        if r == 0 {
                            run = run.bold();
                        }
                        TableCell::new().add_paragraph(Paragraph::new().add_run(run))
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();

        let mut table = Table::new(table_rows);
        if let StyleChoice::Named(id) = styled {
            table = table.style(&id);
        }
        let docx = std::mem::take(&mut self.docx);
        self.docx = docx.add_table(table);
    }

    fn image(&mut self, image: &ResolvedImage) {
        let width_in = self.sheet.doc_picture_width_in() as f64;
        let emu_w = (width_in * EMU_PER_INCH).round() as u32;
        let emu_h = (width_in * image.aspect() * EMU_PER_INCH).round() as u32;
        let pic = Pic::new_with_dimensions(image.png.clone(), image.width, image.height)
            .size(emu_w, emu_h);
        self.push(Paragraph::new().add_run(Run::new().add_image(pic)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::template::{OoxmlPackage, TemplateKind};

    fn document_xml(bytes: &[u8]) -> String {
        OoxmlPackage::from_bytes(bytes)
            .unwrap()
            .get_str("word/document.xml")
            .unwrap()
    }

    fn sample_blocks() -> Vec<FlowBlock> {
        let img = image::DynamicImage::new_rgb8(4, 2);
        vec![
            FlowBlock::Text {
                style: StyleId::Heading1,
                text: "Report".into(),
                align: Align::Center,
            },
            FlowBlock::text(StyleId::Body, "Body text"),
            FlowBlock::List(ListBlock {
                ordered: false,
                depth: 0,
                items: vec![
                    ListEntry::Text("one".into()),
                    ListEntry::List(ListBlock {
                        ordered: true,
                        depth: 1,
                        items: vec![ListEntry::Text("one.a".into())],
                    }),
                ],
            }),
            FlowBlock::Table {
                rows: vec![vec!["h1".into(), "h2".into()], vec!["v1".into()]],
            },
            FlowBlock::Image {
                image: ResolvedImage::from_image("tiny", img).unwrap(),
                alt: "tiny".into(),
            },
        ]
    }

    #[test]
    fn blank_document_carries_content() {
        let bytes = render(&sample_blocks(), Some("Cover"), StyleSheet::shared(), None).unwrap();
        let xml = document_xml(&bytes);
        for text in ["Cover", "Report", "Body text", "one.a", "h2", "v1"] {
            assert!(xml.contains(text), "missing {text}");
        }
        assert!(xml.contains("w:numPr"));
        assert!(xml.contains("w:tbl"));

        let pkg = OoxmlPackage::from_bytes(&bytes).unwrap();
        assert!(pkg.names().any(|n| n.starts_with("word/media/")));
        assert!(pkg.get_str("word/styles.xml").unwrap().contains("CodeBlock"));
    }

    #[test]
    fn template_title_slot_is_reused() {
        let mut template = Vec::new();
        Docx::new()
            .add_style(Style::new("BrandHeading", StyleType::Paragraph).name("Brand Heading"))
            .add_paragraph(
                Paragraph::new()
                    .style("BrandHeading")
                    .add_run(Run::new().add_text("Placeholder title")),
            )
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Old body")))
            .build()
            .pack(&mut Cursor::new(&mut template))
            .unwrap();
        let proto =
            TemplatePrototype::from_bytes(TemplateKind::Document, "brand.docx", template).unwrap();

        let blocks = vec![FlowBlock::text(StyleId::Body, "Fresh paragraph")];
        let bytes =
            render(&blocks, Some("Quarterly"), StyleSheet::shared(), Some(&proto)).unwrap();
        let xml = document_xml(&bytes);
        assert!(xml.contains("Quarterly"));
        assert!(xml.contains("Fresh paragraph"));
        assert!(xml.contains("BrandHeading"));
        assert!(!xml.contains("Placeholder title"));
        assert!(!xml.contains("Old body"));
    }

    #[test]
    fn broken_template_falls_back_to_blank() {
        let mut pkg = OoxmlPackage::default();
        pkg.set("word/document.xml", "not xml at all <<<");
        let proto = TemplatePrototype::from_bytes(
            TemplateKind::Document,
            "broken.docx",
            pkg.to_bytes().unwrap(),
        )
        .unwrap();
        let blocks = vec![FlowBlock::text(StyleId::Body, "Still here")];
        let bytes = render(&blocks, None, StyleSheet::shared(), Some(&proto)).unwrap();
        assert!(document_xml(&bytes).contains("Still here"));
    }

    #[test]
    fn fallback_story_packs() {
        let bytes = render(&FlowBlock::fallback_story(), None, StyleSheet::shared(), None).unwrap();
        assert!(document_xml(&bytes).contains("Error in generation"));
    }
}
