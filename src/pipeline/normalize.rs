//! Normalization: any [`Content`] value → one canonical [`ElementTree`].
//!
//! Markdown goes through [`super::prepare`] and then `pulldown-cmark`; each
//! markup construct maps to exactly one node kind:
//!
//! | Markup | Node |
//! |--------|------|
//! | `#`..`###` | `Heading{1..3}` |
//! | `####`..`######` | `Generic{"h4".."h6"}` |
//! | paragraph | `Paragraph` (image-only paragraphs become `Image` nodes) |
//! | `-` / `1.` lists | `List` with nested `sub_lists` |
//! | `>` | `Blockquote` |
//! | fenced / indented code | `CodeBlock` |
//! | GFM table | `Table` |
//! | `---` | `Generic{"hr"}` |
//! | block HTML | `LineBreak` for `<br>`, otherwise `Generic{"html"}` |
//!
//! Typed block lists skip the markup round-trip and map directly.
//!
//! Image-query blocks are *not* resolved here. They stay as
//! `Image{src="image_query:<text>"}` markers so a lookup failure later on
//! only affects that one block.

use crate::content::{Block, BlockList, Content};
use crate::pipeline::prepare::prepare_markdown;
use crate::tree::{Align, Element, ElementTree, ListItem, ListNode};
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use tracing::debug;

/// Normalize any supported content value.
///
/// Empty or all-blank input yields [`ElementTree::placeholder`], so every
/// render has at least one node.
pub fn normalize(content: &Content) -> ElementTree {
    let tree = match content {
        Content::Markdown(md) => normalize_markdown(md),
        Content::Blocks(blocks) => normalize_blocks(blocks),
    };
    debug!("Normalized content into {} element(s)", tree.len());
    tree
}

/// Normalize a Markdown document.
pub fn normalize_markdown(markdown: &str) -> ElementTree {
    let prepared = prepare_markdown(markdown);
    if prepared.trim().is_empty() {
        return ElementTree::placeholder();
    }

    let mut builder = TreeBuilder::default();
    for event in Parser::new_ext(&prepared, Options::ENABLE_TABLES) {
        builder.handle(event);
    }
    finish(builder.nodes)
}

/// Normalize a typed block list. Blocks carrying no text are dropped.
pub fn normalize_blocks(blocks: &[Block]) -> ElementTree {
    let nodes = blocks.iter().filter_map(block_to_element).collect();
    finish(nodes)
}

fn finish(nodes: Vec<Element>) -> ElementTree {
    if nodes.is_empty() {
        ElementTree::placeholder()
    } else {
        ElementTree::new(nodes)
    }
}

// ── Typed blocks ─────────────────────────────────────────────────────────────

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn block_to_element(block: &Block) -> Option<Element> {
    match block {
        Block::Title(text) => non_empty(text).map(|text| Element::Heading {
            level: 1,
            text,
            align: Align::Center,
        }),
        Block::Subtitle(text) => non_empty(text).map(|text| Element::Heading {
            level: 2,
            text,
            align: Align::Center,
        }),
        Block::Paragraph(text) => non_empty(text).map(Element::paragraph),
        Block::List(list) => {
            let node = list_to_node(list);
            (!node.items.is_empty()).then_some(Element::List(node))
        }
        Block::Image { src, alt } => non_empty(src).map(|src| Element::image(src, alt.clone())),
        Block::ImageQuery(query) => non_empty(query).map(|q| Element::image_query(&q)),
        Block::Table(rows) => (!rows.is_empty()).then(|| Element::Table { rows: rows.clone() }),
        Block::Generic { kind, text } => {
            non_empty(text).map(|text| Element::generic(kind.clone(), text))
        }
    }
}

fn list_to_node(list: &BlockList) -> ListNode {
    let mut node = ListNode::new(list.ordered);
    for item in &list.items {
        let mut out = ListItem::new(item.text.trim());
        if let Some(sub) = &item.sub_list {
            let sub = list_to_node(sub);
            if !sub.items.is_empty() {
                out.sub_lists.push(sub);
            }
        }
        if !out.text.is_empty() || !out.sub_lists.is_empty() {
            node.items.push(out);
        }
    }
    node
}

// ── Markdown event walk ──────────────────────────────────────────────────────

/// Inline content collected for headings, paragraphs and list items.
#[derive(Debug, Default)]
struct Inline {
    segments: Vec<Segment>,
}

#[derive(Debug)]
enum Segment {
    Text(String),
    Image { src: String, alt: String },
}

impl Inline {
    fn push_text(&mut self, s: &str) {
        match self.segments.last_mut() {
            Some(Segment::Text(t)) => t.push_str(s),
            _ => self.segments.push(Segment::Text(s.to_string())),
        }
    }

    /// All text, image alts included.
    fn flatten(self) -> String {
        let mut out = String::new();
        for seg in self.segments {
            match seg {
                Segment::Text(t) => out.push_str(&t),
                Segment::Image { alt, .. } => out.push_str(&alt),
            }
        }
        tidy(&out)
    }
}

#[derive(Debug)]
enum Frame {
    Heading { level: u8, inline: Inline },
    Paragraph { inline: Inline },
    Quote { text: String },
    Code { text: String },
    List(ListNode),
    Item { item: ListItem, inline: Inline },
    Table { rows: Vec<Vec<String>>, row: Vec<String> },
    Cell { text: String },
    Image { src: String, alt: String },
    Html { text: String },
}

#[derive(Debug, Default)]
struct TreeBuilder {
    nodes: Vec<Element>,
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(t) | Event::Code(t) => self.push_text(&t),
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.push_text("\n"),
            Event::Html(html) => self.push_html(&html),
            Event::InlineHtml(html) => {
                if is_line_break_tag(&html) {
                    self.push_text("\n");
                }
            }
            Event::Rule => self.emit(Element::generic("hr", "")),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Heading { level, .. } => Frame::Heading {
                level: heading_level(level),
                inline: Inline::default(),
            },
            Tag::Paragraph => {
                // Paragraphs inside quotes, items and cells feed their container.
                if self.absorbing_container().is_some() {
                    return;
                }
                Frame::Paragraph {
                    inline: Inline::default(),
                }
            }
            Tag::BlockQuote { .. } => Frame::Quote {
                text: String::new(),
            },
            Tag::CodeBlock(_) => Frame::Code {
                text: String::new(),
            },
            Tag::List(start) => Frame::List(ListNode::new(start.is_some())),
            Tag::Item => Frame::Item {
                item: ListItem::new(""),
                inline: Inline::default(),
            },
            Tag::Table(_) => Frame::Table {
                rows: Vec::new(),
                row: Vec::new(),
            },
            Tag::TableCell => Frame::Cell {
                text: String::new(),
            },
            Tag::Image { dest_url, .. } => Frame::Image {
                src: dest_url.to_string(),
                alt: String::new(),
            },
            Tag::HtmlBlock => Frame::Html {
                text: String::new(),
            },
            _ => return,
        };
        self.stack.push(frame);
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => match self.stack.last() {
                Some(Frame::Paragraph { .. }) => {
                    if let Some(Frame::Paragraph { inline }) = self.stack.pop() {
                        for el in split_paragraph(inline) {
                            self.emit(el);
                        }
                    }
                }
                _ => self.push_text("\n"),
            },
            TagEnd::Heading { .. } => {
                if let Some(Frame::Heading { level, inline }) = self.stack.pop() {
                    let text = inline.flatten();
                    let el = if level <= 3 {
                        Element::heading(level, text)
                    } else {
                        Element::generic(format!("h{level}"), text)
                    };
                    self.emit(el);
                }
            }
            TagEnd::BlockQuote { .. } => {
                if let Some(Frame::Quote { text }) = self.stack.pop() {
                    let text = tidy(&text);
                    if !text.is_empty() {
                        self.emit(Element::Blockquote { text });
                    }
                }
            }
            TagEnd::CodeBlock { .. } => {
                if let Some(Frame::Code { text }) = self.stack.pop() {
                    let text = text.trim_end_matches('\n').to_string();
                    self.emit(Element::CodeBlock { text });
                }
            }
            TagEnd::Item { .. } => {
                if let Some(Frame::Item { mut item, inline }) = self.stack.pop() {
                    item.text = inline.flatten();
                    if let Some(Frame::List(list)) = self.stack.last_mut() {
                        list.items.push(item);
                    }
                }
            }
            TagEnd::List { .. } => {
                if let Some(Frame::List(list)) = self.stack.pop() {
                    self.attach_list(list);
                }
            }
            TagEnd::TableCell { .. } => {
                if let Some(Frame::Cell { text }) = self.stack.pop() {
                    if let Some(Frame::Table { row, .. }) = self.stack.last_mut() {
                        row.push(tidy(&text));
                    }
                }
            }
            TagEnd::TableHead { .. } | TagEnd::TableRow { .. } => {
                if let Some(Frame::Table { rows, row }) = self.stack.last_mut() {
                    rows.push(std::mem::take(row));
                }
            }
            TagEnd::Table { .. } => {
                if let Some(Frame::Table { rows, .. }) = self.stack.pop() {
                    if !rows.is_empty() {
                        self.emit(Element::Table { rows });
                    }
                }
            }
            TagEnd::Image { .. } => {
                if let Some(Frame::Image { src, alt }) = self.stack.pop() {
                    self.push_image(src, alt);
                }
            }
            TagEnd::HtmlBlock { .. } => {
                if let Some(Frame::Html { text }) = self.stack.pop() {
                    if is_line_break_tag(&text) {
                        self.emit(Element::LineBreak);
                    } else {
                        let stripped = tidy(&RE_HTML_TAG.replace_all(&text, " "));
                        if !stripped.is_empty() {
                            self.emit(Element::generic("html", stripped));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Index of the innermost quote, item or cell a paragraph would feed.
    fn absorbing_container(&self) -> Option<usize> {
        self.stack.iter().rposition(|f| {
            matches!(
                f,
                Frame::Quote { .. } | Frame::Item { .. } | Frame::Cell { .. }
            )
        })
    }

    fn push_text(&mut self, s: &str) {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Image { alt, .. } => return alt.push_str(s),
                Frame::Heading { inline, .. }
                | Frame::Paragraph { inline }
                | Frame::Item { inline, .. } => return inline.push_text(s),
                Frame::Quote { text }
                | Frame::Code { text }
                | Frame::Cell { text }
                | Frame::Html { text } => return text.push_str(s),
                Frame::List(_) | Frame::Table { .. } => continue,
            }
        }
    }

    fn push_html(&mut self, html: &str) {
        match self.stack.last_mut() {
            Some(Frame::Html { text }) => text.push_str(html),
            _ => {
                if is_line_break_tag(html) {
                    self.push_text("\n");
                }
            }
        }
    }

    fn push_image(&mut self, src: String, alt: String) {
        for frame in self.stack.iter_mut().rev() {
            match frame {
                Frame::Heading { inline, .. } | Frame::Paragraph { inline } => {
                    inline.segments.push(Segment::Image { src, alt });
                    return;
                }
                Frame::Item { inline, .. } => return inline.push_text(&alt),
                Frame::Quote { text } | Frame::Cell { text } => return text.push_str(&alt),
                _ => continue,
            }
        }
        self.emit(Element::image(src, alt));
    }

    fn attach_list(&mut self, list: ListNode) {
        match self.stack.last_mut() {
            Some(Frame::Item { item, .. }) => item.sub_lists.push(list),
            Some(Frame::Quote { text }) => {
                let mut lines = Vec::new();
                flatten_list(&list, 0, &mut lines);
                text.push_str(&lines.join("\n"));
                text.push('\n');
            }
            _ => {
                if !list.items.is_empty() {
                    self.emit(Element::List(list))
                }
            }
        }
    }

    /// Top-level nodes only; nested constructs are folded into their parent.
    fn emit(&mut self, el: Element) {
        if self.stack.is_empty() {
            self.nodes.push(el);
            return;
        }
        let text = match &el {
            Element::Heading { text, .. }
            | Element::Paragraph { text, .. }
            | Element::Blockquote { text }
            | Element::CodeBlock { text }
            | Element::Generic { text, .. } => text.clone(),
            Element::Image { alt, .. } => alt.clone(),
            _ => String::new(),
        };
        if !text.is_empty() {
            self.push_text(&text);
            self.push_text("\n");
        }
    }
}

/// Split a paragraph on its images, preserving order. An image-only
/// paragraph yields nothing but `Image` nodes.
fn split_paragraph(inline: Inline) -> Vec<Element> {
    let mut out = Vec::new();
    let mut pending = String::new();
    for seg in inline.segments {
        match seg {
            Segment::Text(t) => pending.push_str(&t),
            Segment::Image { src, alt } => {
                let text = tidy(&std::mem::take(&mut pending));
                if !text.is_empty() {
                    out.push(Element::paragraph(text));
                }
                out.push(Element::image(src, alt));
            }
        }
    }
    let text = tidy(&pending);
    if !text.is_empty() {
        out.push(Element::paragraph(text));
    }
    out
}

fn flatten_list(list: &ListNode, depth: usize, lines: &mut Vec<String>) {
    for (i, item) in list.items.iter().enumerate() {
        let marker = if list.ordered {
            format!("{}.", i + 1)
        } else {
            "-".to_string()
        };
        lines.push(format!("{}{marker} {}", "  ".repeat(depth), item.text));
        for sub in &item.sub_lists {
            flatten_list(sub, depth + 1, lines);
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*<br\s*/?>\s*$").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

fn is_line_break_tag(html: &str) -> bool {
    RE_BR.is_match(html)
}

/// Collapse runs of spaces and trim each line; drop blank edges.
fn tidy(text: &str) -> String {
    text.split('\n')
        .map(|line| RE_SPACES.replace_all(line.trim(), " ").to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
