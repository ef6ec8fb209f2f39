//! The element tree: canonical parsed content before any layout decision.
//!
//! Every input shape (markdown text, typed block lists) is normalized into
//! one [`ElementTree`] by [`crate::pipeline::normalize`]. Renderers only ever
//! see this type, so adding an input shape never touches layout code.
//!
//! The tree is built once, top-down, and never mutated afterwards. It cannot
//! contain cycles: children are owned values, not references.

use serde::{Deserialize, Serialize};

/// Marker prefix for image sources that still need a provider lookup.
pub const IMAGE_QUERY_PREFIX: &str = "image_query:";

/// Text shown when the input produced no content at all.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "Empty Content";

/// Ordered sequence of top-level nodes, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementTree {
    pub nodes: Vec<Element>,
}

impl ElementTree {
    pub fn new(nodes: Vec<Element>) -> Self {
        Self { nodes }
    }

    /// Single-node tree holding the "Empty Content" paragraph.
    pub fn placeholder() -> Self {
        Self::new(vec![Element::paragraph(EMPTY_CONTENT_PLACEHOLDER)])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of image nodes, nested lists excluded (images never nest).
    pub fn image_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Element::Image { .. }))
            .count()
    }
}

/// Horizontal alignment hint carried by headings and paragraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
}

/// One node of the element tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    /// Heading, level clamped to 1..=3.
    Heading { level: u8, text: String, align: Align },
    /// Paragraph of inline text (markup already flattened).
    Paragraph { text: String, align: Align },
    /// Ordered or unordered list, arbitrarily nested.
    List(ListNode),
    Blockquote { text: String },
    CodeBlock { text: String },
    /// Image reference: URL, local path, or `image_query:<text>` marker.
    Image { src: String, alt: String },
    LineBreak,
    /// Table of plain-text cells, first row is the header.
    Table { rows: Vec<Vec<String>> },
    /// Anything without a dedicated node kind, kept as plain text.
    Generic { tag_name: String, text: String },
}

impl Element {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Element::Heading {
            level: level.clamp(1, 3),
            text: text.into(),
            align: Align::Left,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Element::Paragraph {
            text: text.into(),
            align: Align::Left,
        }
    }

    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Element::Image {
            src: src.into(),
            alt: alt.into(),
        }
    }

    /// Unresolved image marker for a provider query.
    pub fn image_query(query: &str) -> Self {
        let query = query.trim();
        Element::Image {
            src: format!("{IMAGE_QUERY_PREFIX}{query}"),
            alt: query.to_string(),
        }
    }

    pub fn generic(tag_name: impl Into<String>, text: impl Into<String>) -> Self {
        Element::Generic {
            tag_name: tag_name.into(),
            text: text.into(),
        }
    }

    /// Short lowercase name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Heading { .. } => "heading",
            Element::Paragraph { .. } => "paragraph",
            Element::List(_) => "list",
            Element::Blockquote { .. } => "blockquote",
            Element::CodeBlock { .. } => "code_block",
            Element::Image { .. } => "image",
            Element::LineBreak => "line_break",
            Element::Table { .. } => "table",
            Element::Generic { .. } => "generic",
        }
    }
}

/// A list and its items, in insertion (document) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListNode {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

/// One list item: its own text plus any lists nested beneath it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    pub sub_lists: Vec<ListNode>,
}

impl ListNode {
    pub fn new(ordered: bool) -> Self {
        Self {
            ordered,
            items: Vec::new(),
        }
    }

    /// Nesting depth: 1 for a flat list. Computed without recursion.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(&ListNode, usize)> = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            for item in &node.items {
                for sub in &item.sub_lists {
                    stack.push((sub, depth + 1));
                }
            }
        }
        max
    }
}

impl ListItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sub_lists: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_level_is_clamped() {
        assert!(matches!(Element::heading(6, "x"), Element::Heading { level: 3, .. }));
        assert!(matches!(Element::heading(0, "x"), Element::Heading { level: 1, .. }));
    }

    #[test]
    fn image_query_marker() {
        match Element::image_query("  red fox ") {
            Element::Image { src, alt } => {
                assert_eq!(src, "image_query:red fox");
                assert_eq!(alt, "red fox");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_depth_counts_levels() {
        let mut inner = ListNode::new(true);
        inner.items.push(ListItem::new("deep"));
        let mut item = ListItem::new("mid");
        item.sub_lists.push(inner);
        let mut outer = ListNode::new(false);
        outer.items.push(item);
        outer.items.push(ListItem::new("flat"));

        assert_eq!(outer.depth(), 2);
        assert_eq!(ListNode::new(false).depth(), 1);
    }

    #[test]
    fn placeholder_tree() {
        let tree = ElementTree::placeholder();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nodes[0], Element::paragraph(EMPTY_CONTENT_PLACEHOLDER));
    }
}
