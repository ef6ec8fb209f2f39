//! Flow rendering: [`ElementTree`] → ordered [`FlowBlock`]s for document
//! writers (PDF, word processor).
//!
//! The renderer knows nothing about pages. It decides *what* each node
//! becomes (which style, which image, which nesting) and leaves *where* to
//! the backend.
//!
//! ## Error isolation
//!
//! One failed block never fails the document. Every image, whether it is a
//! provider query, a URL or a local path, goes through the same
//! [`ImageResolver`]; any `Err` becomes a `"[Image not found for: …]"` text
//! block in the image's place and is reported to the progress callback.

use crate::pipeline::image::{ImageRef, ImageResolver, ResolvedImage};
use crate::progress::{ExportProgressCallback, NoopProgressCallback};
use crate::style::{StyleId, StyleSheet};
use crate::tree::{Align, Element, ElementTree, ListNode, EMPTY_CONTENT_PLACEHOLDER};
use tracing::{debug, warn};

/// Text used by writers for the single-paragraph fallback document.
pub const GENERATION_ERROR_TEXT: &str = "Error in generation";

/// One renderer-ready unit of content, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowBlock {
    Text {
        style: StyleId,
        text: String,
        align: Align,
    },
    Image {
        image: ResolvedImage,
        alt: String,
    },
    List(ListBlock),
    /// Plain-text table, first row is the header.
    Table { rows: Vec<Vec<String>> },
    /// Vertical gap in points.
    Spacer(f32),
}

impl FlowBlock {
    pub fn text(style: StyleId, text: impl Into<String>) -> Self {
        FlowBlock::Text {
            style,
            text: text.into(),
            align: Align::Left,
        }
    }

    /// The single-block story written when the full render cannot be.
    pub fn fallback_story() -> Vec<FlowBlock> {
        vec![FlowBlock::text(StyleId::Body, GENERATION_ERROR_TEXT)]
    }
}

/// A list with its nested entries. `depth` is 0 for a top-level list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListBlock {
    pub ordered: bool,
    pub depth: usize,
    pub items: Vec<ListEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    Text(String),
    List(ListBlock),
}

impl ListBlock {
    /// Nesting levels, 1 for a flat list.
    pub fn levels(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((block, level)) = stack.pop() {
            max = max.max(level);
            for entry in &block.items {
                if let ListEntry::List(sub) = entry {
                    stack.push((sub, level + 1));
                }
            }
        }
        max
    }
}

/// Placeholder text for an image that could not be resolved.
pub fn image_placeholder(reference: &str) -> String {
    format!("[Image not found for: {reference}]")
}

/// Render a tree without progress reporting.
pub async fn render(
    tree: &ElementTree,
    resolver: &dyn ImageResolver,
    sheet: &StyleSheet,
) -> Vec<FlowBlock> {
    render_with_progress(tree, resolver, sheet, &NoopProgressCallback).await
}

/// Render a tree, reporting every degraded block to `progress`.
///
/// Images are resolved one at a time, in document order.
pub async fn render_with_progress(
    tree: &ElementTree,
    resolver: &dyn ImageResolver,
    sheet: &StyleSheet,
    progress: &dyn ExportProgressCallback,
) -> Vec<FlowBlock> {
    let spacing = sheet.spacing();
    let mut blocks = Vec::with_capacity(tree.len());

    for node in &tree.nodes {
        match node {
            Element::Heading { level, text, align } => blocks.push(FlowBlock::Text {
                style: StyleId::heading(*level),
                text: text.clone(),
                align: *align,
            }),
            Element::Paragraph { text, align } => blocks.push(FlowBlock::Text {
                style: StyleId::Body,
                text: text.clone(),
                align: *align,
            }),
            Element::Blockquote { text } => {
                blocks.push(FlowBlock::text(StyleId::Blockquote, text.clone()))
            }
            Element::CodeBlock { text } => blocks.push(FlowBlock::text(StyleId::Code, text.clone())),
            Element::List(list) => blocks.push(FlowBlock::List(list_block(list))),
            Element::Table { rows } => blocks.push(FlowBlock::Table { rows: rows.clone() }),
            Element::LineBreak => blocks.push(FlowBlock::Spacer(spacing.line_break)),
            Element::Image { src, alt } => {
                let reference = ImageRef::parse(src);
                match resolver.resolve(&reference).await {
                    Ok(image) => blocks.push(FlowBlock::Image {
                        image,
                        alt: alt.clone(),
                    }),
                    Err(e) => {
                        let described = reference.describe();
                        warn!("Image '{described}' replaced by placeholder: {e}");
                        progress.on_block_degraded(&described, &e.to_string());
                        blocks.push(FlowBlock::text(StyleId::Body, image_placeholder(&described)));
                    }
                }
            }
            Element::Generic { tag_name, text } => {
                if text.trim().is_empty() {
                    blocks.push(FlowBlock::Spacer(spacing.block));
                } else if matches!(tag_name.as_str(), "h4" | "h5" | "h6") {
                    blocks.push(FlowBlock::text(StyleId::Heading3, text.clone()));
                } else {
                    blocks.push(FlowBlock::text(StyleId::Body, text.clone()));
                }
            }
        }
    }

    if blocks.is_empty() {
        blocks.push(FlowBlock::text(StyleId::Body, EMPTY_CONTENT_PLACEHOLDER));
    }
    debug!("Rendered {} node(s) into {} flow block(s)", tree.len(), blocks.len());
    blocks
}

/// Convert a list tree without recursion, so input depth cannot exhaust
/// the stack.
fn list_block(root: &ListNode) -> ListBlock {
    struct Frame<'a> {
        node: &'a ListNode,
        depth: usize,
        item: usize,
        // 0: item text not emitted yet; n > 0: next sub-list is n - 1.
        sub: usize,
        entries: Vec<ListEntry>,
    }

    impl<'a> Frame<'a> {
        fn new(node: &'a ListNode, depth: usize) -> Self {
            Self {
                node,
                depth,
                item: 0,
                sub: 0,
                entries: Vec::new(),
            }
        }
    }

    let mut stack = vec![Frame::new(root, 0)];
    while let Some(frame) = stack.last_mut() {
        let node = frame.node;
        if frame.item >= node.items.len() {
            let Some(done) = stack.pop() else { break };
            let block = ListBlock {
                ordered: done.node.ordered,
                depth: done.depth,
                items: done.entries,
            };
            match stack.last_mut() {
                Some(parent) => parent.entries.push(ListEntry::List(block)),
                None => return block,
            }
            continue;
        }

        let item = &node.items[frame.item];
        if frame.sub == 0 {
            if !item.text.is_empty() {
                frame.entries.push(ListEntry::Text(item.text.clone()));
            }
            frame.sub = 1;
        }

        let next = frame.sub - 1;
        if next < item.sub_lists.len() {
            frame.sub += 1;
            let depth = frame.depth + 1;
            stack.push(Frame::new(&item.sub_lists[next], depth));
        } else {
            frame.item += 1;
            frame.sub = 0;
        }
    }

    ListBlock {
        ordered: root.ordered,
        ..ListBlock::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockError;
    use crate::tree::ListItem;
    use async_trait::async_trait;

    struct NothingResolves;

    #[async_trait]
    impl ImageResolver for NothingResolves {
        async fn resolve(&self, reference: &ImageRef) -> Result<ResolvedImage, BlockError> {
            Err(BlockError::ImageNotFound {
                query: reference.describe(),
            })
        }
    }

    fn nested(depth: usize) -> ListNode {
        let mut node = ListNode::new(depth % 2 == 0);
        node.items.push(ListItem::new(format!("level {depth}")));
        let mut current = node;
        for d in (0..depth.saturating_sub(1)).rev() {
            let mut parent = ListNode::new(d % 2 == 0);
            let mut item = ListItem::new(format!("level {d}"));
            item.sub_lists.push(current);
            parent.items.push(item);
            current = parent;
        }
        current
    }

    #[tokio::test]
    async fn failed_image_becomes_placeholder() {
        let tree = ElementTree::new(vec![
            Element::paragraph("before"),
            Element::image_query("unicorn"),
            Element::paragraph("after"),
        ]);
        let blocks = render(&tree, &NothingResolves, StyleSheet::shared()).await;
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            FlowBlock::text(StyleId::Body, "[Image not found for: unicorn]")
        );
    }

    #[test]
    fn list_conversion_keeps_order_and_flags() {
        let mut inner = ListNode::new(true);
        inner.items.push(ListItem::new("a1"));
        let mut a = ListItem::new("a");
        a.sub_lists.push(inner);
        let mut root = ListNode::new(false);
        root.items.push(a);
        root.items.push(ListItem::new("b"));

        let block = list_block(&root);
        assert!(!block.ordered);
        assert_eq!(block.depth, 0);
        assert_eq!(block.items.len(), 3);
        assert_eq!(block.items[0], ListEntry::Text("a".into()));
        let ListEntry::List(sub) = &block.items[1] else {
            panic!("expected nested list");
        };
        assert!(sub.ordered);
        assert_eq!(sub.depth, 1);
        assert_eq!(block.items[2], ListEntry::Text("b".into()));
    }

    #[test]
    fn deep_lists_do_not_overflow() {
        let block = list_block(&nested(200));
        assert_eq!(block.levels(), 200);
    }

    #[tokio::test]
    async fn empty_tree_yields_one_block() {
        let blocks = render(&ElementTree::default(), &NothingResolves, StyleSheet::shared()).await;
        assert_eq!(
            blocks,
            vec![FlowBlock::text(StyleId::Body, EMPTY_CONTENT_PLACEHOLDER)]
        );
    }
}
