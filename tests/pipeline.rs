//! Pipeline tests: content in, flow blocks or slide geometry out.
//!
//! No network and no files. Images come from a stub resolver that fails on
//! purpose for some references.

use async_trait::async_trait;
use edgequake_export::pipeline::flow::{self, image_placeholder};
use edgequake_export::pipeline::normalize::normalize_markdown;
use edgequake_export::{
    dynamic_font_size, layout, BlockError, Content, Element, FlowBlock, ImagePosition, ImageRef,
    ImageResolver, ImageSize, ListBlock, ListEntry, Rect, ResolvedImage, SlideFrame, SlideSpec,
    StyleId, StyleSheet,
};

/// Resolves every reference to a 2×2 image, except those mentioning "missing".
struct StubResolver;

#[async_trait]
impl ImageResolver for StubResolver {
    async fn resolve(&self, reference: &ImageRef) -> Result<ResolvedImage, BlockError> {
        let described = reference.describe();
        if described.contains("missing") {
            return Err(BlockError::ImageNotFound { query: described });
        }
        ResolvedImage::from_image(&described, image::DynamicImage::new_rgb8(2, 2))
    }
}

async fn render(markdown: &str) -> Vec<FlowBlock> {
    let tree = normalize_markdown(markdown);
    flow::render(&tree, &StubResolver, StyleSheet::shared()).await
}

fn text_of(block: &FlowBlock) -> Option<(StyleId, &str)> {
    match block {
        FlowBlock::Text { style, text, .. } => Some((*style, text.as_str())),
        _ => None,
    }
}

// ── Documents ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn heading_paragraph_and_list_keep_their_shape() {
    let blocks = render("# Title\n\nSome **bold** text\n\n- a\n- b").await;
    assert_eq!(blocks.len(), 3, "{blocks:?}");

    assert_eq!(text_of(&blocks[0]), Some((StyleId::Heading1, "Title")));
    assert_eq!(text_of(&blocks[1]), Some((StyleId::Body, "Some bold text")));

    let FlowBlock::List(list) = &blocks[2] else {
        panic!("expected a list, got {:?}", blocks[2]);
    };
    assert!(!list.ordered);
    assert_eq!(list.depth, 0);
    assert_eq!(
        list.items,
        vec![ListEntry::Text("a".into()), ListEntry::Text("b".into())]
    );
}

#[tokio::test]
async fn blank_content_renders_a_single_placeholder() {
    for input in ["", "   \n\n\t"] {
        let blocks = render(input).await;
        assert_eq!(blocks.len(), 1, "input {input:?} gave {blocks:?}");
        assert_eq!(text_of(&blocks[0]).map(|(_, t)| t), Some("Empty Content"));
    }
}

#[tokio::test]
async fn content_value_and_markdown_agree() {
    let md = "## Notes\n\n1. one\n2. two";
    let from_value = edgequake_export::normalize(&Content::from(md));
    assert_eq!(from_value, normalize_markdown(md));
}

#[test]
fn code_keeps_double_colon_paths() {
    let tree = normalize_markdown("```rust\nuse a::x::b;\n```\n\nSee `std::x::y`.");
    let code = tree.nodes.iter().find_map(|n| match n {
        Element::CodeBlock { text } => Some(text.as_str()),
        _ => None,
    });
    assert_eq!(code.map(str::trim_end), Some("use a::x::b;"));
    assert!(tree
        .nodes
        .iter()
        .any(|n| matches!(n, Element::Paragraph { text, .. } if text.contains("std::x::y"))));
}

/// Markdown for a chain of `levels` lists, one item each, alternating
/// unordered (odd levels) and ordered (even levels).
fn nested_list(levels: usize) -> String {
    let mut md = String::new();
    let mut indent = 0;
    for level in 1..=levels {
        let marker = if level % 2 == 0 { "1. " } else { "- " };
        md.push_str(&" ".repeat(indent));
        md.push_str(marker);
        md.push_str(&format!("level {level}\n"));
        indent += marker.len();
    }
    md
}

fn first_sub_list(list: &ListBlock) -> Option<&ListBlock> {
    list.items.iter().find_map(|e| match e {
        ListEntry::List(sub) => Some(sub),
        ListEntry::Text(_) => None,
    })
}

#[tokio::test]
async fn nested_lists_keep_depth_and_numbering_per_level() {
    for levels in 1..=5 {
        let blocks = render(&nested_list(levels)).await;
        let FlowBlock::List(root) = &blocks[0] else {
            panic!("expected a list for {levels} levels, got {blocks:?}");
        };
        assert_eq!(root.levels(), levels);

        let mut current = Some(root);
        let mut seen = 0;
        while let Some(list) = current {
            seen += 1;
            assert_eq!(list.depth, seen - 1);
            assert_eq!(list.ordered, seen % 2 == 0, "level {seen} of {levels}");
            assert_eq!(
                list.items.first(),
                Some(&ListEntry::Text(format!("level {seen}")))
            );
            current = first_sub_list(list);
        }
        assert_eq!(seen, levels);
    }
}

#[tokio::test]
async fn one_bad_image_does_not_affect_the_others() {
    let md = "![cat](image_query: cat)\n\n\
              ![dog](image_query: missing dog)\n\n\
              ![owl](image_query: owl)";
    let blocks = render(md).await;

    let images = blocks
        .iter()
        .filter(|b| matches!(b, FlowBlock::Image { .. }))
        .count();
    assert_eq!(images, 2, "{blocks:?}");

    let placeholder = image_placeholder("missing dog");
    let placeholders: Vec<_> = blocks
        .iter()
        .filter_map(text_of)
        .filter(|(_, t)| t.starts_with("[Image not found for:"))
        .collect();
    assert_eq!(placeholders, vec![(StyleId::Body, placeholder.as_str())]);

    // Document order survives the failure.
    assert!(matches!(blocks[0], FlowBlock::Image { .. }));
    assert!(text_of(&blocks[1]).is_some());
    assert!(matches!(blocks[2], FlowBlock::Image { .. }));
}

// ── Slides ───────────────────────────────────────────────────────────────────

#[test]
fn every_position_and_size_fits_without_overlap() {
    let frame = SlideFrame::default();
    let bounds = Rect::new(0.0, 0.0, frame.width, frame.height);
    let safe = frame.safe_area();

    for position in [
        ImagePosition::Left,
        ImagePosition::Right,
        ImagePosition::Top,
        ImagePosition::Bottom,
    ] {
        for size in ImageSize::ALL {
            let slide = SlideSpec::new("Quarterly results")
                .lines(["Revenue up", "Costs down", "Margin stable"])
                .image("bar chart", position, size);
            let l = layout(&slide, frame);
            let tag = format!("{position:?}/{size:?}");

            let image = l.image_rect.unwrap_or_else(|| panic!("{tag}: no image"));
            assert!(bounds.contains(&l.title_rect), "{tag}: title");
            assert!(safe.contains(&l.content_rect), "{tag}: content");
            assert!(safe.contains(&image), "{tag}: image");
            assert!(!image.intersects(&l.content_rect), "{tag}: image/content");
            assert!(!image.intersects(&l.title_rect), "{tag}: image/title");
            assert!(!l.content_rect.intersects(&l.title_rect), "{tag}: content/title");
            assert!(l.content_rect.w > 0.0 && l.content_rect.h > 0.0, "{tag}");
        }
    }
}

#[test]
fn slide_without_image_has_no_image_rect() {
    let slide = SlideSpec::new("Plain").lines(["only text"]);
    let l = layout(&slide, SlideFrame::default());
    assert!(l.image_rect.is_none());

    let blank_query = SlideSpec::new("Blank")
        .image("   ", ImagePosition::Left, ImageSize::Large);
    assert!(layout(&blank_query, SlideFrame::default()).image_rect.is_none());
}

#[test]
fn font_size_never_grows_with_more_text() {
    let content = Rect::new(0.5, 1.5, 5.0, 4.0);
    let mut previous = f64::MAX;
    for chars in (0..20_000).step_by(50) {
        let size = dynamic_font_size(chars, &content);
        assert!(size <= previous, "{chars} chars: {size} > {previous}");
        assert!((12.0..=24.0).contains(&size));
        previous = size;
    }
    assert_eq!(dynamic_font_size(0, &content), 24.0);
    assert_eq!(dynamic_font_size(1_000_000, &content), 12.0);
}
