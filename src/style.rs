//! The fixed style sheet shared by every renderer.
//!
//! Built once into a process-wide [`StyleSheet`] and read concurrently by
//! all in-flight renders. Nothing writes to it after construction: the
//! fields are private and only getters are exposed.

use once_cell::sync::Lazy;
use serde::Serialize;

/// Identifier of one entry in the style sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleId {
    Title,
    Subtitle,
    Heading1,
    Heading2,
    Heading3,
    Body,
    ListItem,
    Code,
    Blockquote,
}

impl StyleId {
    pub const ALL: [StyleId; 9] = [
        StyleId::Title,
        StyleId::Subtitle,
        StyleId::Heading1,
        StyleId::Heading2,
        StyleId::Heading3,
        StyleId::Body,
        StyleId::ListItem,
        StyleId::Code,
        StyleId::Blockquote,
    ];

    /// Style for a heading level. Levels outside 1..=3 use `Heading3`.
    pub fn heading(level: u8) -> Self {
        match level {
            1 => StyleId::Heading1,
            2 => StyleId::Heading2,
            _ => StyleId::Heading3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleId::Title => "title",
            StyleId::Subtitle => "subtitle",
            StyleId::Heading1 => "heading1",
            StyleId::Heading2 => "heading2",
            StyleId::Heading3 => "heading3",
            StyleId::Body => "body",
            StyleId::ListItem => "list-item",
            StyleId::Code => "code",
            StyleId::Blockquote => "blockquote",
        }
    }
}

/// sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// `RRGGBB` without the leading `#`, as OOXML wants it.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Components in 0.0..=1.0, as PDF colour operators want them.
    pub fn unit(&self) -> (f32, f32, f32) {
        (
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        )
    }
}

/// Font family used by a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontFamily {
    Sans,
    Mono,
}

/// Visual attributes of one style. Sizes and spacing are in points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub font: FontFamily,
    pub size: f32,
    pub leading: f32,
    pub color: Rgb,
    pub bold: bool,
    pub italic: bool,
    pub centered: bool,
    pub space_before: f32,
    pub space_after: f32,
    pub indent: f32,
    pub background: Option<Rgb>,
    pub border: Option<Rgb>,
}

impl TextStyle {
    const fn body(size: f32, leading: f32) -> Self {
        Self {
            font: FontFamily::Sans,
            size,
            leading,
            color: Rgb::BLACK,
            bold: false,
            italic: false,
            centered: false,
            space_before: 0.0,
            space_after: 0.0,
            indent: 0.0,
            background: None,
            border: None,
        }
    }
}

/// Spacing constants between flow blocks, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spacing {
    pub block: f32,
    pub list: f32,
    pub line_break: f32,
}

/// Immutable mapping from [`StyleId`] to [`TextStyle`], plus layout constants.
#[derive(Debug, Clone, Serialize)]
pub struct StyleSheet {
    styles: Vec<(StyleId, TextStyle)>,
    spacing: Spacing,
    pdf_image_box: (f32, f32),
    doc_picture_width_in: f32,
    list_indent: f32,
}

static DEFAULT_SHEET: Lazy<StyleSheet> = Lazy::new(StyleSheet::build_default);

impl StyleSheet {
    /// The process-wide default sheet.
    pub fn shared() -> &'static StyleSheet {
        &DEFAULT_SHEET
    }

    fn build_default() -> Self {
        let heading = |size: f32, color: Rgb, before: f32, after: f32| TextStyle {
            bold: true,
            color,
            leading: size * 1.2,
            space_before: before,
            space_after: after,
            ..TextStyle::body(size, size * 1.2)
        };

        let styles = vec![
            (
                StyleId::Title,
                TextStyle {
                    bold: true,
                    centered: true,
                    space_after: 12.0,
                    ..TextStyle::body(24.0, 28.0)
                },
            ),
            (
                StyleId::Subtitle,
                TextStyle {
                    centered: true,
                    space_after: 10.0,
                    color: Rgb(0x44, 0x44, 0x44),
                    ..TextStyle::body(16.0, 19.0)
                },
            ),
            (
                StyleId::Heading1,
                heading(18.0, Rgb(0x0A, 0x1F, 0x44), 12.0, 16.0),
            ),
            (
                StyleId::Heading2,
                heading(14.0, Rgb(0x1C, 0x3F, 0x77), 10.0, 12.0),
            ),
            (
                StyleId::Heading3,
                heading(12.0, Rgb(0x3A, 0x6F, 0xB0), 8.0, 10.0),
            ),
            (StyleId::Body, TextStyle::body(11.0, 14.0)),
            (StyleId::ListItem, TextStyle::body(11.0, 14.0)),
            (
                StyleId::Code,
                TextStyle {
                    font: FontFamily::Mono,
                    indent: 10.0,
                    background: Some(Rgb(0xF5, 0xF5, 0xF5)),
                    border: Some(Rgb(0xCC, 0xCC, 0xCC)),
                    ..TextStyle::body(10.0, 12.0)
                },
            ),
            (
                StyleId::Blockquote,
                TextStyle {
                    italic: true,
                    indent: 20.0,
                    color: Rgb(0x33, 0x33, 0x33),
                    ..TextStyle::body(11.0, 14.0)
                },
            ),
        ];

        Self {
            styles,
            spacing: Spacing {
                block: 10.0,
                list: 8.0,
                line_break: 6.0,
            },
            pdf_image_box: (200.0, 150.0),
            doc_picture_width_in: 6.0,
            list_indent: 18.0,
        }
    }

    pub fn get(&self, id: StyleId) -> &TextStyle {
        self.styles
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, style)| style)
            .unwrap_or_else(|| &self.styles[5].1)
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// Maximum image box on a PDF page, `(width, height)` in points.
    pub fn pdf_image_box(&self) -> (f32, f32) {
        self.pdf_image_box
    }

    /// Picture width in word documents, in inches.
    pub fn doc_picture_width_in(&self) -> f32 {
        self.doc_picture_width_in
    }

    /// Indentation per list nesting level, in points.
    pub fn list_indent(&self) -> f32 {
        self.list_indent
    }
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self::build_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_id_has_a_style() {
        let sheet = StyleSheet::shared();
        for id in StyleId::ALL {
            assert!(sheet.styles.iter().any(|(sid, _)| *sid == id), "{id:?}");
        }
    }

    #[test]
    fn heading_values() {
        let sheet = StyleSheet::shared();
        let h1 = sheet.get(StyleId::Heading1);
        assert_eq!(h1.size, 18.0);
        assert_eq!(h1.color.hex(), "0A1F44");
        assert_eq!((h1.space_before, h1.space_after), (12.0, 16.0));
        assert_eq!(sheet.get(StyleId::Code).font, FontFamily::Mono);
        assert_eq!(StyleId::heading(7), StyleId::Heading3);
    }

    #[test]
    fn shared_sheet_is_one_instance() {
        assert!(std::ptr::eq(StyleSheet::shared(), StyleSheet::shared()));
    }
}
