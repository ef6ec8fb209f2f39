//! Format writers: fully resolved layout in, file bytes out.
//!
//! Every writer is synchronous and CPU-bound; [`crate::Exporter`] runs them
//! in `spawn_blocking`. None of them performs I/O or image lookups: all
//! images arrive already decoded inside the flow blocks or planned slides.
//!
//! ```text
//!  FlowBlock[] ──▶ pdf   (lopdf)
//!              └─▶ docx  (docx-rs, optional template)
//!  PlannedSlide[] ─▶ pptx (OOXML by hand, optional template)
//!  Rows ──▶ xlsx (SpreadsheetML by hand, optional template)
//!       └─▶ csv
//!  text ──▶ raw file (XML prolog for .xml)
//! ```

pub mod csv;
pub mod docx;
pub mod pdf;
pub mod pptx;
pub mod text;
pub mod xlsx;

use crate::error::ExportError;
use std::fmt::Display;

pub(crate) fn render_failed(format: &str, detail: impl Display) -> ExportError {
    ExportError::RenderFailed {
        format: format.to_string(),
        detail: detail.to_string(),
    }
}

/// Escape text for XML character data and attribute values.
pub(crate) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are not allowed in XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }
}
