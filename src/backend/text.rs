//! Raw text files, written verbatim.

/// Prolog injected into `.xml` files that lack one.
pub const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Bytes for a raw text artifact named `filename`.
pub fn render(content: &str, filename: &str) -> Vec<u8> {
    if is_xml(filename) && !content.trim_start().starts_with("<?xml") {
        let mut out = String::with_capacity(XML_PROLOG.len() + 1 + content.len());
        out.push_str(XML_PROLOG);
        out.push('\n');
        out.push_str(content.trim_start_matches('\u{FEFF}'));
        return out.into_bytes();
    }
    content.as_bytes().to_vec()
}

fn is_xml(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_gets_prolog_once() {
        let out = String::from_utf8(render("<a/>", "data.xml")).unwrap();
        assert_eq!(out, format!("{XML_PROLOG}\n<a/>"));

        let already = format!("{XML_PROLOG}\n<a/>");
        assert_eq!(render(&already, "data.XML"), already.as_bytes());
    }

    #[test]
    fn other_files_are_verbatim() {
        assert_eq!(render("print('hi')\n", "main.py"), b"print('hi')\n");
        assert_eq!(render("<a/>", "notes.txt"), b"<a/>");
    }
}
