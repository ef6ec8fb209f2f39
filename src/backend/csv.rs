//! Delimited text: RFC 4180, comma separated, CRLF row terminators.

use crate::content::CellValue;

/// Serialize rows. Fields containing a comma, quote or line break are
/// quoted, with embedded quotes doubled.
pub fn render(rows: &[Vec<CellValue>]) -> Vec<u8> {
    let mut out = String::new();
    for row in rows {
        let line = row
            .iter()
            .map(|cell| quote(&cell.as_text()))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out.into_bytes()
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
