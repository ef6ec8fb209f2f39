//! Spreadsheet writer: a minimal SpreadsheetML workbook with one sheet.
//!
//! Cells are inline strings, numbers and booleans; empty cells are omitted.
//! With a template, only the first worksheet's `<sheetData>` is replaced:
//! styles, themes, column widths and the other sheets survive unchanged.

use super::{escape_xml, render_failed};
use crate::content::{format_number, CellValue};
use crate::error::ExportError;
use crate::pipeline::template::{OoxmlPackage, TemplatePrototype};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_OFFICE_DOC: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Write `rows` into a new workbook, or into a private copy of `template`.
///
/// A template that cannot be opened or has no usable sheet is logged and
/// replaced by a blank workbook.
pub fn render(
    rows: &[Vec<CellValue>],
    sheet_name: Option<&str>,
    template: Option<&TemplatePrototype>,
) -> Result<Vec<u8>, ExportError> {
    let sheet_data = sheet_data_xml(rows);
    if let Some(proto) = template {
        match merge_into_template(proto, &sheet_data) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => warn!(
                "Spreadsheet template '{}' unusable, using a blank workbook: {e}",
                proto.path().display()
            ),
        }
    }
    blank_workbook(&sheet_data, &sanitize_sheet_name(sheet_name.unwrap_or("Sheet1")))
}

// ── Cells ────────────────────────────────────────────────────────────────────

/// `0 → A`, `25 → Z`, `26 → AA`.
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn cell_xml(reference: &str, cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Text(s) if s.is_empty() => None,
        CellValue::Text(s) => Some(format!(
            r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            escape_xml(s)
        )),
        CellValue::Number(n) if n.is_finite() => Some(format!(
            r#"<c r="{reference}"><v>{}</v></c>"#,
            format_number(*n)
        )),
        CellValue::Number(n) => Some(format!(
            r#"<c r="{reference}" t="inlineStr"><is><t>{n}</t></is></c>"#
        )),
        CellValue::Bool(b) => Some(format!(
            r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
            u8::from(*b)
        )),
    }
}

fn sheet_data_xml(rows: &[Vec<CellValue>]) -> String {
    let mut out = String::from("<sheetData>");
    for (r, row) in rows.iter().enumerate() {
        let cells: String = row
            .iter()
            .enumerate()
            .filter_map(|(c, cell)| cell_xml(&format!("{}{}", column_name(c), r + 1), cell))
            .collect();
        out.push_str(&format!(r#"<row r="{}">{cells}</row>"#, r + 1));
    }
    out.push_str("</sheetData>");
    out
}

/// Excel sheet names: at most 31 characters, none of `[]:*?/\`.
fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

// ── Blank workbook ───────────────────────────────────────────────────────────

fn blank_workbook(sheet_data: &str, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut pkg = OoxmlPackage::default();
    pkg.set(
        "[Content_Types].xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#,
    );
    pkg.set(
        "_rels/.rels",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="{REL_OFFICE_DOC}" Target="xl/workbook.xml"/>
</Relationships>"#
        ),
    );
    pkg.set(
        "xl/workbook.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">
  <sheets>
    <sheet name="{}" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#,
            escape_xml(sheet_name)
        ),
    );
    pkg.set(
        "xl/_rels/workbook.xml.rels",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="{REL_WORKSHEET}" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="{REL_STYLES}" Target="styles.xml"/>
</Relationships>"#
        ),
    );
    pkg.set(
        "xl/styles.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="{NS_MAIN}">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
</styleSheet>"#
        ),
    );
    pkg.set(
        DEFAULT_SHEET_PATH,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">{sheet_data}</worksheet>"#
        ),
    );
    pkg.to_bytes()
}

// ── Template merge ───────────────────────────────────────────────────────────

static RE_FIRST_SHEET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(?:\w+:)?sheet\b[^>]*\br:id="([^"]+)""#).unwrap());
static RE_SHEET_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<sheetData\s*/>|<sheetData\b[^>]*>.*?</sheetData>").unwrap());
static RE_DIMENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<dimension\b[^>]*/>").unwrap());

fn merge_into_template(proto: &TemplatePrototype, sheet_data: &str) -> Result<Vec<u8>, ExportError> {
    let mut pkg = proto.open()?;
    let sheet_path = first_sheet_path(&pkg);
    let sheet = pkg
        .get_str(&sheet_path)
        .ok_or_else(|| render_failed("xlsx", format!("template has no '{sheet_path}'")))?;

    if !RE_SHEET_DATA.is_match(&sheet) {
        return Err(render_failed("xlsx", "first worksheet has no <sheetData>"));
    }
    let merged = RE_SHEET_DATA.replace(&sheet, regex::NoExpand(sheet_data));
    let merged = RE_DIMENSION.replace(&merged, "");
    pkg.set(&sheet_path, merged.into_owned());
    debug!("Merged rows into template sheet '{sheet_path}'");
    pkg.to_bytes()
}

/// Resolve the first `<sheet>` of the workbook through its relationship.
fn first_sheet_path(pkg: &OoxmlPackage) -> String {
    let target = pkg
        .get_str("xl/workbook.xml")
        .and_then(|wb| RE_FIRST_SHEET.captures(&wb).map(|c| c[1].to_string()))
        .and_then(|rid| {
            let rels = pkg.get_str("xl/_rels/workbook.xml.rels")?;
            let re = Regex::new(&format!(
                r#"<Relationship\b[^>]*\bId="{}"[^>]*\bTarget="([^"]+)""#,
                regex::escape(&rid)
            ))
            .ok()?;
            re.captures(&rels).map(|c| c[1].to_string())
        });

    match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{t}"),
        None => DEFAULT_SHEET_PATH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::template::TemplateKind;

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn sheet_data_cells() {
        let xml = sheet_data_xml(&[vec![
            CellValue::from("a<b"),
            CellValue::Number(3.0),
            CellValue::Empty,
            CellValue::Bool(true),
        ]]);
        assert!(xml.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">a&lt;b</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B1"><v>3</v></c>"#));
        assert!(!xml.contains(r#"r="C1""#));
        assert!(xml.contains(r#"<c r="D1" t="b"><v>1</v></c>"#));
    }

    #[test]
    fn blank_workbook_has_required_parts() {
        let bytes = render(&[vec![CellValue::from("x")]], Some("Q1: sales"), None).unwrap();
        let pkg = OoxmlPackage::from_bytes(&bytes).unwrap();
        assert!(pkg.get_str("xl/workbook.xml").unwrap().contains(r#"name="Q1 sales""#));
        assert!(pkg.get_str(DEFAULT_SHEET_PATH).unwrap().contains("<row r=\"1\">"));
    }

    #[test]
    fn template_sheet_data_is_replaced() {
        let mut tpl = OoxmlPackage::default();
        tpl.set(
            "xl/workbook.xml",
            r#"<workbook xmlns:r="x"><sheets><sheet name="Data" sheetId="1" r:id="rId7"/></sheets></workbook>"#,
        );
        tpl.set(
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships><Relationship Id="rId7" Type="t" Target="worksheets/data.xml"/></Relationships>"#,
        );
        tpl.set(
            "xl/worksheets/data.xml",
            r#"<worksheet><cols><col min="1" max="1" width="30"/></cols><sheetData><row r="1"><c r="A1"><v>9</v></c></row></sheetData></worksheet>"#,
        );
        let proto = TemplatePrototype::from_bytes(
            TemplateKind::Spreadsheet,
            "t.xlsx",
            tpl.to_bytes().unwrap(),
        )
        .unwrap();

        let bytes = render(&[vec![CellValue::from("new")]], None, Some(&proto)).unwrap();
        let sheet = OoxmlPackage::from_bytes(&bytes)
            .unwrap()
            .get_str("xl/worksheets/data.xml")
            .unwrap();
        assert!(sheet.contains("width=\"30\""));
        assert!(sheet.contains(">new<"));
        assert!(!sheet.contains("<v>9</v>"));
    }
}
