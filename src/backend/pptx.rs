//! Slide-deck writer: PresentationML written by hand into an OPC package.
//!
//! ## One assembly path
//!
//! A blank deck is a minimal package with a master, two layouts ("Title
//! Slide", "Title and Content") and no slides. A template is the caller's
//! package. Both go through [`assemble`]:
//!
//! 1. the first slide of the package is the title slot: its first text run
//!    is overwritten with the deck title. A package without slides gets a
//!    new title slide on its title layout;
//! 2. every other slide is removed, together with its notes;
//! 3. one slide per [`PlannedSlide`] is appended on the content layout;
//! 4. `presentation.xml`, its relationships and `[Content_Types].xml` are
//!    rewritten to list exactly the resulting slides.
//!
//! Part rewriting uses regexes over the XML text. It only touches the
//! slide list, relationship entries and content-type overrides.

use super::{escape_xml, render_failed};
use crate::error::ExportError;
use crate::pipeline::image::ResolvedImage;
use crate::pipeline::slide::{PlannedSlide, Rect, SlideFrame, EMU_PER_INCH, TITLE_FONT_PT};
use crate::pipeline::template::{OoxmlPackage, TemplatePrototype};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const REL_NOTES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

const PRESENTATION: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";

/// Content lines are followed by 6 pt.
const SPACE_AFTER_CENTIPOINTS: u32 = 600;
const BODY_FONT: &str = "Calibri";

/// Write the deck. A template that cannot be assembled is logged and the
/// deck is rebuilt from the blank package.
pub fn render(
    title: Option<&str>,
    slides: &[PlannedSlide],
    template: Option<&TemplatePrototype>,
) -> Result<Vec<u8>, ExportError> {
    if let Some(proto) = template {
        match proto.open().and_then(|pkg| assemble(pkg, title, slides)) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => warn!(
                "Slide template '{}' unusable, using a blank deck: {e}",
                proto.path().display()
            ),
        }
    }
    assemble(blank_deck(), title, slides)
}

/// Slide frame for layout: the template's slide size when it declares one,
/// 10 × 7.5 in otherwise.
pub fn slide_frame(template: Option<&TemplatePrototype>) -> SlideFrame {
    let default = SlideFrame::default();
    let size = template
        .and_then(|proto| proto.open().ok())
        .and_then(|pkg| pkg.get_str(PRESENTATION))
        .and_then(|xml| {
            let tag = RE_SLD_SZ.find(&xml)?.as_str().to_string();
            let cx: f64 = attr(&tag, "cx")?.parse().ok()?;
            let cy: f64 = attr(&tag, "cy")?.parse().ok()?;
            Some((cx / EMU_PER_INCH, cy / EMU_PER_INCH))
        });
    match size {
        Some((width, height)) if width > 0.0 && height > 0.0 => SlideFrame {
            width,
            height,
            ..default
        },
        _ => default,
    }
}

// ── XML helpers ──────────────────────────────────────────────────────────────

static RE_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([\w:]+)="([^"]*)""#).unwrap());
static RE_REL: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Relationship\b[^>]*/>").unwrap());
static RE_OVERRIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Override\b[^>]*/>").unwrap());
static RE_SLD_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p:sldId\b[^>]*/>").unwrap());
static RE_SLD_ID_LST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p:sldIdLst\s*/>|<p:sldIdLst>.*?</p:sldIdLst>").unwrap());
static RE_SLD_SZ: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p:sldSz\b[^>]*/>").unwrap());
static RE_FIRST_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<a:t>.*?</a:t>|<a:t/>").unwrap());
static RE_FIRST_PARA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:p>.*?</a:p>|<a:p/>").unwrap());
static RE_LAYOUT_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slideLayouts/slideLayout(\d+)\.xml$").unwrap());

fn attr(tag: &str, name: &str) -> Option<String> {
    RE_ATTR
        .captures_iter(tag)
        .find(|c| &c[1] == name)
        .map(|c| c[2].to_string())
}

/// `"../slides/slide2.xml"` relative to `ppt/slides/` → `"ppt/slides/slide2.xml"`.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`.
fn rels_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, name)) => format!("{dir}/_rels/{name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[derive(Debug, Clone)]
struct Rel {
    id: String,
    target: String,
    kind: String,
    xml: String,
}

fn parse_rels(xml: &str) -> Vec<Rel> {
    RE_REL
        .find_iter(xml)
        .filter_map(|m| {
            let tag = m.as_str();
            Some(Rel {
                id: attr(tag, "Id")?,
                target: attr(tag, "Target")?,
                kind: attr(tag, "Type").unwrap_or_default(),
                xml: tag.to_string(),
            })
        })
        .collect()
}

fn rels_xml(entries: impl IntoIterator<Item = String>) -> String {
    let body: String = entries.into_iter().map(|e| format!("\n  {e}")).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PKG_REL}">{body}
</Relationships>"#
    )
}

fn rel_entry(id: &str, kind: &str, target: &str) -> String {
    format!(r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"/>"#)
}

// ── Assembly ─────────────────────────────────────────────────────────────────

fn assemble(
    mut pkg: OoxmlPackage,
    title: Option<&str>,
    slides: &[PlannedSlide],
) -> Result<Vec<u8>, ExportError> {
    let presentation = pkg
        .get_str(PRESENTATION)
        .ok_or_else(|| render_failed("pptx", "package has no ppt/presentation.xml"))?;
    let pres_rels = parse_rels(&pkg.get_str(PRESENTATION_RELS).unwrap_or_default());
    let title = title.unwrap_or("");

    // Existing slides in deck order.
    let existing: Vec<(String, String)> = RE_SLD_ID
        .find_iter(&presentation)
        .filter_map(|m| {
            let rid = attr(m.as_str(), "r:id")?;
            let rel = pres_rels.iter().find(|r| r.id == rid)?;
            Some((m.as_str().to_string(), resolve_target("ppt", &rel.target)))
        })
        .collect();

    let mut removed = Vec::new();
    for (_, part) in existing.iter().skip(1) {
        remove_slide(&mut pkg, part, &mut removed);
    }

    let (content_layout, title_layout) = pick_layouts(&pkg)?;
    let mut next_rid = pres_rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let mut next_sld_id = existing
        .iter()
        .filter_map(|(tag, _)| attr(tag, "id")?.parse::<u32>().ok())
        .max()
        .unwrap_or(255)
        .max(255)
        + 1;

    let mut sld_ids = Vec::new();
    let mut new_rels = Vec::new();
    let mut new_parts = Vec::new();

    match existing.first() {
        Some((tag, part)) => {
            overwrite_title(&mut pkg, part, title);
            sld_ids.push(tag.clone());
        }
        None => {
            let part = free_slide_part(&pkg, &new_parts);
            pkg.set(&part, title_slide_xml(title));
            pkg.set(
                &rels_part(&part),
                rels_xml([rel_entry("rId1", REL_LAYOUT, &format!("../slideLayouts/{title_layout}"))]),
            );
            register_slide(&part, &mut next_rid, &mut next_sld_id, &mut sld_ids, &mut new_rels);
            new_parts.push(part);
        }
    }

    for planned in slides {
        let part = free_slide_part(&pkg, &new_parts);
        let mut rels = vec![rel_entry(
            "rId1",
            REL_LAYOUT,
            &format!("../slideLayouts/{content_layout}"),
        )];
        let picture = match (&planned.image, planned.layout.image_rect) {
            (Some(image), Some(rect)) => {
                let media = free_media_part(&pkg);
                pkg.set(&media, image.png.clone());
                let file = media.rsplit('/').next().unwrap_or("image.png");
                rels.push(rel_entry("rId2", REL_IMAGE, &format!("../media/{file}")));
                Some((image, rect))
            }
            _ => None,
        };
        pkg.set(&part, content_slide_xml(planned, picture));
        pkg.set(&rels_part(&part), rels_xml(rels));
        register_slide(&part, &mut next_rid, &mut next_sld_id, &mut sld_ids, &mut new_rels);
        new_parts.push(part);
    }

    // presentation.xml
    let list = format!("<p:sldIdLst>{}</p:sldIdLst>", sld_ids.concat());
    let presentation = if RE_SLD_ID_LST.is_match(&presentation) {
        RE_SLD_ID_LST
            .replace(&presentation, regex::NoExpand(&list))
            .into_owned()
    } else if presentation.contains("</p:sldMasterIdLst>") {
        presentation.replacen("</p:sldMasterIdLst>", &format!("</p:sldMasterIdLst>{list}"), 1)
    } else {
        return Err(render_failed("pptx", "presentation.xml has no slide master list"));
    };
    pkg.set(PRESENTATION, presentation);

    // presentation relationships
    let kept = pres_rels
        .iter()
        .filter(|r| !removed.contains(&resolve_target("ppt", &r.target)))
        .map(|r| r.xml.clone());
    pkg.set(PRESENTATION_RELS, rels_xml(kept.chain(new_rels)));

    // content types
    let types = pkg
        .get_str(CONTENT_TYPES)
        .ok_or_else(|| render_failed("pptx", "package has no [Content_Types].xml"))?;
    pkg.set(CONTENT_TYPES, content_types(&types, &removed, &new_parts));

    debug!(
        "Deck assembled: {} slide(s) written, {} template slide(s) removed",
        new_parts.len(),
        removed.len()
    );
    pkg.to_bytes()
}

fn register_slide(
    part: &str,
    next_rid: &mut u32,
    next_sld_id: &mut u32,
    sld_ids: &mut Vec<String>,
    rels: &mut Vec<String>,
) {
    let rid = format!("rId{next_rid}");
    let target = part.strip_prefix("ppt/").unwrap_or(part);
    sld_ids.push(format!(r#"<p:sldId id="{next_sld_id}" r:id="{rid}"/>"#));
    rels.push(rel_entry(&rid, REL_SLIDE, target));
    *next_rid += 1;
    *next_sld_id += 1;
}

/// Remove a slide part, its relationships and its notes.
fn remove_slide(pkg: &mut OoxmlPackage, part: &str, removed: &mut Vec<String>) {
    let rels_name = rels_part(part);
    if let Some(rels) = pkg.get_str(&rels_name) {
        for rel in parse_rels(&rels).into_iter().filter(|r| r.kind == REL_NOTES) {
            let notes = resolve_target(part_dir(part), &rel.target);
            pkg.remove(&rels_part(&notes));
            pkg.remove(&notes);
            removed.push(notes);
        }
    }
    pkg.remove(&rels_name);
    pkg.remove(part);
    removed.push(part.to_string());
}

fn free_slide_part(pkg: &OoxmlPackage, reserved: &[String]) -> String {
    (1..)
        .map(|n| format!("ppt/slides/slide{n}.xml"))
        .find(|p| pkg.get(p).is_none() && !reserved.contains(p))
        .unwrap_or_else(|| "ppt/slides/slide_extra.xml".to_string())
}

fn free_media_part(pkg: &OoxmlPackage) -> String {
    (1..)
        .map(|n| format!("ppt/media/export_image{n}.png"))
        .find(|p| pkg.get(p).is_none())
        .unwrap_or_else(|| "ppt/media/export_image.png".to_string())
}

/// `(content layout, title layout)` file names under `ppt/slideLayouts/`.
fn pick_layouts(pkg: &OoxmlPackage) -> Result<(String, String), ExportError> {
    let mut layouts: Vec<(u32, String)> = pkg
        .names()
        .filter_map(|n| {
            let caps = RE_LAYOUT_PART.captures(n)?;
            Some((caps[1].parse().ok()?, n.to_string()))
        })
        .collect();
    layouts.sort();
    if layouts.is_empty() {
        return Err(render_failed("pptx", "package has no slide layouts"));
    }

    let of_type = |kind: &str| {
        layouts
            .iter()
            .find(|(_, part)| {
                pkg.get_str(part)
                    .is_some_and(|xml| xml.contains(&format!(r#"type="{kind}""#)))
            })
            .map(|(_, part)| part.clone())
    };
    let content = of_type("obj")
        .or_else(|| layouts.get(1).map(|(_, p)| p.clone()))
        .unwrap_or_else(|| layouts[0].1.clone());
    let title = of_type("title").unwrap_or_else(|| layouts[0].1.clone());

    let file = |part: String| part.rsplit('/').next().unwrap_or_default().to_string();
    Ok((file(content), file(title)))
}

fn overwrite_title(pkg: &mut OoxmlPackage, part: &str, title: &str) {
    let Some(xml) = pkg.get_str(part) else {
        return;
    };
    let text = format!("<a:t>{}</a:t>", escape_xml(title));
    let updated = if RE_FIRST_TEXT.is_match(&xml) {
        RE_FIRST_TEXT.replace(&xml, regex::NoExpand(&text)).into_owned()
    } else if RE_FIRST_PARA.is_match(&xml) {
        let para = format!(r#"<a:p><a:r><a:rPr lang="en-US"/>{text}</a:r></a:p>"#);
        RE_FIRST_PARA.replace(&xml, regex::NoExpand(&para)).into_owned()
    } else {
        debug!("Title slot '{part}' has no text body; title not written");
        return;
    };
    pkg.set(part, updated);
}

fn content_types(xml: &str, removed: &[String], added: &[String]) -> String {
    let mut out = RE_OVERRIDE
        .replace_all(xml, |caps: &regex::Captures| {
            let tag = &caps[0];
            let gone = attr(tag, "PartName")
                .map(|p| removed.iter().any(|r| p.trim_start_matches('/') == r))
                .unwrap_or(false);
            if gone {
                String::new()
            } else {
                tag.to_string()
            }
        })
        .into_owned();

    let mut extra = String::new();
    if !out.contains(r#"Extension="png""#) {
        extra.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
    }
    for part in added {
        extra.push_str(&format!(
            r#"<Override PartName="/{part}" ContentType="{CT_SLIDE}"/>"#
        ));
    }
    match out.rfind("</Types>") {
        Some(pos) => out.insert_str(pos, &extra),
        None => out.push_str(&extra),
    }
    out
}

// ── Slide XML ────────────────────────────────────────────────────────────────

fn slide_xml(shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn xfrm(rect: &Rect) -> String {
    let (x, y, cx, cy) = rect.to_emu();
    format!(r#"<a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#)
}

fn title_slide_xml(title: &str) -> String {
    let body = if title.is_empty() {
        r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
    } else {
        format!(
            r#"<a:p><a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r></a:p>"#,
            escape_xml(title)
        )
    };
    slide_xml(&format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="ctrTitle"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{body}</p:txBody></p:sp>"#
    ))
}

fn content_slide_xml(planned: &PlannedSlide, picture: Option<(&ResolvedImage, Rect)>) -> String {
    let layout = &planned.layout;
    let title_sz = (TITLE_FONT_PT * 100.0).round() as u32;
    let body_sz = (layout.font_size * 100.0).round() as u32;

    let mut shapes = format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" sz="{title_sz}" b="1"/><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        xfrm(&layout.title_rect),
        escape_xml(&planned.spec.title)
    );

    let paragraphs: String = if planned.spec.content_lines.is_empty() {
        r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
    } else {
        planned
            .spec
            .content_lines
            .iter()
            .map(|line| {
                format!(
                    r#"<a:p><a:pPr><a:spcAft><a:spcPts val="{SPACE_AFTER_CENTIPOINTS}"/></a:spcAft></a:pPr><a:r><a:rPr lang="en-US" sz="{body_sz}" dirty="0"><a:latin typeface="{BODY_FONT}"/></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
                    escape_xml(line)
                )
            })
            .collect()
    };
    shapes.push_str(&format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Content Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr><p:txBody><a:bodyPr wrap="square"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        xfrm(&layout.content_rect)
    ));

    if let Some((image, rect)) = picture {
        let fitted = fit_within(&rect, image.aspect());
        let descr = escape_xml(planned.spec.image_query.as_deref().unwrap_or_default());
        shapes.push_str(&format!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture 3" descr="{descr}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
            xfrm(&fitted)
        ));
    }
    slide_xml(&shapes)
}

/// Largest rectangle of the given aspect (height / width) centred in `rect`.
fn fit_within(rect: &Rect, aspect: f64) -> Rect {
    if !(aspect.is_finite() && aspect > 0.0) {
        return *rect;
    }
    let (w, h) = if rect.h / rect.w > aspect {
        (rect.w, rect.w * aspect)
    } else {
        (rect.h / aspect, rect.h)
    };
    Rect::new(rect.x + (rect.w - w) / 2.0, rect.y + (rect.h - h) / 2.0, w, h)
}

// ── Blank package ────────────────────────────────────────────────────────────

fn blank_deck() -> OoxmlPackage {
    let frame = SlideFrame::default();
    let (cx, cy) = (
        (frame.width * EMU_PER_INCH).round() as i64,
        (frame.height * EMU_PER_INCH).round() as i64,
    );
    let mut pkg = OoxmlPackage::default();

    pkg.set(
        CONTENT_TYPES,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/presProps.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"/><Override PartName="/ppt/tableStyles.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/slideLayouts/slideLayout2.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/></Types>"#,
    );
    pkg.set(
        "_rels/.rels",
        rels_xml([
            rel_entry(
                "rId1",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
                "ppt/presentation.xml",
            ),
            rel_entry(
                "rId2",
                "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
                "docProps/core.xml",
            ),
            rel_entry(
                "rId3",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties",
                "docProps/app.xml",
            ),
        ]),
    );
    pkg.set(
        "docProps/app.xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>edgequake-export</Application><PresentationFormat>On-screen Show (4:3)</PresentationFormat></Properties>"#,
    );
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    pkg.set(
        "docProps/core.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:creator>edgequake-export</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified></cp:coreProperties>"#
        ),
    );
    pkg.set(
        PRESENTATION,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst/><p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="{cy}" cy="{cx}"/></p:presentation>"#
        ),
    );
    pkg.set(
        PRESENTATION_RELS,
        rels_xml([
            rel_entry("rId1", REL_MASTER, "slideMasters/slideMaster1.xml"),
            rel_entry(
                "rId2",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps",
                "presProps.xml",
            ),
            rel_entry("rId3", REL_THEME, "theme/theme1.xml"),
            rel_entry(
                "rId4",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles",
                "tableStyles.xml",
            ),
        ]),
    );
    pkg.set(
        "ppt/presProps.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#
        ),
    );
    pkg.set(
        "ppt/tableStyles.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
        ),
    );
    pkg.set("ppt/theme/theme1.xml", theme_xml());
    pkg.set(
        "ppt/slideMasters/slideMaster1.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/><p:sldLayoutId id="2147483650" r:id="rId2"/></p:sldLayoutIdLst></p:sldMaster>"#
        ),
    );
    pkg.set(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        rels_xml([
            rel_entry("rId1", REL_LAYOUT, "../slideLayouts/slideLayout1.xml"),
            rel_entry("rId2", REL_LAYOUT, "../slideLayouts/slideLayout2.xml"),
            rel_entry("rId3", REL_THEME, "../theme/theme1.xml"),
        ]),
    );

    let layout_rels = rels_xml([rel_entry("rId1", REL_MASTER, "../slideMasters/slideMaster1.xml")]);
    pkg.set(
        "ppt/slideLayouts/slideLayout1.xml",
        layout_xml("title", "Title Slide", &[("ctrTitle", None), ("subTitle", Some(1))]),
    );
    pkg.set("ppt/slideLayouts/_rels/slideLayout1.xml.rels", layout_rels.clone());
    pkg.set(
        "ppt/slideLayouts/slideLayout2.xml",
        layout_xml("obj", "Title and Content", &[("title", None), ("body", Some(1))]),
    );
    pkg.set("ppt/slideLayouts/_rels/slideLayout2.xml.rels", layout_rels);
    pkg
}

fn layout_xml(kind: &str, name: &str, placeholders: &[(&str, Option<u32>)]) -> String {
    let shapes: String = placeholders
        .iter()
        .enumerate()
        .map(|(i, (ph, idx))| {
            let ph = match (ph, idx) {
                (&"body", Some(idx)) => format!(r#"<p:ph idx="{idx}"/>"#),
                (ph, Some(idx)) => format!(r#"<p:ph type="{ph}" idx="{idx}"/>"#),
                (ph, None) => format!(r#"<p:ph type="{ph}"/>"#),
            };
            format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="Placeholder {}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#,
                i + 2,
                i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="{kind}" preserve="1"><p:cSld name="{name}"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn theme_xml() -> String {
    let accents = ["4472C4", "ED7D31", "A5A5A5", "FFC000", "5B9BD5", "70AD47"];
    let accent_xml: String = accents
        .iter()
        .enumerate()
        .map(|(i, c)| format!(r#"<a:accent{n}><a:srgbClr val="{c}"/></a:accent{n}>"#, n = i + 1))
        .collect();
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#.repeat(3);
    let lines: String = [6350, 12700, 19050]
        .iter()
        .map(|w| format!(r#"<a:ln w="{w}"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#))
        .collect();
    let effects = "<a:effectStyle><a:effectLst/></a:effectStyle>".repeat(3);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="{NS_A}" name="Export"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>{accent_xml}<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="{BODY_FONT}"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{fill}</a:fillStyleLst><a:lnStyleLst>{lines}</a:lnStyleLst><a:effectStyleLst>{effects}</a:effectStyleLst><a:bgFillStyleLst>{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}
