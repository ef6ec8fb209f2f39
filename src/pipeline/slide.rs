//! Slide layout: per-slide geometry and font autosizing.
//!
//! All lengths are inches. The engine is pure: it takes a [`SlideSpec`]
//! and a [`SlideFrame`] and returns rectangles; the deck writer converts
//! them to EMU.
//!
//! ```text
//!  ┌──────────────────────────────────────────┐
//!  │  title band (TITLE_TOP .. title_bottom)  │
//!  │  ┌──────────────┐ gutter ┌────────────┐  │
//!  │  │   content    │<──────>│   image    │  │  position = right
//!  │  │              │        └────────────┘  │
//!  │  └──────────────┘                        │
//!  └──────────────────────────────────────────┘
//!    margin                              margin
//! ```
//!
//! Invariants for every `(position, size)` pair:
//! - content and image rectangles are disjoint;
//! - both lie inside the slide minus the outer margin;
//! - both have strictly positive area.
//!
//! When an image would squeeze the content below [`MIN_CONTENT`] it is
//! scaled down, and dropped entirely if it would end up smaller than
//! [`MIN_IMAGE`].

use crate::content::{ImagePosition, SlideSpec};
use crate::pipeline::image::{ImageRef, ImageResolver, ResolvedImage};
use crate::progress::ExportProgressCallback;
use serde::Serialize;
use tracing::warn;

/// Outer margin on every side.
pub const MARGIN: f64 = 0.5;
/// Gap between image and content.
pub const GUTTER: f64 = 0.3;
/// Top of the title band.
pub const TITLE_TOP: f64 = 0.3;
/// Height of the title band.
pub const TITLE_HEIGHT: f64 = 1.0;
/// Gap between the title band and the content area.
pub const TITLE_PADDING: f64 = 0.2;
/// Smallest content width or height the engine will produce.
pub const MIN_CONTENT: f64 = 2.0;
/// Images scaled below this edge length are dropped.
pub const MIN_IMAGE: f64 = 0.5;

pub const BASE_FONT_PT: f64 = 24.0;
pub const MIN_FONT_PT: f64 = 12.0;
pub const TITLE_FONT_PT: f64 = 28.0;

const CHARS_PER_UNIT_WIDTH: f64 = 9.5;
const LINES_PER_UNIT_HEIGHT: f64 = 1.6;
const MIN_CAPACITY: f64 = 120.0;

pub const EMU_PER_INCH: f64 = 914_400.0;

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// True when the interiors overlap. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-9;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    /// `(x, y, cx, cy)` in EMU.
    pub fn to_emu(&self) -> (i64, i64, i64, i64) {
        let emu = |v: f64| (v * EMU_PER_INCH).round() as i64;
        (emu(self.x), emu(self.y), emu(self.w), emu(self.h))
    }
}

/// Slide dimensions and the measured bottom of the title band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlideFrame {
    pub width: f64,
    pub height: f64,
    pub title_bottom: f64,
}

impl Default for SlideFrame {
    /// 10 × 7.5 in (4:3), title band from 0.3 to 1.3 in.
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 7.5,
            title_bottom: TITLE_TOP + TITLE_HEIGHT,
        }
    }
}

impl SlideFrame {
    /// Slide bounds minus the outer margin.
    pub fn safe_area(&self) -> Rect {
        Rect::new(
            MARGIN,
            MARGIN,
            self.width - 2.0 * MARGIN,
            self.height - 2.0 * MARGIN,
        )
    }

    /// The frame itself, or the default when a dimension is not a positive
    /// number.
    fn declared(self) -> Self {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) && self.title_bottom.is_finite() {
            self
        } else {
            Self::default()
        }
    }

    /// Grow the frame so one minimum content box always fits below the title.
    fn sanitized(self) -> Self {
        let width = self.width.max(2.0 * MARGIN + MIN_CONTENT);
        let title_bottom = self.title_bottom.max(MARGIN);
        let height = self
            .height
            .max(title_bottom + TITLE_PADDING + MIN_CONTENT + MARGIN);
        Self {
            width,
            height,
            title_bottom,
        }
    }
}

/// Resolved geometry for one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideLayout {
    pub title_rect: Rect,
    pub content_rect: Rect,
    pub image_rect: Option<Rect>,
    pub font_size: f64,
}

/// Compute the layout of one slide.
///
/// An image rectangle is produced only when the slide asks for an image.
pub fn layout(slide: &SlideSpec, frame: SlideFrame) -> SlideLayout {
    let declared = frame.declared();
    let frame = declared.sanitized();
    let left = MARGIN;
    let right = frame.width - MARGIN;
    let top = frame.title_bottom + TITLE_PADDING;
    let bottom = frame.height - MARGIN;
    let avail_w = right - left;
    let avail_h = bottom - top;

    let title_rect = Rect::new(
        left,
        TITLE_TOP,
        avail_w,
        (frame.title_bottom - TITLE_TOP).max(0.1),
    );
    let full = Rect::new(left, top, avail_w, avail_h);

    let image_dims = slide
        .wants_image()
        .then(|| fit_image(slide, avail_w, avail_h))
        .flatten();

    let (content_rect, image_rect) = match image_dims {
        None => (full, None),
        Some((iw, ih)) => match slide.image_position {
            ImagePosition::Left => {
                let img = Rect::new(left, top, iw, ih);
                let x = img.right() + GUTTER;
                (Rect::new(x, top, right - x, avail_h), Some(img))
            }
            ImagePosition::Right => {
                let img = Rect::new(right - iw, top, iw, ih);
                (
                    Rect::new(left, top, img.x - GUTTER - left, avail_h),
                    Some(img),
                )
            }
            ImagePosition::Top => {
                let img = Rect::new(right - iw, top, iw, ih);
                let y = img.bottom() + GUTTER;
                (Rect::new(left, y, avail_w, bottom - y), Some(img))
            }
            ImagePosition::Bottom => {
                let img = Rect::new(right - iw, bottom - ih, iw, ih);
                (
                    Rect::new(left, top, avail_w, img.y - GUTTER - top),
                    Some(img),
                )
            }
        },
    };

    // A slide smaller than the grown frame gets the same geometry scaled
    // down, so nothing lands outside the real slide.
    let (sx, sy) = (declared.width / frame.width, declared.height / frame.height);
    let fit = |r: Rect| Rect::new(r.x * sx, r.y * sy, r.w * sx, r.h * sy);
    let content_rect = fit(content_rect);

    SlideLayout {
        title_rect: fit(title_rect),
        content_rect,
        image_rect: image_rect.map(fit),
        font_size: dynamic_font_size(slide.total_chars(), &content_rect),
    }
}

/// Requested image size, scaled down so the content keeps [`MIN_CONTENT`]
/// along the split axis. `None` when nothing usable is left.
fn fit_image(slide: &SlideSpec, avail_w: f64, avail_h: f64) -> Option<(f64, f64)> {
    let (iw, ih) = slide.image_size.dimensions();
    let (max_w, max_h) = match slide.image_position {
        ImagePosition::Left | ImagePosition::Right => (avail_w - GUTTER - MIN_CONTENT, avail_h),
        ImagePosition::Top | ImagePosition::Bottom => (avail_w, avail_h - GUTTER - MIN_CONTENT),
    };
    if max_w <= 0.0 || max_h <= 0.0 {
        return None;
    }
    let scale = (max_w / iw).min(max_h / ih).min(1.0);
    let (w, h) = (iw * scale, ih * scale);
    (w >= MIN_IMAGE && h >= MIN_IMAGE).then_some((w, h))
}

/// Seed font size for the content box.
///
/// Capacity is `width × 9.5` characters per line times `height × 1.6`
/// lines. Up to capacity the base size is used; beyond it the size shrinks
/// as `base / ratio`, floored to half points and never below
/// [`MIN_FONT_PT`]. Non-increasing in `total_chars`.
pub fn dynamic_font_size(total_chars: usize, content: &Rect) -> f64 {
    let capacity = (content.w * CHARS_PER_UNIT_WIDTH) * (content.h * LINES_PER_UNIT_HEIGHT);
    let ratio = total_chars as f64 / capacity.max(MIN_CAPACITY);
    if ratio <= 1.0 {
        return BASE_FONT_PT;
    }
    let scaled = ((BASE_FONT_PT / ratio) * 2.0).floor() / 2.0;
    scaled.max(MIN_FONT_PT)
}

// ── Planning with images ─────────────────────────────────────────────────────

/// A slide ready for the deck writer.
#[derive(Debug, Clone)]
pub struct PlannedSlide {
    pub spec: SlideSpec,
    pub layout: SlideLayout,
    pub image: Option<ResolvedImage>,
}

/// Resolve the slide's image, then lay it out. A failed image never fails
/// the slide: the slide is laid out again as if no image was requested.
pub async fn plan_slide(
    slide: &SlideSpec,
    frame: SlideFrame,
    resolver: &dyn ImageResolver,
    progress: &dyn ExportProgressCallback,
) -> PlannedSlide {
    let with_image = layout(slide, frame);
    let (Some(query), Some(_)) = (slide.image_query.as_deref(), with_image.image_rect) else {
        return PlannedSlide {
            spec: slide.clone(),
            layout: with_image,
            image: None,
        };
    };

    let reference = ImageRef::Query(query.to_string());
    match resolver.resolve(&reference).await {
        Ok(image) => PlannedSlide {
            spec: slide.clone(),
            layout: with_image,
            image: Some(image),
        },
        Err(e) => {
            warn!("Slide '{}' loses its image '{query}': {e}", slide.title);
            progress.on_block_degraded(query, &e.to_string());
            let spec = slide.without_image();
            PlannedSlide {
                layout: layout(&spec, frame),
                spec,
                image: None,
            }
        }
    }
}
