//! Pipeline stages for content-to-layout rendering.
//!
//! Each submodule implements exactly one transformation step. None of them
//! writes files or knows about output formats beyond the geometry a writer
//! needs.
//!
//! ## Data Flow
//!
//! ```text
//! prepare ──▶ normalize ──▶ flow ──────▶ FlowBlock[]     (pdf, docx)
//! (regexes)   (element tree) └─ image ◀── resolver
//!                    slide ──▶ PlannedSlide[]            (pptx)
//!                      └─ image ◀── resolver
//! template: prototypes loaded once, opened per render
//! ```
//!
//! 1. [`prepare`]   deterministic markdown cleanup before parsing
//!    (line endings, invisible characters, `image_query:` links, emoji)
//! 2. [`normalize`] markdown or typed blocks into one [`crate::tree::ElementTree`]
//! 3. [`flow`]      element tree into styled flow blocks; resolves images
//!    one at a time and degrades failures to placeholder text
//! 4. [`slide`]     per-slide geometry and font autosizing
//! 5. [`image`]     the image boundary: providers, downloads, decoding
//! 6. [`template`]  template discovery, private package copies, style lookup

pub mod flow;
pub mod image;
pub mod normalize;
pub mod prepare;
pub mod slide;
pub mod template;
