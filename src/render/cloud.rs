//! The production renderer: lays words out greedily, heaviest first.
//!
//! Each word is rasterised through `usvg`/`resvg` as a single SVG `<text>`
//! element, cropped to its coverage, and dropped at a random free position
//! on the canvas. A word that fits nowhere is retried in the other
//! orientation, then at smaller sizes until it drops under the minimum font
//! size, at which point layout stops for every remaining word.
//!
//! Font discovery uses the system font database once, at construction. When no
//! font resolves for the configured family, words rasterise to nothing and
//! are skipped; the output is then a plain background image.

use super::backend::{RenderError, Renderer};
use super::layout::{Occupancy, next_font_size, random_color, rank_frequencies, shrink_step};
use super::params::RenderParams;
use crate::masks::Mask;
use crate::request::FrequencyTable;
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::sync::Arc;
use tracing::{debug, trace};

/// Word-cloud renderer backed by `resvg`.
pub struct CloudRenderer {
    params: RenderParams,
    options: usvg::Options<'static>,
}

/// Outcome of rasterising one word at one size.
enum Glyph {
    /// Nothing drawn (blank word or no usable font).
    Empty,
    /// Coverage ran off the scratch surface; treat as "does not fit".
    TooLarge,
    Ready(GrayImage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

impl CloudRenderer {
    /// Build a renderer, loading system fonts.
    pub fn new(params: RenderParams) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "font database loaded");
        let options = usvg::Options {
            font_family: params.font_family.clone(),
            fontdb: Arc::new(db),
            ..Default::default()
        };
        Self { params, options }
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    fn rng(&self) -> fastrand::Rng {
        match self.params.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }

    /// Rasterise `word` at `font_size` into an alpha-coverage image cropped to
    /// the drawn pixels.
    fn rasterize(&self, word: &str, font_size: u32, max_extent: u32) -> Result<Glyph, RenderError> {
        let glyph_err = |reason: String| RenderError::Glyph {
            word: word.to_string(),
            reason,
        };
        let chars = word.chars().count() as u32;
        let width = font_size
            .saturating_mul(chars + 2)
            .min(font_size.saturating_add(max_extent.saturating_mul(2)))
            .max(1);
        let height = font_size.saturating_mul(2).max(1);

        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text x="{x}" y="{y}" font-family="{family}" font-size="{font_size}" fill="white">{text}</text></svg>"#,
            x = font_size / 2,
            y = font_size as f32 * 1.4,
            family = escape_xml(&self.params.font_family),
            text = escape_xml(word),
        );
        let tree = usvg::Tree::from_str(&svg, &self.options).map_err(|e| glyph_err(e.to_string()))?;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| glyph_err(format!("cannot allocate {width}x{height} surface")))?;
        resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        let alpha = |x: u32, y: u32| pixmap.pixels()[(y * width + x) as usize].alpha();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..height {
            for x in 0..width {
                if alpha(x, y) > 0 {
                    bounds = Some(match bounds {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }
        let Some((x0, y0, x1, y1)) = bounds else {
            return Ok(Glyph::Empty);
        };
        if x1 + 1 >= width || y1 + 1 >= height {
            return Ok(Glyph::TooLarge);
        }
        let cropped = GrayImage::from_fn(x1 - x0 + 1, y1 - y0 + 1, |x, y| {
            Luma([alpha(x0 + x, y0 + y)])
        });
        Ok(Glyph::Ready(cropped))
    }
}

impl Renderer for CloudRenderer {
    #[tracing::instrument(skip_all, fields(words = table.len(), masked = mask.is_some()))]
    fn render(&self, table: &FrequencyTable, mask: Option<&Mask>) -> Result<RgbImage, RenderError> {
        let p = &self.params;
        let ranked = rank_frequencies(table, p.max_words);
        if ranked.is_empty() {
            return Err(RenderError::EmptyTable);
        }

        let mut occupancy = match mask {
            Some(m) => Occupancy::from_mask(m),
            None => Occupancy::new(p.width, p.height),
        };
        let (width, height) = (occupancy.width(), occupancy.height());
        let max_extent = width.max(height);
        let mut canvas = RgbImage::from_pixel(width, height, Rgb(p.background));
        let mut rng = self.rng();

        let mut font_size = p.max_font_size.unwrap_or(height);
        let mut last_weight = 1.0;
        let mut placed = 0usize;

        for (index, (word, weight)) in ranked.iter().enumerate() {
            if index > 0 {
                font_size = next_font_size(font_size, *weight, last_weight, p.relative_scaling);
            }
            let mut orientation = if rng.f32() < p.prefer_horizontal {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            let mut flipped = false;

            let spot = loop {
                if font_size < p.min_font_size {
                    break None;
                }
                let fits = match self.rasterize(word, font_size, max_extent)? {
                    Glyph::Empty => {
                        trace!(word = %word, "no coverage, skipping");
                        break None;
                    }
                    Glyph::TooLarge => None,
                    Glyph::Ready(glyph) => {
                        let glyph = match orientation {
                            Orientation::Horizontal => glyph,
                            Orientation::Vertical => image::imageops::rotate270(&glyph),
                        };
                        occupancy
                            .find_position(glyph.width() + p.margin, glyph.height() + p.margin, &mut rng)
                            .map(|(x, y)| (x + p.margin / 2, y + p.margin / 2, glyph))
                    }
                };
                if fits.is_some() {
                    break fits;
                }
                if !flipped && p.prefer_horizontal < 1.0 {
                    orientation = match orientation {
                        Orientation::Horizontal => Orientation::Vertical,
                        Orientation::Vertical => Orientation::Horizontal,
                    };
                    flipped = true;
                    continue;
                }
                font_size = font_size.saturating_sub(shrink_step(font_size));
                orientation = Orientation::Horizontal;
                flipped = false;
            };

            if font_size < p.min_font_size {
                debug!(word = %word, "font size below minimum, stopping layout");
                break;
            }
            if let Some((x, y, glyph)) = spot {
                let color = random_color(&mut rng);
                blend(&mut canvas, x, y, &glyph, color);
                occupancy.occupy(x, y, &glyph);
                placed += 1;
                trace!(word = %word, font_size, x, y, "placed");
            }
            last_weight = *weight;
        }

        debug!(placed, candidates = ranked.len(), width, height, "layout finished");
        Ok(canvas)
    }
}

/// Alpha-blend `color` onto `canvas` using `glyph` as coverage.
fn blend(canvas: &mut RgbImage, x: u32, y: u32, glyph: &GrayImage, color: [u8; 3]) {
    for (gx, gy, coverage) in glyph.enumerate_pixels() {
        let a = coverage.0[0] as u32;
        if a == 0 {
            continue;
        }
        let (cx, cy) = (x + gx, y + gy);
        if cx >= canvas.width() || cy >= canvas.height() {
            continue;
        }
        let px = canvas.get_pixel_mut(cx, cy);
        for c in 0..3 {
            let bg = px.0[c] as u32;
            px.0[c] = ((color[c] as u32 * a + bg * (255 - a) + 127) / 255) as u8;
        }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
