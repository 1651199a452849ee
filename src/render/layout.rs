//! Pure layout functions for word placement.
//!
//! Nothing here touches fonts or files: ranking, font-size progression,
//! colour picking, and the occupancy grid are all plain arithmetic so they
//! can be tested directly.
//!
//! # Occupancy
//!
//! [`Occupancy`] tracks which canvas pixels are taken, by a mask or by an
//! already placed word, together with a summed-area table. A box is free when
//! its area sum is zero, which makes each check O(1). After a word is placed
//! only the part of the table below and to the right of it is rebuilt.

use crate::masks::Mask;
use crate::request::FrequencyTable;
use image::GrayImage;

/// Positive, finite weights sorted heaviest first (ties by word), cut to
/// `max_words`, and normalised so the first weight is 1.0.
pub fn rank_frequencies(table: &FrequencyTable, max_words: usize) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = table
        .iter()
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .map(|(word, w)| (word.to_string(), w))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_words);
    if let Some(max) = ranked.first().map(|(_, w)| *w) {
        for (_, w) in &mut ranked {
            *w /= max;
        }
    }
    ranked
}

/// Font size for the next word given the previous size and the weights of the
/// previous and current word.
///
/// With `relative_scaling = 0` sizes never change between words (rank order
/// alone decides placement); with `1` the size follows the weight ratio.
pub fn next_font_size(
    previous_size: u32,
    weight: f64,
    previous_weight: f64,
    relative_scaling: f32,
) -> u32 {
    if previous_weight <= 0.0 {
        return previous_size;
    }
    let rs = relative_scaling as f64;
    ((rs * weight / previous_weight + (1.0 - rs)) * previous_size as f64).round() as u32
}

/// How much to shrink a word that does not fit anywhere.
pub fn shrink_step(font_size: u32) -> u32 {
    (font_size / 10).max(1)
}

/// Convert HSL (hue in degrees, saturation and lightness 0..1) to RGB.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

/// Random saturated mid-lightness colour.
pub fn random_color(rng: &mut fastrand::Rng) -> [u8; 3] {
    hsl_to_rgb(rng.f32() * 360.0, 0.8, 0.5)
}

/// Occupied-pixel grid with a summed-area table for O(1) box checks.
#[derive(Debug, Clone)]
pub struct Occupancy {
    width: u32,
    height: u32,
    taken: Vec<bool>,
    /// `(width + 1) * (height + 1)` prefix sums; row 0 and column 0 are zero.
    integral: Vec<u32>,
}

impl Occupancy {
    /// Empty canvas: every pixel free.
    pub fn new(width: u32, height: u32) -> Self {
        let w = width as usize;
        let h = height as usize;
        Self {
            width,
            height,
            taken: vec![false; w * h],
            integral: vec![0; (w + 1) * (h + 1)],
        }
    }

    /// Canvas the size of `mask` with every masked-out pixel already taken.
    pub fn from_mask(mask: &Mask) -> Self {
        let mut occ = Self::new(mask.width(), mask.height());
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if mask.is_masked_out(x, y) {
                    let i = occ.cell(x, y);
                    occ.taken[i] = true;
                }
            }
        }
        occ.rebuild_from(0, 0);
        occ
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_taken(&self, x: u32, y: u32) -> bool {
        self.taken[self.cell(x, y)]
    }

    /// Number of taken pixels inside the box.
    fn area(&self, x: u32, y: u32, w: u32, h: u32) -> u32 {
        let stride = self.width as usize + 1;
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        self.integral[y1 * stride + x1] + self.integral[y0 * stride + x0]
            - self.integral[y0 * stride + x1]
            - self.integral[y1 * stride + x0]
    }

    /// Whether a `w`×`h` box at `(x, y)` lies on the canvas with no pixel taken.
    pub fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        x.checked_add(w).is_some_and(|r| r <= self.width)
            && y.checked_add(h).is_some_and(|b| b <= self.height)
            && self.area(x, y, w, h) == 0
    }

    /// Pick uniformly among every free top-left position for a `w`×`h` box.
    pub fn find_position(&self, w: u32, h: u32, rng: &mut fastrand::Rng) -> Option<(u32, u32)> {
        if w == 0 || h == 0 || w > self.width || h > self.height {
            return None;
        }
        let xs = 0..=self.width - w;
        let ys = 0..=self.height - h;

        let mut hits = 0usize;
        for y in ys.clone() {
            for x in xs.clone() {
                if self.area(x, y, w, h) == 0 {
                    hits += 1;
                }
            }
        }
        if hits == 0 {
            return None;
        }

        let mut target = rng.usize(0..hits);
        for y in ys {
            for x in xs.clone() {
                if self.area(x, y, w, h) == 0 {
                    if target == 0 {
                        return Some((x, y));
                    }
                    target -= 1;
                }
            }
        }
        None
    }

    /// Mark every non-zero pixel of `glyph`, drawn at `(x, y)`, as taken.
    /// Pixels falling off the canvas are ignored.
    pub fn occupy(&mut self, x: u32, y: u32, glyph: &GrayImage) {
        let mut touched = false;
        for (gx, gy, px) in glyph.enumerate_pixels() {
            let (cx, cy) = (x + gx, y + gy);
            if px.0[0] > 0 && cx < self.width && cy < self.height {
                let i = self.cell(cx, cy);
                self.taken[i] = true;
                touched = true;
            }
        }
        if touched {
            self.rebuild_from(x.min(self.width), y.min(self.height));
        }
    }

    fn cell(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Recompute prefix sums for every cell at or below `y0` and at or right
    /// of `x0`; everything above or left of that corner is unchanged.
    fn rebuild_from(&mut self, x0: u32, y0: u32) {
        let stride = self.width as usize + 1;
        for y in y0 as usize..self.height as usize {
            for x in x0 as usize..self.width as usize {
                let taken = self.taken[y * self.width as usize + x] as u32;
                self.integral[(y + 1) * stride + x + 1] = taken
                    + self.integral[y * stride + x + 1]
                    + self.integral[(y + 1) * stride + x]
                    - self.integral[y * stride + x];
            }
        }
    }
}
