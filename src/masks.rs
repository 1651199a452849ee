//! Shape masks for word clouds.
//!
//! A mask is a grayscale silhouette: words are only placed on pixels that are
//! not pure white. Masks are loaded once at startup from the configured
//! `(file, name)` list, converted to 8-bit grayscale, and scaled so their
//! longer edge equals [`MAX_MASK_DIM`] (or the configured `max_dim`). The
//! registry is read-only afterwards.
//!
//! Loading is all-or-nothing: if any configured mask cannot be read or
//! decoded, [`MaskRegistry::load`] fails and the worker does not start.

use crate::config::MaskEntry;
use image::imageops::FilterType;
use image::{GrayImage, ImageReader};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Longer edge of every mask after scaling.
pub const MAX_MASK_DIM: u32 = 500;

/// Pixel value marking "outside the silhouette".
pub const MASKED_OUT: u8 = 255;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to open mask '{name}' at {path}: {source}")]
    Io {
        name: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode mask '{name}' at {path}: {reason}")]
    Decode {
        name: String,
        path: PathBuf,
        reason: String,
    },
    #[error("Mask '{name}' at {path} has no pixels")]
    Empty { name: String, path: PathBuf },
}

/// A scaled grayscale silhouette.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether words must stay off this pixel.
    pub fn is_masked_out(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0[0] == MASKED_OUT
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// Masks keyed by the name request files use to select them.
#[derive(Debug, Clone, Default)]
pub struct MaskRegistry {
    masks: BTreeMap<String, Mask>,
}

impl MaskRegistry {
    /// Registry with no masks (mask support disabled).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load, convert, and scale every configured mask from `dir`.
    pub fn load(dir: &Path, entries: &[MaskEntry], max_dim: u32) -> Result<Self, MaskError> {
        let mut masks = BTreeMap::new();
        for entry in entries {
            let path = dir.join(&entry.file);
            let mask = load_mask(&path, &entry.name, max_dim)?;
            debug!(
                name = %entry.name,
                width = mask.width(),
                height = mask.height(),
                "loaded mask"
            );
            masks.insert(entry.name.clone(), mask);
        }
        info!(count = masks.len(), dir = %dir.display(), "mask registry ready");
        Ok(Self { masks })
    }

    /// Look up a mask by name. Unknown names yield `None` (render unmasked).
    pub fn get(&self, name: &str) -> Option<&Mask> {
        self.masks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.masks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn with_mask(mut self, name: &str, mask: Mask) -> Self {
        self.masks.insert(name.to_string(), mask);
        self
    }
}

fn load_mask(path: &Path, name: &str, max_dim: u32) -> Result<Mask, MaskError> {
    let decoded = ImageReader::open(path)
        .map_err(|source| MaskError::Io {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| MaskError::Io {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|e| MaskError::Decode {
            name: name.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let gray = decoded.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(MaskError::Empty {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(Mask::new(scale_to_max_dim(&gray, max_dim)))
}

/// Dimensions after uniformly scaling `(width, height)` so the longer edge
/// equals `max_dim`. The shorter edge is rounded and never drops below 1.
pub fn scaled_dimensions(size: (u32, u32), max_dim: u32) -> (u32, u32) {
    let (w, h) = size;
    let longer = w.max(h);
    if longer == 0 {
        return (0, 0);
    }
    let scale = max_dim as f64 / longer as f64;
    let sw = ((w as f64 * scale).round() as u32).max(1);
    let sh = ((h as f64 * scale).round() as u32).max(1);
    (sw, sh)
}

/// Scale a grayscale image so its longer edge equals `max_dim` (bicubic).
pub fn scale_to_max_dim(img: &GrayImage, max_dim: u32) -> GrayImage {
    let (w, h) = scaled_dimensions(img.dimensions(), max_dim);
    if (w, h) == img.dimensions() {
        return img.clone();
    }
    image::imageops::resize(img, w, h, FilterType::CatmullRom)
}
