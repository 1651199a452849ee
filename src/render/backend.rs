//! Renderer trait and shared error type.
//!
//! The [`Renderer`] trait is the whole contract the worker relies on: a
//! frequency table and an optional mask go in, an RGB image comes out. The
//! production implementation is [`CloudRenderer`](super::cloud::CloudRenderer).
//! Writing the image to disk is separate (see [`save_png`](super::save_png)).

use crate::masks::Mask;
use crate::request::FrequencyTable;
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Frequency table has no positive weights")]
    EmptyTable,
    #[error("Failed to rasterise '{word}': {reason}")]
    Glyph { word: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode PNG {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// Turns a frequency table into a word-cloud image.
///
/// With a mask, the image has the mask's dimensions and words stay inside
/// its silhouette. Without one, the renderer picks its own canvas size.
pub trait Renderer {
    fn render(&self, table: &FrequencyTable, mask: Option<&Mask>)
    -> Result<RgbImage, RenderError>;
}
