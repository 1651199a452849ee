//! Shared test utilities for the wordcloud-worker test suite.
//!
//! Provides request-file and mask-image writers plus canned identifiers so
//! module tests can build a watch directory in a few lines.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_request(tmp.path(), UUID_A, Some("shield"), r#"{"dragon": 10}"#);
//! write_mask_png(&tmp.path().join("shield.png"), 40, 40);
//! ```

use image::{GrayImage, Luma};
use std::path::{Path, PathBuf};

use crate::naming::request_file_name;

pub const UUID_A: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
pub const UUID_B: &str = "9b2e1c0a-0f4d-4b7e-8a61-5d3c2b1a0f9e";
pub const UUID_C: &str = "00000000-1111-2222-3333-444444444444";

// =========================================================================
// Fixture writers
// =========================================================================

/// Write a request file named after `id` (and `mask`) into `dir`.
pub fn write_request(dir: &Path, id: &str, mask: Option<&str>, json: &str) -> PathBuf {
    let path = dir.join(request_file_name(id, mask));
    std::fs::write(&path, json).unwrap();
    path
}

/// Write a grayscale PNG mask: a black ellipse on a white background.
pub fn write_mask_png(path: &Path, width: u32, height: u32) {
    silhouette(width, height).save(path).unwrap();
}

/// Black ellipse filling the image, white outside it.
pub fn silhouette(width: u32, height: u32) -> GrayImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    GrayImage::from_fn(width, height, |x, y| {
        let dx = (x as f64 + 0.5 - cx) / cx;
        let dy = (y as f64 + 0.5 - cy) / cy;
        if dx * dx + dy * dy <= 1.0 {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

// =========================================================================
// Directory assertions
// =========================================================================

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
