//! PNG output.

use super::backend::RenderError;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `image` to `path` as an 8-bit RGB PNG, replacing any existing file.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| RenderError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn writes_decodable_png() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.generated.png");
        let img = RgbImage::from_pixel(7, 3, Rgb([1, 2, 3]));
        save_png(&img, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (7, 3));
        assert_eq!(decoded.get_pixel(6, 2).0, [1, 2, 3]);
    }

    #[test]
    fn overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.png");
        std::fs::write(&path, b"stale").unwrap();
        save_png(&RgbImage::new(2, 2), &path).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 2);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope").join("out.png");
        assert!(matches!(
            save_png(&RgbImage::new(1, 1), &path),
            Err(RenderError::Io(_))
        ));
    }
}
