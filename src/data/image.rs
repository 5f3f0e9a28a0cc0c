//! Image preprocessing for inference.
//!
//! Decodes an image (PNG/JPEG/BMP/GIF) or takes a raw grayscale pixel buffer
//! such as a drawing canvas, resizes it to the network's input grid, converts
//! to grayscale and normalizes to [0, 1], flattened row-major.
//!
//! MNIST digits are light strokes on a dark background; `invert` flips
//! dark-on-light drawings to match.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

use crate::error::{NnError, Result};

pub fn image_file_to_input<P: AsRef<Path>>(
    path: P,
    width: u32,
    height: u32,
    invert: bool,
) -> Result<Vec<f64>> {
    check_target_size(width, height)?;
    let img = image::open(path)?;
    Ok(to_input(&img, width, height, invert))
}

pub fn image_bytes_to_input(bytes: &[u8], width: u32, height: u32, invert: bool) -> Result<Vec<f64>> {
    check_target_size(width, height)?;
    let img = image::load_from_memory(bytes)?;
    Ok(to_input(&img, width, height, invert))
}

/// Downsamples a raw row-major 8-bit grayscale buffer of
/// `src_width × src_height` to `width × height`.
pub fn downsample_grayscale(
    pixels: &[u8],
    src_width: u32,
    src_height: u32,
    width: u32,
    height: u32,
    invert: bool,
) -> Result<Vec<f64>> {
    check_target_size(width, height)?;
    let img = GrayImage::from_raw(src_width, src_height, pixels.to_vec()).ok_or_else(|| {
        NnError::InvalidData(format!(
            "pixel buffer of {} bytes does not hold a {}x{} grayscale image",
            pixels.len(),
            src_width,
            src_height
        ))
    })?;
    Ok(to_input(&DynamicImage::ImageLuma8(img), width, height, invert))
}

fn check_target_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(NnError::InvalidConfig(format!("input grid must be non-empty, got {}x{}", width, height)));
    }
    Ok(())
}

fn to_input(img: &DynamicImage, width: u32, height: u32, invert: bool) -> Vec<f64> {
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);
    let gray = resized.to_luma8();
    gray.pixels()
        .map(|p| {
            let v = p.0[0] as f64 / 255.0;
            if invert { 1.0 - v } else { v }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TOLERANCE: f64 = 1.5 / 255.0;

    #[test]
    fn downsample_uniform_buffer() {
        let pixels = vec![200u8; 8 * 8];
        let input = downsample_grayscale(&pixels, 8, 8, 4, 4, false).unwrap();
        assert_eq!(input.len(), 16);
        assert!(input.iter().all(|v| (v - 200.0 / 255.0).abs() <= TOLERANCE));

        let inverted = downsample_grayscale(&pixels, 8, 8, 4, 4, true).unwrap();
        assert!(inverted.iter().all(|v| (v - 55.0 / 255.0).abs() <= TOLERANCE));
    }

    #[test]
    fn downsample_rejects_short_buffer() {
        assert!(matches!(
            downsample_grayscale(&[0u8; 10], 4, 4, 2, 2, false),
            Err(NnError::InvalidData(_))
        ));
        assert!(downsample_grayscale(&[0u8; 16], 4, 4, 0, 2, false).is_err());
    }

    #[test]
    fn decodes_png_bytes() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 6, image::Luma([255u8])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png).unwrap();

        let input = image_bytes_to_input(&bytes, 3, 3, false).unwrap();
        assert_eq!(input.len(), 9);
        assert!(input.iter().all(|v| (v - 1.0).abs() <= TOLERANCE));
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        assert!(matches!(image_bytes_to_input(b"not an image", 2, 2, false), Err(NnError::Image(_))));
    }
}
