//! services/api/src/intake/compressor.rs
//!
//! Re-encodes validated uploads into a bounded representation before they
//! are embedded in a message: the longer edge is clamped to 800 pixels
//! (aspect ratio preserved) and the pixels are re-encoded as JPEG at 80%
//! quality. Output is deterministic for a given decoded image and codec,
//! but not bit-reproducible across encoder implementations, so callers
//! must only rely on the dimension and format invariants.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

/// Longest edge of a compressed image.
pub const MAX_EDGE: u32 = 800;

/// JPEG quality used for every re-encode.
pub const JPEG_QUALITY: u8 = 80;

/// The MIME type every compressed attachment carries.
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    /// The bytes did not decode as an image. The caller must not enqueue
    /// a broken attachment.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A bounded, JPEG-encoded rendition of an upload.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Decodes, downsamples if the longer edge exceeds [`MAX_EDGE`], and
/// re-encodes as JPEG. Images already within bounds are re-encoded without
/// resizing (never upscaled).
pub fn compress(data: &[u8]) -> Result<CompressedImage, CompressError> {
    let decoded = image::load_from_memory(data)?;
    let (width, height) = decoded.dimensions();

    let resized = if width.max(height) > MAX_EDGE {
        decoded.resize(MAX_EDGE, MAX_EDGE, FilterType::Triangle)
    } else {
        decoded
    };

    // JPEG has no alpha channel; flatten to RGB before encoding.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let (out_width, out_height) = rgb.dimensions();

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    Ok(CompressedImage {
        width: out_width,
        height: out_height,
        data: buffer.into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 80, 40]),
        ));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn landscape_longer_edge_clamped_to_800() {
        let out = compress(&png_bytes(1600, 800)).unwrap();
        assert_eq!((out.width, out.height), (800, 400));
    }

    #[test]
    fn portrait_longer_edge_clamped_to_800() {
        let out = compress(&png_bytes(600, 1200)).unwrap();
        assert_eq!((out.width, out.height), (400, 800));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let out = compress(&png_bytes(320, 200)).unwrap();
        assert_eq!((out.width, out.height), (320, 200));
    }

    #[test]
    fn output_is_always_jpeg() {
        let out = compress(&png_bytes(100, 100)).unwrap();
        assert_eq!(image::guess_format(&out.data).unwrap(), ImageFormat::Jpeg);
        let roundtrip = image::load_from_memory(&out.data).unwrap();
        assert_eq!(roundtrip.dimensions(), (100, 100));
    }

    #[test]
    fn alpha_channel_is_flattened() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            64,
            image::Rgba([10, 20, 30, 128]),
        ));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let out = compress(&buffer.into_inner()).unwrap();
        assert_eq!(image::guess_format(&out.data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn undecodable_bytes_fail() {
        assert!(compress(&[0xFF, 0xD8, 0xFF, 0x00, 0x01, 0x02]).is_err());
    }
}
