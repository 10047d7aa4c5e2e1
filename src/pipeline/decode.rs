//! Image validation: downloaded bytes → [`ImageAsset`].
//!
//! A fetch only counts as successful once the bytes are known to be an image
//! the renderer can place. A full decode is the only reliable proof (a
//! truncated JPEG still has a valid header), so it runs here, once per
//! distinct name, on the blocking pool.
//!
//! The original bytes are kept: JPEGs are embedded in the PDF unchanged,
//! which keeps a sheet of 90 cards at a few megabytes instead of a hundred.

use crate::error::EntryError;
use crate::output::{AssetFormat, ImageAsset};
use image::ImageFormat;
use tracing::debug;

/// Validate `bytes` as a JPEG or PNG and describe it.
pub fn decode_asset(name: &str, bytes: Vec<u8>) -> Result<ImageAsset, EntryError> {
    let undecodable = |detail: String| EntryError::UndecodableImage {
        name: name.to_string(),
        detail,
    };

    let guessed = image::guess_format(&bytes).map_err(|e| undecodable(e.to_string()))?;
    let format = match guessed {
        ImageFormat::Jpeg => AssetFormat::Jpeg,
        ImageFormat::Png => AssetFormat::Png,
        other => return Err(undecodable(format!("unsupported image format {other:?}"))),
    };

    let img = image::load_from_memory_with_format(&bytes, guessed)
        .map_err(|e| undecodable(e.to_string()))?;

    let components = match format {
        // The decoder converts CMYK to RGB, so read the frame header instead.
        AssetFormat::Jpeg => jpeg_components(&bytes).unwrap_or(img.color().channel_count()),
        AssetFormat::Png => img.color().channel_count(),
    };

    debug!(
        "Decoded '{}': {:?} {}x{} ({} components)",
        name,
        format,
        img.width(),
        img.height(),
        components
    );

    Ok(ImageAsset {
        name: name.to_string(),
        width: img.width(),
        height: img.height(),
        format,
        components,
        bytes,
    })
}

/// Async wrapper: decoding is CPU-bound, so keep it off the runtime workers.
pub async fn decode_asset_blocking(name: String, bytes: Vec<u8>) -> Result<ImageAsset, EntryError> {
    let task_name = name.clone();
    tokio::task::spawn_blocking(move || decode_asset(&task_name, bytes))
        .await
        .map_err(|e| EntryError::UndecodableImage {
            name,
            detail: format!("decode task failed: {e}"),
        })?
}

/// Number of colour components declared in a JPEG's start-of-frame segment.
pub fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 1 < bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        pos += 2;
        match marker {
            // Fill bytes before a marker.
            0xFF => {
                pos -= 1;
                continue;
            }
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => continue,
            // Start of scan: no frame header seen.
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // Lf(2) P(1) Y(2) X(2) Nf(1)
            return bytes.get(pos + 7).copied();
        }
        pos += len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn decodes_rgb_jpeg() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 16, Rgb([200, 10, 10])));
        let bytes = encode(&img, ImageFormat::Jpeg);
        let asset = decode_asset("Island", bytes.clone()).unwrap();
        assert_eq!(asset.format, AssetFormat::Jpeg);
        assert_eq!((asset.width, asset.height), (12, 16));
        assert_eq!(asset.components, 3);
        assert_eq!(asset.bytes, bytes);
    }

    #[test]
    fn decodes_gray_jpeg_as_one_component() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([90])));
        let bytes = encode(&img, ImageFormat::Jpeg);
        assert_eq!(jpeg_components(&bytes), Some(1));
        assert_eq!(decode_asset("Swamp", bytes).unwrap().components, 1);
    }

    #[test]
    fn decodes_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 6, Rgb([0, 0, 255])));
        let asset = decode_asset("Plains", encode(&img, ImageFormat::Png)).unwrap();
        assert_eq!(asset.format, AssetFormat::Png);
        assert_eq!((asset.width, asset.height), (4, 6));
    }

    #[test]
    fn html_error_page_is_undecodable() {
        let err = decode_asset("Island", b"<html>rate limited</html>".to_vec()).unwrap_err();
        match err {
            EntryError::UndecodableImage { name, .. } => assert_eq!(name, "Island"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn jpeg_components_rejects_non_jpeg() {
        assert_eq!(jpeg_components(b"\x89PNG\r\n\x1a\n"), None);
        assert_eq!(jpeg_components(&[]), None);
    }

    #[tokio::test]
    async fn blocking_wrapper_returns_asset() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])));
        let asset = decode_asset_blocking("Forest".into(), encode(&img, ImageFormat::Png))
            .await
            .unwrap();
        assert_eq!(asset.name, "Forest");
    }
}
