//! Utility functions for vision processing

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, Axis};
use rinkpilot_core::{Error, Result};

const CHANNELS: usize = 3;

/// Wrap a raw `height x width x channels` u8 buffer, as handed over by the
/// host runtime, into an RGB image.
pub fn image_from_hwc(data: &[u8], height: u32, width: u32, channels: usize) -> Result<RgbImage> {
    if channels != CHANNELS {
        return Err(Error::InputShape(format!(
            "expected {} channels, got {}",
            CHANNELS, channels
        )));
    }

    if height == 0 || width == 0 {
        return Err(Error::InputShape("Image dimensions cannot be zero".to_string()));
    }

    let expected = (height as usize)
        .checked_mul(width as usize)
        .and_then(|p| p.checked_mul(channels))
        .ok_or_else(|| Error::InputShape("Image dimensions would overflow".to_string()))?;

    if data.len() != expected {
        return Err(Error::InputShape(format!(
            "buffer holds {} bytes, {}x{}x{} needs {}",
            data.len(),
            height,
            width,
            channels,
            expected
        )));
    }

    RgbImage::from_raw(width, height, data.to_vec())
        .ok_or_else(|| Error::InputShape("buffer does not fit image dimensions".to_string()))
}

/// Check that a decoded image is a non-empty 3-channel frame and return it
/// as 8-bit RGB.
pub fn ensure_rgb(image: &DynamicImage) -> Result<RgbImage> {
    let channels = image.color().channel_count() as usize;
    if channels != CHANNELS {
        return Err(Error::InputShape(format!(
            "expected {} channels, got {}",
            CHANNELS, channels
        )));
    }

    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InputShape("Image dimensions cannot be zero".to_string()));
    }

    Ok(image.to_rgb8())
}

/// Resize to `width x height` if needed and convert to a `[3, H, W]` tensor
/// scaled to `[0, 1]`.
pub fn rgb_to_chw_tensor(image: &RgbImage, width: u32, height: u32) -> Array3<f32> {
    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        resized = imageops::resize(image, width, height, FilterType::Triangle);
        &resized
    };

    Array3::from_shape_fn((CHANNELS, height as usize, width as usize), |(c, y, x)| {
        source.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Per-channel standardization of a `[3, H, W]` tensor.
pub fn normalize_channels(tensor: &mut Array3<f32>, mean: &[f32; 3], std: &[f32; 3]) {
    for (c, mut plane) in tensor.axis_iter_mut(Axis(0)).enumerate().take(CHANNELS) {
        let (m, s) = (mean[c], std[c]);
        if s == 0.0 {
            continue;
        }
        plane.mapv_inplace(|v| if v.is_finite() { (v - m) / s } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb};

    #[test]
    fn test_image_from_hwc_wrong_channels() {
        let data = vec![0u8; 4 * 2 * 2];
        let err = image_from_hwc(&data, 2, 2, 4).unwrap_err();
        assert!(matches!(err, Error::InputShape(_)));
    }

    #[test]
    fn test_image_from_hwc_length_mismatch() {
        let data = vec![0u8; 11];
        assert!(image_from_hwc(&data, 2, 2, 3).is_err());
    }

    #[test]
    fn test_image_from_hwc_layout() {
        // 1 row, 2 pixels: red then blue
        let data = vec![255, 0, 0, 0, 0, 255];
        let img = image_from_hwc(&data, 1, 2, 3).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_ensure_rgb_rejects_grayscale() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        assert!(matches!(ensure_rgb(&gray), Err(Error::InputShape(_))));
    }

    #[test]
    fn test_ensure_rgb_rejects_rgba() {
        let rgba = DynamicImage::new_rgba8(4, 4);
        assert!(ensure_rgb(&rgba).is_err());
    }

    #[test]
    fn test_tensor_is_chw_and_scaled() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(3, 1, Rgb([255, 51, 0]));
        let t = rgb_to_chw_tensor(&img, 4, 2);
        assert_eq!(t.dim(), (3, 2, 4));
        assert_eq!(t[[0, 1, 3]], 1.0);
        assert!((t[[1, 1, 3]] - 0.2).abs() < 1e-6);
        assert_eq!(t[[2, 1, 3]], 0.0);
    }

    #[test]
    fn test_tensor_resizes_to_target() {
        let img = RgbImage::from_pixel(400, 300, Rgb([128, 128, 128]));
        let t = rgb_to_chw_tensor(&img, 128, 96);
        assert_eq!(t.dim(), (3, 96, 128));
        assert!(t.iter().all(|&v| (v - 128.0 / 255.0).abs() < 1e-2));
    }

    #[test]
    fn test_normalize_channels() {
        let mut t = Array3::from_elem((3, 2, 2), 0.5f32);
        normalize_channels(&mut t, &[0.5, 0.25, 0.0], &[1.0, 0.25, 0.5]);
        assert!(t.index_axis(Axis(0), 0).iter().all(|&v| v == 0.0));
        assert!(t.index_axis(Axis(0), 1).iter().all(|&v| v == 1.0));
        assert!(t.index_axis(Axis(0), 2).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_normalize_channels_replaces_non_finite() {
        let mut t = Array3::from_elem((3, 1, 2), 0.5f32);
        t[[1, 0, 0]] = f32::NAN;
        normalize_channels(&mut t, &[0.1, 0.1, 0.1], &[0.2, 0.2, 0.2]);
        assert!(t.iter().all(|v| v.is_finite()));
    }
}
