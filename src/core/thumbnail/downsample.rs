//! Scale-to-fit logic: `s = min(1, target / max(w, h))`, never upscaling.

use super::request::DecodedImage;
use image::{imageops::FilterType, DynamicImage};

/// Interpolation upgraded from the teacher's `Nearest` to `Triangle` (bilinear)
/// to satisfy the "linear or better" requirement; see DESIGN.md.
const THUMBNAIL_FILTER: FilterType = FilterType::Triangle;

/// Computes the thumbnail dimensions for `(w, h)` scaled to fit within
/// `target` on the longest side, preserving aspect ratio and never upscaling.
pub fn fit_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let scale = (target as f64 / longest as f64).min(1.0);
    let w = ((width as f64) * scale).round().max(1.0) as u32;
    let h = ((height as f64) * scale).round().max(1.0) as u32;
    (w, h)
}

/// Downsamples `image` to fit within `target_size`, re-encoding to RGBA8
/// regardless of whether any resize occurred (so cache entries share one
/// pixel layout).
pub fn downsample_to_fit(image: &DynamicImage, target_size: u32) -> DecodedImage {
    let (orig_w, orig_h) = (image.width(), image.height());
    let (target_w, target_h) = fit_dimensions(orig_w, orig_h, target_size);

    let resized = if target_w == orig_w && target_h == orig_h {
        image.clone()
    } else {
        image.resize(target_w, target_h, THUMBNAIL_FILTER)
    };

    super::decoder::to_decoded_image(&resized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_dimensions_never_upscales() {
        assert_eq!(fit_dimensions(50, 50, 200), (50, 50));
    }

    #[test]
    fn fit_dimensions_preserves_aspect_ratio() {
        let (w, h) = fit_dimensions(1000, 500, 100);
        assert_eq!(w, 100);
        assert_eq!(h, 50);
    }

    #[test]
    fn fit_dimensions_handles_tall_images() {
        let (w, h) = fit_dimensions(500, 1000, 100);
        assert_eq!(w, 50);
        assert_eq!(h, 100);
    }

    #[test]
    fn downsample_rgba_stride_is_4_byte_aligned() {
        let image = DynamicImage::new_rgb8(10, 3);
        let decoded = downsample_to_fit(&image, 5);
        assert!(decoded.stride_matches_invariant());
        assert_eq!(decoded.stride % 4, 0);
    }
}
