//! Display filters shown next to the analysed image

use image::{DynamicImage, RgbImage};
use serde::Serialize;

/// Sigma equivalent to a 5×5 Gaussian kernel with automatic sigma
const GAUSSIAN_SIGMA: f32 = 1.1;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// The four processing variants of one image
#[derive(Debug, Clone)]
pub struct FilterSet {
    pub original: RgbImage,
    pub gaussian: RgbImage,
    pub edges: RgbImage,
    pub sharpened: RgbImage,
}

/// Variant names in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Original,
    Gaussian,
    Edges,
    Sharpened,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Original,
        FilterKind::Gaussian,
        FilterKind::Edges,
        FilterKind::Sharpened,
    ];

    pub fn caption(&self) -> &'static str {
        match self {
            FilterKind::Original => "Original",
            FilterKind::Gaussian => "Smoothed",
            FilterKind::Edges => "Edges",
            FilterKind::Sharpened => "Sharpened",
        }
    }
}

impl FilterSet {
    pub fn get(&self, kind: FilterKind) -> &RgbImage {
        match kind {
            FilterKind::Original => &self.original,
            FilterKind::Gaussian => &self.gaussian,
            FilterKind::Edges => &self.edges,
            FilterKind::Sharpened => &self.sharpened,
        }
    }
}

pub fn apply_filters(image: &RgbImage) -> FilterSet {
    let gaussian = image::imageops::blur(image, GAUSSIAN_SIGMA);

    let gray = image::imageops::grayscale(image);
    let edges = imageproc::edges::canny(&gray, CANNY_LOW, CANNY_HIGH);
    let edges = DynamicImage::ImageLuma8(edges).to_rgb8();

    let sharpened = image::imageops::filter3x3(image, &SHARPEN_KERNEL);

    FilterSet {
        original: image.clone(),
        gaussian,
        edges,
        sharpened,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::test_images::sample_rgb;
    use image::Rgb;

    #[test]
    fn test_all_variants_keep_dimensions() {
        let image = sample_rgb(48, 32);
        let filters = apply_filters(&image);
        for kind in FilterKind::ALL {
            assert_eq!(filters.get(kind).dimensions(), (48, 32), "{kind:?}");
        }
        assert_eq!(filters.original, image);
    }

    #[test]
    fn test_edges_are_binary_and_found() {
        let filters = apply_filters(&sample_rgb(64, 64));
        let mut any_edge = false;
        for Rgb([r, g, b]) in filters.edges.pixels() {
            assert!(*r == 0 || *r == 255);
            assert_eq!(r, g);
            assert_eq!(g, b);
            any_edge |= *r == 255;
        }
        assert!(any_edge, "square boundary should produce edges");
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let flat = RgbImage::from_pixel(32, 32, Rgb([120, 90, 80]));
        let filters = apply_filters(&flat);
        assert!(filters.edges.pixels().all(|p| p[0] == 0));
        // Sharpening a flat field leaves it unchanged
        assert_eq!(filters.sharpened.get_pixel(16, 16), &Rgb([120, 90, 80]));
    }
}
