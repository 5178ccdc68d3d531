//! Contrast-limited adaptive histogram equalization
//!
//! Equalization runs on the luminance channel only so that tissue colour is
//! preserved. The image is split into a grid of tiles; each tile gets a
//! clipped-histogram lookup table and pixels are bilinearly interpolated
//! between the four nearest tile mappings.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

const BINS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaheParams {
    /// Histogram clip limit, relative to a uniform distribution
    pub clip_limit: f32,
    /// Number of tiles along each axis
    pub grid: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self { clip_limit: 3.0, grid: 8 }
    }
}

impl ClaheParams {
    pub fn validate(&self) -> Result<()> {
        if !self.clip_limit.is_finite() || self.clip_limit < 1.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "clip_limit must be >= 1.0, got {}",
                self.clip_limit
            )));
        }
        if self.grid == 0 || self.grid > 64 {
            return Err(AnalysisError::InvalidConfig(format!(
                "grid must be in 1..=64, got {}",
                self.grid
            )));
        }
        Ok(())
    }
}

/// Enhance contrast with the default parameters (clip 3.0, 8×8 tiles)
pub fn enhance(image: &RgbImage) -> RgbImage {
    enhance_with(image, ClaheParams::default())
}

pub fn enhance_with(image: &RgbImage, params: ClaheParams) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let ycbcr: Vec<[f32; 3]> = image.pixels().map(|p| rgb_to_ycbcr(*p)).collect();
    let luma: Vec<u8> = ycbcr.iter().map(|px| clamp_u8(px[0])).collect();

    let equalized = equalize_luma(&luma, width as usize, height as usize, params);

    let mut out = RgbImage::new(width, height);
    for (i, pixel) in out.pixels_mut().enumerate() {
        let [_, cb, cr] = ycbcr[i];
        *pixel = ycbcr_to_rgb(f32::from(equalized[i]), cb, cr);
    }
    out
}

/// Tile layout covering the whole image
struct Tiles {
    tile_w: usize,
    tile_h: usize,
    cols: usize,
    rows: usize,
}

impl Tiles {
    fn new(width: usize, height: usize, grid: u32) -> Self {
        let grid = grid.max(1) as usize;
        let tile_w = width.div_ceil(grid).max(1);
        let tile_h = height.div_ceil(grid).max(1);
        Self {
            tile_w,
            tile_h,
            cols: width.div_ceil(tile_w),
            rows: height.div_ceil(tile_h),
        }
    }
}

fn equalize_luma(luma: &[u8], width: usize, height: usize, params: ClaheParams) -> Vec<u8> {
    let tiles = Tiles::new(width, height, params.grid);

    let mut luts = Vec::with_capacity(tiles.rows * tiles.cols);
    for row in 0..tiles.rows {
        for col in 0..tiles.cols {
            let x0 = col * tiles.tile_w;
            let y0 = row * tiles.tile_h;
            let x1 = (x0 + tiles.tile_w).min(width);
            let y1 = (y0 + tiles.tile_h).min(height);
            luts.push(tile_lut(luma, width, (x0, y0, x1, y1), params.clip_limit));
        }
    }

    let mut out = vec![0u8; luma.len()];
    for y in 0..height {
        let (r0, r1, wy) = neighbours(y, tiles.tile_h, tiles.rows);
        for x in 0..width {
            let (c0, c1, wx) = neighbours(x, tiles.tile_w, tiles.cols);
            let v = luma[y * width + x] as usize;

            let top = lerp(
                f32::from(luts[r0 * tiles.cols + c0][v]),
                f32::from(luts[r0 * tiles.cols + c1][v]),
                wx,
            );
            let bottom = lerp(
                f32::from(luts[r1 * tiles.cols + c0][v]),
                f32::from(luts[r1 * tiles.cols + c1][v]),
                wx,
            );
            out[y * width + x] = clamp_u8(lerp(top, bottom, wy));
        }
    }
    out
}

/// Lower and upper tile indices around a coordinate plus the weight of the upper one
fn neighbours(pos: usize, tile: usize, count: usize) -> (usize, usize, f32) {
    let centre = (pos as f32 + 0.5) / tile as f32 - 0.5;
    if centre <= 0.0 {
        return (0, 0, 0.0);
    }
    let lower = (centre.floor() as usize).min(count - 1);
    let upper = (lower + 1).min(count - 1);
    let weight = if upper == lower { 0.0 } else { centre - lower as f32 };
    (lower, upper, weight)
}

fn tile_lut(luma: &[u8], width: usize, (x0, y0, x1, y1): (usize, usize, usize, usize), clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for &v in &luma[y * width + x0..y * width + x1] {
            hist[v as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)) as u32;

    let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
    clip_histogram(&mut hist, limit);

    let mut lut = [0u8; BINS];
    let scale = 255.0 / area.max(1) as f32;
    let mut cdf = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = clamp_u8(cdf as f32 * scale);
    }
    lut
}

/// Clip every bin to `limit` and hand the excess back out evenly
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let per_bin = excess / BINS as u32;
    let residual = (excess % BINS as u32) as usize;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for i in (0..BINS).step_by(step).take(residual) {
            hist[i] += 1;
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn rgb_to_ycbcr(Rgb([r, g, b]): Rgb<u8>) -> [f32; 3] {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    [y, cb, cr]
}

fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> Rgb<u8> {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    Rgb([clamp_u8(r), clamp_u8(g), clamp_u8(b)])
}
