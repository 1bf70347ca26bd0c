// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scan cleanup chain applied before detection
//!
//! Grayscale -> median denoise -> CLAHE -> Otsu binarization. Parameters
//! are fixed; detection runs on the binary output, recognition on the
//! contrast-enhanced one.
//!
//! The 3x3 median filter approximates non-local means denoising. It removes
//! salt-and-pepper specks but does not reproduce NL-means output pixel for
//! pixel, so thresholds tuned against NL-means may land slightly differently.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use tracing::debug;

/// CLAHE clip limit (relative to a uniform histogram)
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// CLAHE tile grid (tiles per axis)
pub const CLAHE_TILE_GRID: u32 = 8;

/// Median filter radius (3x3 window)
pub const DENOISE_RADIUS: u32 = 1;

const HIST_BINS: usize = 256;

/// Output of the cleanup chain
#[derive(Debug, Clone)]
pub struct EnhancedImage {
    /// Denoised, contrast-equalized grayscale
    pub contrast: GrayImage,
    /// Otsu-binarized version of `contrast` (0 or 255 only)
    pub binary: GrayImage,
    /// Threshold Otsu picked
    pub otsu_level: u8,
}

/// Run the full cleanup chain on a decoded image
pub fn enhance(image: &DynamicImage) -> EnhancedImage {
    let gray = image.to_luma8();
    let denoised = denoise(&gray);
    let contrast = clahe(&denoised, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID);
    let level = otsu_level(&contrast);
    let binary = binarize(&contrast, level);

    debug!(
        "Enhanced {}x{} image, otsu level {}",
        gray.width(),
        gray.height(),
        level
    );

    EnhancedImage {
        contrast,
        binary,
        otsu_level: level,
    }
}

/// 3x3 median filter, standing in for non-local means
pub fn denoise(image: &GrayImage) -> GrayImage {
    median_filter(image, DENOISE_RADIUS, DENOISE_RADIUS)
}

/// Pixels strictly above `level` become white, everything else black
pub fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// Contrast-limited adaptive histogram equalization
///
/// Each tile gets its own clipped-histogram lookup table; pixels blend the
/// four nearest tile tables bilinearly so tile seams do not show.
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    // Never ask for more tiles than pixels on an axis
    let grid_x = grid.clamp(1, width);
    let grid_y = grid.clamp(1, height);

    let luts = tile_luts(image, clip_limit, grid_x, grid_y);

    let tile_w = width as f32 / grid_x as f32;
    let tile_h = height as f32 / grid_y as f32;

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = neighbour_tiles(y, tile_h, grid_y);
        for x in 0..width {
            let (tx0, tx1, wx) = neighbour_tiles(x, tile_w, grid_x);
            let v = image.get_pixel(x, y)[0] as usize;

            let top = lerp(
                luts[lut_index(tx0, ty0, grid_x)][v],
                luts[lut_index(tx1, ty0, grid_x)][v],
                wx,
            );
            let bottom = lerp(
                luts[lut_index(tx0, ty1, grid_x)][v],
                luts[lut_index(tx1, ty1, grid_x)][v],
                wx,
            );
            let value = lerp(top, bottom, wy).round().clamp(0.0, 255.0) as u8;
            out.put_pixel(x, y, Luma([value]));
        }
    }

    out
}

fn lut_index(tx: u32, ty: u32, grid_x: u32) -> usize {
    (ty * grid_x + tx) as usize
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Tile indices on either side of a pixel centre, plus the blend weight
fn neighbour_tiles(pos: u32, tile_size: f32, grid: u32) -> (u32, u32, f32) {
    let t = (pos as f32 + 0.5) / tile_size - 0.5;
    let t0 = t.floor().max(0.0) as u32;
    let t0 = t0.min(grid - 1);
    let t1 = (t0 + 1).min(grid - 1);
    let weight = if t1 == t0 {
        0.0
    } else {
        (t - t0 as f32).clamp(0.0, 1.0)
    };
    (t0, t1, weight)
}

/// Build a clipped, redistributed CDF lookup table for every tile
fn tile_luts(image: &GrayImage, clip_limit: f32, grid_x: u32, grid_y: u32) -> Vec<[f32; HIST_BINS]> {
    let (width, height) = image.dimensions();
    let mut luts = Vec::with_capacity((grid_x * grid_y) as usize);

    for ty in 0..grid_y {
        let y0 = ty * height / grid_y;
        let y1 = (ty + 1) * height / grid_y;
        for tx in 0..grid_x {
            let x0 = tx * width / grid_x;
            let x1 = (tx + 1) * width / grid_x;

            let mut hist = [0u32; HIST_BINS];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            let area = ((x1 - x0) * (y1 - y0)).max(1);
            clip_histogram(&mut hist, clip_limit, area);
            luts.push(cdf_lut(&hist, area));
        }
    }

    luts
}

/// Clip every bin at the limit and spread the excess evenly
fn clip_histogram(hist: &mut [u32; HIST_BINS], clip_limit: f32, area: u32) {
    if clip_limit <= 0.0 {
        return;
    }

    let limit = ((clip_limit * area as f32 / HIST_BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let batch = excess / HIST_BINS as u32;
    let residual = excess as usize % HIST_BINS;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (HIST_BINS / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}

fn cdf_lut(hist: &[u32; HIST_BINS], area: u32) -> [f32; HIST_BINS] {
    let scale = 255.0 / area as f32;
    let mut lut = [0.0f32; HIST_BINS];
    let mut sum = 0u32;
    for (i, count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = (sum as f32 * scale).min(255.0);
    }
    lut
}
