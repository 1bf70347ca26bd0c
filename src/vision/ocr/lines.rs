// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Grouping detected boxes into text lines and cutting them out of the page

use image::{GenericImageView, GrayImage, Luma};

use super::detection::TextBox;

/// Max horizontal gap between boxes on one line, in units of line height
pub const DEFAULT_WIDTH_THS: f32 = 0.7;

/// Max height difference between boxes on one line, in units of line height
pub const DEFAULT_HEIGHT_THS: f32 = 0.7;

/// Max vertical centre drift within one line, in units of line height
pub const YCENTER_THS: f32 = 0.5;

/// Integer pixel rectangle, clamped to a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Merge boxes that sit on the same text line
///
/// Boxes join a line when their heights and vertical centres agree with the
/// line's running mean; within a line, neighbours closer than
/// `width_ths * mean height` are fused into one box. Output is in reading
/// order: lines top to bottom, left to right within a line.
pub fn merge_into_lines(boxes: &[TextBox], width_ths: f32, height_ths: f32) -> Vec<TextBox> {
    let mut sorted: Vec<TextBox> = boxes.iter().filter(|b| b.is_valid()).cloned().collect();
    sorted.sort_by(|a, b| {
        a.center_y()
            .partial_cmp(&b.center_y())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut groups: Vec<Vec<TextBox>> = Vec::new();
    for b in sorted {
        let joins_last = groups.last().is_some_and(|group| {
            let mean_h = mean(group.iter().map(|g| g.height));
            let mean_cy = mean(group.iter().map(|g| g.center_y()));
            (b.center_y() - mean_cy).abs() < YCENTER_THS * mean_h
                && (b.height - mean_h).abs() < height_ths * mean_h
        });

        match groups.last_mut() {
            Some(group) if joins_last => group.push(b),
            _ => groups.push(vec![b]),
        }
    }

    let mut lines = Vec::new();
    for mut group in groups {
        group.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
        let max_gap = width_ths * mean(group.iter().map(|g| g.height));

        let mut run: Vec<TextBox> = Vec::new();
        for b in group {
            let fuses = run
                .iter()
                .map(TextBox::right)
                .fold(None, |acc: Option<f32>, r| Some(acc.map_or(r, |a| a.max(r))))
                .is_some_and(|right| b.x - right < max_gap);

            if !fuses && !run.is_empty() {
                lines.push(union(&run));
                run.clear();
            }
            run.push(b);
        }
        if !run.is_empty() {
            lines.push(union(&run));
        }
    }

    lines
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

fn union(boxes: &[TextBox]) -> TextBox {
    let x0 = boxes.iter().map(|b| b.x).fold(f32::INFINITY, f32::min);
    let y0 = boxes.iter().map(|b| b.y).fold(f32::INFINITY, f32::min);
    let x1 = boxes.iter().map(TextBox::right).fold(f32::NEG_INFINITY, f32::max);
    let y1 = boxes.iter().map(TextBox::bottom).fold(f32::NEG_INFINITY, f32::max);
    let confidence = mean(boxes.iter().map(|b| b.confidence));
    TextBox::new(x0, y0, x1 - x0, y1 - y0, confidence)
}

/// Expand a box by `padding` pixels per side, clamped to the page
pub fn pad_box(b: &TextBox, padding: u32, page_width: u32, page_height: u32) -> PixelRect {
    let pad = padding as f32;
    let x0 = (b.x.floor() - pad).max(0.0) as u32;
    let y0 = (b.y.floor() - pad).max(0.0) as u32;
    let x1 = ((b.right().ceil() + pad).max(0.0) as u32).min(page_width);
    let y1 = ((b.bottom().ceil() + pad).max(0.0) as u32).min(page_height);

    PixelRect {
        x: x0.min(x1),
        y: y0.min(y1),
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    }
}

/// Copy of the page restricted to one rectangle
pub fn crop(page: &GrayImage, rect: PixelRect) -> GrayImage {
    page.view(rect.x, rect.y, rect.width, rect.height).to_image()
}

/// White canvas of the page size carrying only the given rectangles
pub fn render_regions(page: &GrayImage, rects: &[PixelRect]) -> GrayImage {
    let (width, height) = page.dimensions();
    let mut canvas = GrayImage::from_pixel(width, height, Luma([255]));

    for rect in rects.iter().filter(|r| !r.is_empty()) {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                canvas.put_pixel(x, y, *page.get_pixel(x, y));
            }
        }
    }

    canvas
}
