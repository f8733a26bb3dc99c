//! Morphological shaping of binary masks.
//!
//! Isotropic operations use a square (L∞) structuring element of the given
//! radius via `imageproc`; the directional ones grow or shrink along a single
//! axis with a 1-D window of `2 * radius + 1` pixels.

use std::collections::VecDeque;

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology;

fn radius_u8(radius: u32) -> u8 {
    u8::try_from(radius).unwrap_or(u8::MAX)
}

pub fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::dilate(mask, Norm::LInf, radius_u8(radius))
}

pub fn erode(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::erode(mask, Norm::LInf, radius_u8(radius))
}

/// Dilate then erode: merges nearby fragments and closes small gaps.
pub fn dilate_erode(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::close(mask, Norm::LInf, radius_u8(radius))
}

/// Erode then dilate: removes specks smaller than the element.
pub fn erode_dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::open(mask, Norm::LInf, radius_u8(radius))
}

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

impl Extremum {
    // true when `a` should evict `b` from the back of the window deque
    fn dominates(self, a: u8, b: u8) -> bool {
        match self {
            Extremum::Max => a >= b,
            Extremum::Min => a <= b,
        }
    }
}

/// Sliding-window extremum over `line` with a window of `radius` on each side,
/// clipped at the ends.
fn sliding_extremum(line: &[u8], radius: usize, kind: Extremum, out: &mut [u8]) {
    let n = line.len();
    let mut window: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for (i, slot) in out.iter_mut().enumerate().take(n) {
        let hi = (i + radius).min(n - 1);
        while next <= hi {
            while let Some(&back) = window.back() {
                if kind.dominates(line[next], line[back]) {
                    window.pop_back();
                } else {
                    break;
                }
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(radius);
        while let Some(&front) = window.front() {
            if front < lo {
                window.pop_front();
            } else {
                break;
            }
        }
        if let Some(&front) = window.front() {
            *slot = line[front];
        }
    }
}

fn filter_rows(mask: &GrayImage, radius: u32, kind: Extremum) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    let w = width as usize;
    let src = mask.as_raw();
    let dst: &mut [u8] = &mut out;
    for (row, out_row) in src.chunks_exact(w).zip(dst.chunks_exact_mut(w)) {
        sliding_extremum(row, radius as usize, kind, out_row);
    }
    out
}

fn filter_cols(mask: &GrayImage, radius: u32, kind: Extremum) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    let (w, h) = (width as usize, height as usize);
    let src = mask.as_raw();
    let mut column = vec![0u8; h];
    let mut filtered = vec![0u8; h];
    for x in 0..w {
        for (y, c) in column.iter_mut().enumerate() {
            *c = src[y * w + x];
        }
        sliding_extremum(&column, radius as usize, kind, &mut filtered);
        for (y, v) in filtered.iter().enumerate() {
            out[(x as u32, y as u32)][0] = *v;
        }
    }
    out
}

pub fn dilate_horizontal(mask: &GrayImage, radius: u32) -> GrayImage {
    filter_rows(mask, radius, Extremum::Max)
}

pub fn dilate_vertical(mask: &GrayImage, radius: u32) -> GrayImage {
    filter_cols(mask, radius, Extremum::Max)
}

pub fn erode_horizontal(mask: &GrayImage, radius: u32) -> GrayImage {
    filter_rows(mask, radius, Extremum::Min)
}

pub fn erode_vertical(mask: &GrayImage, radius: u32) -> GrayImage {
    filter_cols(mask, radius, Extremum::Min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn dot(width: u32, height: u32, x: u32, y: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        img.put_pixel(x, y, Luma([255]));
        img
    }

    fn on_count(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p[0] > 0).count()
    }

    #[test]
    fn test_dilate_horizontal_grows_row_only() {
        let out = dilate_horizontal(&dot(11, 5, 5, 2), 3);
        assert_eq!(on_count(&out), 7);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
        assert_eq!(out.get_pixel(8, 2)[0], 255);
        assert_eq!(out.get_pixel(9, 2)[0], 0);
        assert_eq!(out.get_pixel(5, 1)[0], 0);
    }

    #[test]
    fn test_dilate_horizontal_keeps_rows_apart() {
        let mut img = dot(12, 4, 1, 0);
        img.put_pixel(10, 3, Luma([255]));
        let out = dilate_horizontal(&img, 2);
        let rows: Vec<usize> = (0..4)
            .map(|y| (0..12).filter(|&x| out.get_pixel(x, y)[0] > 0).count())
            .collect();
        assert_eq!(rows, vec![4, 0, 0, 4]);
        assert_eq!(out.get_pixel(3, 0)[0], 255);
        assert_eq!(out.get_pixel(8, 3)[0], 255);
    }

    #[test]
    fn test_dilate_vertical_clips_at_border() {
        let out = dilate_vertical(&dot(5, 6, 2, 1), 4);
        assert_eq!(on_count(&out), 6);
        assert_eq!(out.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn test_erode_horizontal_shrinks_run() {
        let mut img = GrayImage::new(10, 1);
        for x in 2..8 {
            img.put_pixel(x, 0, Luma([255]));
        }
        let out = erode_horizontal(&img, 1);
        let row: Vec<u8> = out.pixels().map(|p| p[0]).collect();
        assert_eq!(row, vec![0, 0, 0, 255, 255, 255, 255, 0, 0, 0]);
        // a single row has no vertical neighbours inside the frame
        assert_eq!(on_count(&erode_vertical(&img, 1)), 6);
    }

    #[test]
    fn test_isotropic_dilate_is_square() {
        let out = dilate(&dot(9, 9, 4, 4), 2);
        assert_eq!(on_count(&out), 25);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn test_erode_dilate_removes_speck_keeps_block() {
        let mut img = dot(40, 40, 2, 2);
        for y in 10..30 {
            for x in 10..30 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let out = erode_dilate(&img, 3);
        assert_eq!(out.get_pixel(2, 2)[0], 0);
        assert_eq!(on_count(&out), 400);
    }
}
