//! Color/intensity masking and pixelwise logic on binary masks.
//!
//! Masks are `GrayImage`s holding only 0 or 255.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Inclusive band in HSV space. Hue is in degrees (0..360), saturation and
/// value on the 0..=255 scale. `hue: None` accepts any hue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub hue: Option<(f32, f32)>,
    pub saturation: (u8, u8),
    pub value: (u8, u8),
}

impl HsvRange {
    pub fn contains(&self, [r, g, b]: [u8; 3]) -> bool {
        let (h, s, v) = rgb_to_hsv(r, g, b);
        let hue_ok = match self.hue {
            None => true,
            Some((lo, hi)) if lo <= hi => h >= lo && h <= hi,
            // wraps through 0, e.g. (340, 20)
            Some((lo, hi)) => h >= lo || h <= hi,
        };
        hue_ok
            && s >= self.saturation.0
            && s <= self.saturation.1
            && v >= self.value.0
            && v <= self.value.1
    }
}

/// HSV with hue in degrees and saturation/value on 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let v = max;
    let s = if max == 0 {
        0
    } else {
        (delta * 255.0 / max as f32).round() as u8
    };
    if delta == 0.0 {
        return (0.0, s, v);
    }

    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let mut h = if max == r {
        60.0 * ((gf - bf) / delta)
    } else if max == g {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };
    if h < 0.0 {
        h += 360.0;
    }
    (h, s, v)
}

/// Set `dst` to 255 where the pixel of `src` falls inside `range`.
pub fn hsv_mask(src: &RgbImage, range: &HsvRange, dst: &mut GrayImage) {
    debug_assert_eq!(src.dimensions(), dst.dimensions());
    for (x, y, p) in src.enumerate_pixels() {
        let on = range.contains(p.0);
        dst.put_pixel(x, y, Luma([if on { MASK_ON } else { MASK_OFF }]));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Copy one color channel of `src` into `dst`. Grayscale sources have all
/// channels equal, so any channel yields the intensity.
pub fn extract_channel(src: &DynamicImage, channel: Channel, dst: &mut GrayImage) {
    match src {
        DynamicImage::ImageLuma8(gray) => dst.copy_from_slice(gray.as_raw()),
        other => {
            let rgb = other.to_rgb8();
            let i = channel.index();
            for (x, y, p) in rgb.enumerate_pixels() {
                dst.put_pixel(x, y, Luma([p[i]]));
            }
        }
    }
}

pub fn invert(mask: &mut GrayImage) {
    for p in mask.pixels_mut() {
        p[0] = !p[0];
    }
}

/// `dst &= src`, pixelwise bitwise AND.
pub fn and(dst: &mut GrayImage, src: &GrayImage) {
    debug_assert_eq!(dst.dimensions(), src.dimensions());
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        d[0] &= s[0];
    }
}

/// `dst |= src`, pixelwise bitwise OR.
pub fn or(dst: &mut GrayImage, src: &GrayImage) {
    debug_assert_eq!(dst.dimensions(), src.dimensions());
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        d[0] |= s[0];
    }
}

/// Stretch the intensity range of `img` linearly to 0..=255.
/// A flat image is left as is.
pub fn normalize(img: &mut GrayImage) {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return;
    }
    let scale = 255.0 / (max - min) as f32;
    for p in img.pixels_mut() {
        p[0] = ((p[0] - min) as f32 * scale).round() as u8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdType {
    /// `> level` becomes 255, the rest 0.
    Binary,
    /// `> level` becomes 0, the rest 255.
    BinaryInv,
}

pub fn threshold(img: &mut GrayImage, level: u8, kind: ThresholdType) {
    let (above, below) = match kind {
        ThresholdType::Binary => (MASK_ON, MASK_OFF),
        ThresholdType::BinaryInv => (MASK_OFF, MASK_ON),
    };
    for p in img.pixels_mut() {
        p[0] = if p[0] > level { above } else { below };
    }
}

/// Threshold at the Otsu level of `img`; returns the level used.
pub fn threshold_otsu(img: &mut GrayImage, kind: ThresholdType) -> u8 {
    let level = imageproc::contrast::otsu_level(img);
    threshold(img, level, kind);
    level
}

/// Fill every background region of `mask` that is not connected to the
/// image border (4-connectivity), i.e. close all enclosed holes.
pub fn fill_holes(mask: &mut GrayImage) {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as i32, height as i32);
    let mut outside = vec![false; (width * height) as usize];
    let mut stack: Vec<(i32, i32)> = Vec::new();

    for x in 0..w {
        stack.push((x, 0));
        stack.push((x, h - 1));
    }
    for y in 0..h {
        stack.push((0, y));
        stack.push((w - 1, y));
    }

    while let Some((x, y)) = stack.pop() {
        if x < 0 || x >= w || y < 0 || y >= h {
            continue;
        }
        let idx = (y * w + x) as usize;
        if outside[idx] || mask.get_pixel(x as u32, y as u32)[0] != MASK_OFF {
            continue;
        }
        outside[idx] = true;

        stack.push((x + 1, y));
        stack.push((x - 1, y));
        stack.push((x, y + 1));
        stack.push((x, y - 1));
    }

    for (i, p) in mask.pixels_mut().enumerate() {
        if !outside[i] {
            p[0] = MASK_ON;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 255, 255), (0.0, 0, 255));
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0.0, 255, 255));
        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert!((h - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_hsv_mask_selects_light_pixels() {
        let mut img = RgbImage::from_pixel(4, 1, Rgb([40, 50, 90]));
        img.put_pixel(1, 0, Rgb([240, 238, 235]));
        img.put_pixel(2, 0, Rgb([250, 120, 40]));
        let range = HsvRange {
            hue: None,
            saturation: (0, 60),
            value: (150, 255),
        };
        let mut mask = GrayImage::new(4, 1);
        hsv_mask(&img, &range, &mut mask);
        let row: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
        assert_eq!(row, vec![0, 255, 0, 0]);
    }

    #[test]
    fn test_hue_range_wraps() {
        let reds = HsvRange {
            hue: Some((340.0, 20.0)),
            saturation: (100, 255),
            value: (100, 255),
        };
        assert!(reds.contains([250, 10, 10]));
        assert!(!reds.contains([10, 250, 10]));
    }

    #[test]
    fn test_extract_channel() {
        let img = RgbImage::from_pixel(2, 2, Rgb([11, 22, 33]));
        let mut dst = GrayImage::new(2, 2);
        extract_channel(&DynamicImage::ImageRgb8(img), Channel::Green, &mut dst);
        assert!(dst.pixels().all(|p| p[0] == 22));
    }

    #[test]
    fn test_composition_replaces_masked_pixels() {
        let base = GrayImage::from_raw(4, 1, vec![10, 20, 30, 40]).unwrap();
        let smooth = GrayImage::from_raw(4, 1, vec![99, 99, 99, 99]).unwrap();
        let mut keep = GrayImage::from_raw(4, 1, vec![255, 0, 255, 0]).unwrap();

        let mut bkgd = smooth.clone();
        invert(&mut keep);
        and(&mut bkgd, &keep);
        invert(&mut keep);
        let mut clean = base.clone();
        and(&mut clean, &keep);
        or(&mut clean, &bkgd);

        assert_eq!(clean.as_raw(), &vec![10, 99, 30, 99]);
    }

    #[test]
    fn test_normalize_stretches_range() {
        let mut img = GrayImage::from_raw(3, 1, vec![50, 100, 150]).unwrap();
        normalize(&mut img);
        assert_eq!(img.as_raw(), &vec![0, 128, 255]);

        let mut flat = GrayImage::from_pixel(3, 1, Luma([7]));
        normalize(&mut flat);
        assert!(flat.pixels().all(|p| p[0] == 7));
    }

    #[test]
    fn test_otsu_inverse_marks_dark_pixels() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([230]));
        for x in 3..7 {
            img.put_pixel(x, 5, Luma([20]));
        }
        threshold_otsu(&mut img, ThresholdType::BinaryInv);
        assert_eq!(img.get_pixel(4, 5)[0], 255);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_fill_holes_closes_ring() {
        let mut mask = GrayImage::new(7, 7);
        for i in 1..6 {
            mask.put_pixel(i, 1, Luma([255]));
            mask.put_pixel(i, 5, Luma([255]));
            mask.put_pixel(1, i, Luma([255]));
            mask.put_pixel(5, i, Luma([255]));
        }
        fill_holes(&mut mask);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(6, 3)[0], 0);
    }
}
