//! Image abstraction layer: the working image and the rectangle types the
//! pipeline stages exchange.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, GrayImage, ImageReader, Luma, Pixel};
use serde::Serialize;

use crate::error::{PipelineError, Stage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Default for Point2f {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Point2f {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

/// Axis-aligned rectangle in the pixel frame of the current working image.
///
/// Coordinates are signed so that arithmetic producing out-of-frame values
/// can be detected by [`Rect::fits`] instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// True when the rectangle has positive extent and lies entirely inside
    /// a `width` x `height` frame.
    pub fn fits(&self, width: i32, height: i32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.right() <= width
            && self.bottom() <= height
    }

    /// Intersection with a `width` x `height` frame, `None` if empty.
    pub fn clip(&self, width: i32, height: i32) -> Option<Rect> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.right().min(width);
        let y1 = self.bottom().min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Rotated rectangle: `angle` is the direction of the `width` edge in
/// degrees, measured from +x towards +y (image coordinates, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point2f,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl RotatedRect {
    pub fn new(center: Point2f, width: f32, height: f32, angle: f32) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    /// Same rectangle described with `angle` in (-45, 45].
    ///
    /// Every quarter turn of the reference edge swaps width and height.
    pub fn normalized(&self) -> Self {
        let mut angle = self.angle % 360.0;
        let mut width = self.width;
        let mut height = self.height;
        while angle > 45.0 {
            angle -= 90.0;
            std::mem::swap(&mut width, &mut height);
        }
        while angle <= -45.0 {
            angle += 90.0;
            std::mem::swap(&mut width, &mut height);
        }
        Self {
            center: self.center,
            width,
            height,
            angle,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Corner points: top-left, top-right, bottom-right, bottom-left in the
    /// rectangle's own frame.
    pub fn points(&self) -> [Point2f; 4] {
        let angle_rad = self.angle.to_radians();
        let cos_a = angle_rad.cos();
        let sin_a = angle_rad.sin();

        let w = self.width / 2.0;
        let h = self.height / 2.0;

        let corners = [(-w, -h), (w, -h), (w, h), (-w, h)];

        corners.map(|(dx, dy)| {
            Point2f::new(
                self.center.x + dx * cos_a - dy * sin_a,
                self.center.y + dx * sin_a + dy * cos_a,
            )
        })
    }
}

/// The working image threaded through the pipeline.
///
/// Stages take `&mut Mat` and replace its content only once they have
/// produced a complete result, so a failed stage leaves it untouched.
#[derive(Clone)]
pub struct Mat {
    image: DynamicImage,
}

impl fmt::Debug for Mat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mat")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("color", &self.image.color())
            .finish()
    }
}

impl From<DynamicImage> for Mat {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

impl Mat {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PipelineError> {
        let image = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;
        Ok(Self { image })
    }

    pub fn rows(&self) -> i32 {
        self.image.height() as i32
    }

    pub fn cols(&self) -> i32 {
        self.image.width() as i32
    }

    pub fn size(&self) -> Size {
        Size::new(self.cols(), self.rows())
    }

    pub fn empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Replace the whole content, e.g. with a stage result.
    pub fn replace(&mut self, image: DynamicImage) {
        self.image = image;
    }

    pub fn to_luma8(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// True when every pixel equals the first one (no color or intensity
    /// variation anywhere).
    pub fn is_flat(&self) -> bool {
        let bpp = self.image.color().bytes_per_pixel() as usize;
        let bytes = self.image.as_bytes();
        if bytes.len() <= bpp {
            return true;
        }
        let (first, rest) = bytes.split_at(bpp);
        rest.chunks_exact(bpp).all(|px| px == first)
    }

    /// Write the luma of the sub-rectangle `roi` into `dst`, which must be
    /// exactly `roi` sized.
    pub fn luma_into(&self, roi: Rect, dst: &mut GrayImage) -> bool {
        if !roi.fits(self.cols(), self.rows())
            || dst.dimensions() != (roi.width as u32, roi.height as u32)
        {
            return false;
        }
        let view = self
            .image
            .view(roi.x as u32, roi.y as u32, roi.width as u32, roi.height as u32);
        for (x, y, p) in view.pixels() {
            dst.put_pixel(x, y, Luma([p.to_luma()[0]]));
        }
        true
    }

    /// Copy of the sub-rectangle `rect`, which must fit the image.
    pub fn crop(&self, rect: Rect) -> Option<DynamicImage> {
        if !rect.fits(self.cols(), self.rows()) {
            return None;
        }
        Some(self.image.crop_imm(
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        ))
    }
}

/// Allocate a zeroed single-channel scratch buffer, reporting allocation
/// failure instead of aborting.
pub fn alloc_scratch(stage: Stage, width: u32, height: u32) -> Result<GrayImage, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::init(stage, "working image has zero area"));
    }
    let len = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| PipelineError::init(stage, "scratch size overflows"))?;
    let mut data: Vec<u8> = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|e| PipelineError::init(stage, e.to_string()))?;
    data.resize(len, 0);
    GrayImage::from_raw(width, height, data)
        .ok_or_else(|| PipelineError::init(stage, "scratch buffer size mismatch"))
}

/// Reject inputs the pipeline cannot work on: zero-area images are an
/// initialization failure, featureless ones a no-match.
pub fn check_input(stage: Stage, img: &Mat) -> Result<(), PipelineError> {
    if img.empty() {
        return Err(PipelineError::init(stage, "working image has zero area"));
    }
    if img.is_flat() {
        return Err(PipelineError::NoMatch { stage });
    }
    Ok(())
}

pub fn imread<P: AsRef<Path>>(path: P) -> Result<Mat, PipelineError> {
    let img = image::open(path)?;
    Ok(Mat::new(img))
}

pub fn imwrite<P: AsRef<Path>>(path: P, img: &Mat) -> Result<(), PipelineError> {
    img.image.save(path)?;
    Ok(())
}
