//! Applying a fitted rectangle to the working image.

use image::DynamicImage;

use crate::debug::{self, Frame, StageObserver};
use crate::error::{PipelineError, Stage};
use crate::geometry;
use crate::image_impl::{Mat, Rect, RotatedRect};

/// Rounding slack, in pixels per side, tolerated when a rotated rectangle is
/// mapped onto the rotated canvas.
const ROUNDING_SLACK: i32 = 1;

/// Replace `img` with the sub-image `rect` of `src`. The rectangle is
/// validated against `src` and rejected, not clamped, if it does not fit.
pub fn crop_to_rect(
    stage: Stage,
    img: &mut Mat,
    src: &Mat,
    rect: Rect,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let cropped = checked_crop(stage, src, rect)?;
    commit(stage, img, cropped, rect, obs);
    Ok(())
}

/// Crop `img` to `rect` of itself, with the same validation as
/// [`crop_to_rect`].
pub fn crop_in_place(
    stage: Stage,
    img: &mut Mat,
    rect: Rect,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let cropped = checked_crop(stage, img, rect)?;
    commit(stage, img, cropped, rect, obs);
    Ok(())
}

fn checked_crop(stage: Stage, src: &Mat, rect: Rect) -> Result<DynamicImage, PipelineError> {
    src.crop(rect).ok_or(PipelineError::InvalidGeometry {
        stage,
        rect,
        width: src.cols(),
        height: src.rows(),
    })
}

fn commit(stage: Stage, img: &mut Mat, cropped: DynamicImage, rect: Rect, obs: &mut dyn StageObserver) {
    tracing::debug!(%stage, %rect, "crop");
    img.replace(cropped);
    debug::show(obs, 1, stage.name(), Frame::Image(img.as_dynamic()));
}

/// Rotate `img` so that `rect` is axis-aligned, then crop to it.
pub fn rotate_and_crop(
    stage: Stage,
    img: &mut Mat,
    rect: &RotatedRect,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let (rotated, axis_rect) = geometry::rotate_to_rect(img.as_dynamic(), rect);
    debug::show(obs, 3, &format!("{}/rotated", stage.name()), Frame::Image(&rotated));

    let rotated = Mat::new(rotated);
    let axis_rect = absorb_rounding(axis_rect, rotated.cols(), rotated.rows());
    tracing::debug!(%stage, angle = rect.angle, width = rect.width, height = rect.height, "align");
    crop_to_rect(stage, img, &rotated, axis_rect, obs)
}

/// Clip `rect` to the frame when it overshoots by no more than the rounding
/// slack on any side; larger violations are left for validation to reject.
fn absorb_rounding(rect: Rect, width: i32, height: i32) -> Rect {
    let within_slack = rect.x >= -ROUNDING_SLACK
        && rect.y >= -ROUNDING_SLACK
        && rect.right() <= width + ROUNDING_SLACK
        && rect.bottom() <= height + ROUNDING_SLACK;
    if !within_slack || rect.fits(width, height) {
        return rect;
    }
    match rect.clip(width, height) {
        Some(clipped) => {
            tracing::debug!(%rect, %clipped, width, height, "clipped rounding overshoot");
            clipped
        }
        None => rect,
    }
}

/// Wrap a single-channel result so it can become the working image.
pub(crate) fn gray_mat(img: image::GrayImage) -> Mat {
    Mat::new(DynamicImage::ImageLuma8(img))
}
