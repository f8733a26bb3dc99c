//! Label localization: find the largest light region and straighten the
//! working image onto it.

use tracing::debug_span;

use crate::contours;
use crate::crop;
use crate::debug::{self, Frame, StageObserver};
use crate::error::{PipelineError, Stage};
use crate::geometry;
use crate::image_impl::{alloc_scratch, check_input, Mat};
use crate::mask;
use crate::morphology;
use crate::types::LabelConfig;

pub fn find_label(
    img: &mut Mat,
    cfg: &LabelConfig,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let stage = Stage::Label;
    let _span = debug_span!("find_label", cols = img.cols(), rows = img.rows()).entered();

    check_input(stage, img)?;
    let mut tmp = alloc_scratch(stage, img.cols() as u32, img.rows() as u32)?;

    // Find label
    let color = img.as_dynamic().to_rgb8();
    debug::show(obs, 2, "label/clone", Frame::Rgb(&color));
    mask::hsv_mask(&color, &cfg.white, &mut tmp);
    debug::show(obs, 3, "label/white", Frame::Gray(&tmp));
    tmp = morphology::dilate_erode(&tmp, cfg.close_radius);
    debug::show(obs, 3, "label/close", Frame::Gray(&tmp));
    tmp = morphology::erode_dilate(&tmp, cfg.open_radius);
    debug::show(obs, 3, "label/open", Frame::Gray(&tmp));

    let conts = contours::find_contours(&tmp);
    debug::show(obs, 2, "label/contours", Frame::Gray(&tmp));
    let lbl = contours::largest(&conts).ok_or(PipelineError::NoMatch { stage })?;
    let rect_rot = geometry::min_area_rect(lbl).ok_or(PipelineError::NoMatch { stage })?;
    tracing::debug!(
        contours = conts.len(),
        cx = rect_rot.center.x,
        cy = rect_rot.center.y,
        angle = rect_rot.angle,
        "label found"
    );

    // Align & crop to label
    crop::rotate_and_crop(stage, img, &rect_rot, obs)
}
