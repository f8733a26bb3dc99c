//! Symbol band isolation on a localized label.
//!
//! [`find_symbols_vertically`] keeps a horizontal strip around the dark
//! symbol band, [`find_symbols_horizontally`] trims it to the run of symbols
//! and [`align_symbols`] straightens what is left.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::median_filter;
use tracing::debug_span;

use crate::contours;
use crate::crop::{self, gray_mat};
use crate::debug::{self, Frame, StageObserver};
use crate::error::{PipelineError, Stage};
use crate::geometry;
use crate::image_impl::{alloc_scratch, check_input, Mat, Rect};
use crate::mask::{self, ThresholdType};
use crate::morphology;
use crate::types::{divided, kernel_radius, AlignConfig, HorizontalConfig, VerticalConfig};

/// Keep a full-width strip, twice the height of the symbol band and centered
/// on it. The working image becomes the smoothed grayscale base.
pub fn find_symbols_vertically(
    img: &mut Mat,
    cfg: &VerticalConfig,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let stage = Stage::Vertical;
    let _span = debug_span!("find_symbols_vertically", cols = img.cols(), rows = img.rows()).entered();

    check_input(stage, img)?;
    let (w, h) = (img.cols(), img.rows());

    // Grayscale base
    let mut base = alloc_scratch(stage, w as u32, h as u32)?;
    mask::extract_channel(img.as_dynamic(), cfg.channel, &mut base);
    let r = kernel_radius(cfg.base_median_kernel);
    let base = median_filter(&base, r, r);
    debug::show(obs, 2, "vertical/base", Frame::Gray(&base));

    let clean = flatten_background(stage, img, &base, cfg, obs)?;
    let band = band_mask(clean, w, cfg, obs);

    let conts = contours::find_contours(&band);
    let sym = contours::largest(&conts).ok_or(PipelineError::NoMatch { stage })?;
    let bbox = geometry::bounding_rect(sym).ok_or(PipelineError::NoMatch { stage })?;

    // Twice the band height around its center, full width
    let (mut y, mut hh) = (bbox.y, bbox.height);
    y += hh / 2;
    hh *= 2;
    y -= hh / 2;
    let x = 0;
    tracing::debug!(contours = conts.len(), band = %bbox, y, height = hh, "symbol band");

    crop::crop_to_rect(stage, img, &gray_mat(base), Rect::new(x, y, w, hh), obs)
}

/// Replace everything away from dark structure with a smoothed copy of the
/// base, so that texture in the label background does not produce edges.
fn flatten_background(
    stage: Stage,
    img: &Mat,
    base: &GrayImage,
    cfg: &VerticalConfig,
    obs: &mut dyn StageObserver,
) -> Result<GrayImage, PipelineError> {
    let color = img.as_dynamic().to_rgb8();
    let mut structure = alloc_scratch(stage, color.width(), color.height())?;
    mask::hsv_mask(&color, &cfg.dark, &mut structure);
    let mut structure = morphology::dilate_erode(&structure, cfg.dark_close_radius);
    mask::fill_holes(&mut structure);
    let structure = morphology::dilate(&structure, cfg.structure_dilate_radius);
    debug::show(obs, 3, "vertical/structure", Frame::Gray(&structure));

    let mut background = structure.clone();
    mask::invert(&mut background);

    let r = kernel_radius(cfg.background_median_kernel);
    let mut smooth = median_filter(base, r, r);
    mask::and(&mut smooth, &background);

    let mut clean = base.clone();
    mask::and(&mut clean, &structure);
    mask::or(&mut clean, &smooth);
    debug::show(obs, 2, "vertical/clean", Frame::Gray(&clean));
    Ok(clean)
}

/// Edge map of `clean` consolidated into solid blobs and merged along rows.
fn band_mask(
    mut clean: GrayImage,
    width: i32,
    cfg: &VerticalConfig,
    obs: &mut dyn StageObserver,
) -> GrayImage {
    mask::normalize(&mut clean);
    let r = kernel_radius(cfg.edge_median_kernel);
    let clean = median_filter(&clean, r, r);
    let edges = canny(&clean, cfg.canny_low, cfg.canny_high);
    debug::show(obs, 3, "vertical/edges", Frame::Gray(&edges));

    let edges = morphology::dilate_horizontal(&edges, cfg.edge_dilate_radius);
    let mut edges = morphology::dilate(&edges, cfg.edge_dilate_radius);
    mask::fill_holes(&mut edges);
    let blobs = morphology::erode_dilate(&edges, cfg.consolidate_radius);
    debug::show(obs, 3, "vertical/blobs", Frame::Gray(&blobs));

    let band = morphology::dilate_horizontal(&blobs, divided(width, cfg.band_merge_divisor));
    debug::show(obs, 2, "vertical/band", Frame::Gray(&band));
    band
}

/// Trim the strip to the horizontal run of symbols, keeping `margin` pixels
/// of context on each side.
pub fn find_symbols_horizontally(
    img: &mut Mat,
    cfg: &HorizontalConfig,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let stage = Stage::Horizontal;
    let _span = debug_span!("find_symbols_horizontally", cols = img.cols(), rows = img.rows()).entered();

    check_input(stage, img)?;
    let (w, h) = (img.cols(), img.rows());

    let roi = Rect::new(cfg.margin, 0, w - 2 * cfg.margin, h);
    let invalid_roi = PipelineError::InvalidGeometry {
        stage,
        rect: roi,
        width: w,
        height: h,
    };
    if !roi.fits(w, h) {
        return Err(invalid_roi);
    }
    let mut tmp = alloc_scratch(stage, roi.width as u32, roi.height as u32)?;
    if !img.luma_into(roi, &mut tmp) {
        return Err(invalid_roi);
    }

    let runs = dark_runs(tmp, w, h, cfg.dilate_x_divisor, cfg.dilate_y_divisor, "horizontal", obs);
    let conts = contours::find_contours(&runs);
    let sym = contours::largest(&conts).ok_or(PipelineError::NoMatch { stage })?;
    let bbox = geometry::bounding_rect(sym).ok_or(PipelineError::NoMatch { stage })?;
    tracing::debug!(contours = conts.len(), run = %bbox, "symbol run");

    // bbox.x is relative to the trimmed frame, so the margin lands on both sides
    let rect = Rect::new(bbox.x, 0, bbox.width + 2 * cfg.margin, h);
    crop::crop_in_place(stage, img, rect, obs)
}

/// Rotate the working image so the symbol run is level, and crop to it.
pub fn align_symbols(
    img: &mut Mat,
    cfg: &AlignConfig,
    obs: &mut dyn StageObserver,
) -> Result<(), PipelineError> {
    let stage = Stage::Align;
    let _span = debug_span!("align_symbols", cols = img.cols(), rows = img.rows()).entered();

    check_input(stage, img)?;
    let (w, h) = (img.cols(), img.rows());

    let mut tmp = alloc_scratch(stage, w as u32, h as u32)?;
    if !img.luma_into(Rect::new(0, 0, w, h), &mut tmp) {
        return Err(PipelineError::init(stage, "cannot read working image"));
    }

    let runs = dark_runs(tmp, w, h, cfg.dilate_x_divisor, cfg.dilate_y_divisor, "align", obs);
    let conts = contours::find_contours(&runs);
    let sym = contours::largest(&conts).ok_or(PipelineError::NoMatch { stage })?;
    let rect_rot = geometry::min_area_rect(sym).ok_or(PipelineError::NoMatch { stage })?;
    tracing::debug!(contours = conts.len(), angle = rect_rot.angle, "symbol run");

    crop::rotate_and_crop(stage, img, &rect_rot, obs)
}

/// Dark pixels of `gray` (Otsu, inverted) grown into connected runs. The
/// growth is derived from the full working image size `w` x `h`.
fn dark_runs(
    mut gray: GrayImage,
    w: i32,
    h: i32,
    x_divisor: u32,
    y_divisor: u32,
    step: &str,
    obs: &mut dyn StageObserver,
) -> GrayImage {
    mask::normalize(&mut gray);
    let level = mask::threshold_otsu(&mut gray, ThresholdType::BinaryInv);
    tracing::trace!(level, "otsu");
    debug::show(obs, 3, &format!("{step}/threshold"), Frame::Gray(&gray));

    let runs = morphology::dilate_horizontal(&gray, divided(w, x_divisor));
    let runs = morphology::dilate_vertical(&runs, divided(h, y_divisor));
    debug::show(obs, 2, &format!("{step}/runs"), Frame::Gray(&runs));
    runs
}
