use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use labelcrop::{
    find_label, find_symbols_horizontally, find_symbols_vertically, DumpObserver, LabelCrop,
    LabelPipeline, Mat, NoopObserver, PipelineConfig, Stage,
};

const BAND_W: f32 = 280.0;
const BAND_H: f32 = 50.0;

/// Paint a `w` x `h` rectangle rotated by `angle` degrees around (cx, cy).
fn paint_rotated(img: &mut RgbImage, (cx, cy): (f32, f32), (w, h): (f32, f32), angle: f32, color: Rgb<u8>) {
    let (sin_t, cos_t) = angle.to_radians().sin_cos();
    for (x, y, p) in img.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let u = dx * cos_t + dy * sin_t;
        let v = -dx * sin_t + dy * cos_t;
        if u.abs() < w / 2.0 && v.abs() < h / 2.0 {
            *p = color;
        }
    }
}

/// 800x600 photo: orange backdrop, a white 440x300 label turned by 10
/// degrees, and a dark symbol band on the label.
fn scene() -> RgbImage {
    let mut img = RgbImage::from_pixel(800, 600, Rgb([235, 120, 60]));
    paint_rotated(&mut img, (400.0, 300.0), (440.0, 300.0), 10.0, Rgb([245, 245, 242]));
    paint_rotated(&mut img, (400.0, 300.0), (BAND_W, BAND_H), 10.0, Rgb([30, 30, 30]));
    img
}

#[test]
fn test_full_pipeline_ends_on_symbol_band() {
    let mut img = Mat::new(DynamicImage::ImageRgb8(scene()));
    let out = LabelPipeline::default()
        .run_on_mat(&mut img, Stage::Align, &mut NoopObserver)
        .unwrap();

    let stages: Vec<Stage> = out.stages.iter().map(|r| r.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());

    let (w, h) = (img.cols() as f32, img.rows() as f32);
    assert!((w - BAND_W).abs() <= 40.0, "final width {w}");
    assert!((BAND_H..=2.0 * BAND_H).contains(&h), "final height {h}");
    assert_eq!(out.output().width, img.cols());
}

#[test]
fn test_stages_one_by_one() {
    let mut img = Mat::new(DynamicImage::ImageRgb8(scene()));
    let cfg = PipelineConfig::default();

    find_label(&mut img, &cfg.label, &mut NoopObserver).unwrap();
    let label = img.size();
    assert!((label.width - 440).abs() <= 12, "label width {}", label.width);
    assert!((label.height - 300).abs() <= 12, "label height {}", label.height);

    find_symbols_vertically(&mut img, &cfg.vertical, &mut NoopObserver).unwrap();
    assert_eq!(img.cols(), label.width);
    assert_eq!(img.rows() % 2, 0);
    assert!((100..=124).contains(&img.rows()), "strip height {}", img.rows());

    let strip = img.size();
    find_symbols_horizontally(&mut img, &cfg.horizontal, &mut NoopObserver).unwrap();
    assert_eq!(img.rows(), strip.height);
    assert!(img.cols() <= strip.width);
    assert!(img.cols() >= BAND_W as i32 + 40, "run width {}", img.cols());
}

#[test]
fn test_crop_from_encoded_bytes() {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(scene())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    let result = LabelCrop::new(PipelineConfig::default()).crop_from_bytes(&bytes).unwrap();
    assert_eq!(result.report.stages.len(), 4);
    assert_eq!(result.report.input.width, 800);
    assert_eq!(result.image.width() as i32, result.report.output().width);
}

#[test]
fn test_crop_from_file_and_dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.png");
    scene().save(&path).unwrap();

    let result = LabelCrop::new(PipelineConfig::default()).crop(&path).unwrap();
    assert!(result.image.height() >= BAND_H as u32);

    let mut img = labelcrop::imread(&path).unwrap();
    let mut dump = DumpObserver::new(dir.path().join("dump"), 1).unwrap();
    LabelPipeline::default()
        .run_on_mat(&mut img, Stage::Align, &mut dump)
        .unwrap();
    // one stage result per stage
    assert_eq!(dump.written().len(), 4);
    assert!(dump.written()[0].ends_with("000_label.png"));
}

#[test]
fn test_featureless_photo_is_no_match() {
    let img = RgbImage::from_pixel(320, 240, Rgb([235, 120, 60]));
    let mut img = Mat::new(DynamicImage::ImageRgb8(img));
    let err = LabelPipeline::default()
        .run_on_mat(&mut img, Stage::Align, &mut NoopObserver)
        .unwrap_err();
    assert_eq!(err.status_code(), -2);
    assert_eq!(err.stage(), Some(Stage::Label));
}
