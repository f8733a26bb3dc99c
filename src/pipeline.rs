use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::debug::{NoopObserver, StageObserver};
use crate::error::{PipelineError, Stage};
use crate::image_impl::{imread, Mat, Size};
use crate::label::find_label;
use crate::symbols::{align_symbols, find_symbols_horizontally, find_symbols_vertically};
use crate::types::PipelineConfig;

/// Working image size after one stage and the time it took.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub width: i32,
    pub height: i32,
    pub elapse: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub input: Size,
    pub stages: Vec<StageReport>,
    pub elapse: f64,
}

impl PipelineOutput {
    /// Size of the final working image.
    pub fn output(&self) -> Size {
        self.stages
            .last()
            .map(|r| Size::new(r.width, r.height))
            .unwrap_or(self.input)
    }
}

/// Runs the stages in order on one working image.
#[derive(Debug, Clone, Default)]
pub struct LabelPipeline {
    pub config: PipelineConfig,
}

impl LabelPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        Ok(Self::new(PipelineConfig::from_json_file(path)?))
    }

    /// Run one stage on `img`.
    pub fn run_stage(
        &self,
        stage: Stage,
        img: &mut Mat,
        obs: &mut dyn StageObserver,
    ) -> Result<(), PipelineError> {
        match stage {
            Stage::Label => find_label(img, &self.config.label, obs),
            Stage::Vertical => find_symbols_vertically(img, &self.config.vertical, obs),
            Stage::Horizontal => find_symbols_horizontally(img, &self.config.horizontal, obs),
            Stage::Align => align_symbols(img, &self.config.align, obs),
        }
    }

    /// Load an image file and run every stage on it (convenience wrapper for
    /// [`LabelPipeline::run_on_mat`]).
    pub fn run<P: AsRef<Path>>(&self, image_path: P) -> Result<(Mat, PipelineOutput), PipelineError> {
        let mut img = imread(image_path)?;
        let out = self.run_on_mat(&mut img, Stage::Align, &mut NoopObserver)?;
        Ok((img, out))
    }

    /// Run the stages from label localization up to and including `until`.
    /// Stops at the first failing stage, leaving `img` as that stage found it.
    pub fn run_on_mat(
        &self,
        img: &mut Mat,
        until: Stage,
        obs: &mut dyn StageObserver,
    ) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();
        let input = img.size();
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        for stage in Stage::ALL.into_iter().take_while(|s| *s <= until) {
            let stage_start = Instant::now();
            if let Err(e) = self.run_stage(stage, img, obs) {
                tracing::warn!(%stage, code = e.status_code(), error = %e, "stage failed");
                return Err(e);
            }
            let report = StageReport {
                stage,
                width: img.cols(),
                height: img.rows(),
                elapse: stage_start.elapsed().as_secs_f64(),
            };
            tracing::info!(%stage, width = report.width, height = report.height, elapse = report.elapse, "stage done");
            stages.push(report);
        }

        Ok(PipelineOutput {
            input,
            stages,
            elapse: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    #[test]
    fn test_failure_stops_and_reports_stage() {
        let mut img = Mat::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([0, 0, 0]))));
        let err = LabelPipeline::default()
            .run_on_mat(&mut img, Stage::Align, &mut NoopObserver)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Label));
        assert_eq!(img.size(), Size::new(80, 60));
    }

    #[test]
    fn test_until_limits_stages() {
        let mut img = RgbImage::from_pixel(200, 160, Rgb([40, 50, 90]));
        for y in 40..120 {
            for x in 30..170 {
                img.put_pixel(x, y, Rgb([245, 245, 240]));
            }
        }
        let mut img = Mat::new(DynamicImage::ImageRgb8(img));
        let out = LabelPipeline::default()
            .run_on_mat(&mut img, Stage::Label, &mut NoopObserver)
            .unwrap();
        assert_eq!(out.stages.len(), 1);
        assert_eq!(out.stages[0].stage, Stage::Label);
        assert_eq!(out.input, Size::new(200, 160));
        assert_eq!(out.output(), img.size());
    }
}
